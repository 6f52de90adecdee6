// DEMO BINARY
//
// Builds a DRR scheduler from a JSON traffic profile and drives it against
// the flows the profile describes, in the spirit of rush's
// synthetic_network::main -- a thin harness around the library, not part of
// the scheduler itself.

use drrq::{Address, Classifier, Config, Drr, Family, PacketDescriptor};

use std::collections::HashSet;
use std::env;
use std::error::Error;
use std::fs::File;
use std::io;
use std::io::BufReader;
use std::net::Ipv4Addr;
use std::process;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        print_usage(&args[0]);
        process::exit(1);
    }

    let profile = match read_profile(&args[1]) {
        Ok(profile) => profile,
        Err(error) => {
            println!("Failed to read profile {} ({})", &args[1], error);
            process::exit(1);
        }
    };
    if let Err(error) = sanitize_labels(&profile) {
        println!("Invalid profile {} ({})", &args[1], error);
        process::exit(1);
    }

    let mut config = Config::new();
    config.n = profile.n;
    if let Some(limit) = profile.byte_limit {
        config.byte_limit = limit;
    }
    config.quantum = profile.quantum;

    let mut scheduler = match Drr::new(config, Classifier::new(vec![Family::V4]), None) {
        Ok(scheduler) => scheduler,
        Err(error) => {
            println!("Invalid scheduler configuration ({})", error);
            process::exit(1);
        }
    };

    let mut offered = 0u64;
    for flow in &profile.flows {
        let dst = match flow.dst_ip.parse::<Ipv4Addr>() {
            Ok(ip) => Address::v4(ip),
            Err(error) => {
                println!("Skipping flow '{}': invalid dst_ip ({})", flow.label, error);
                continue;
            }
        };
        let src = Address::v4(Ipv4Addr::new(10, 0, 0, 1));
        for _ in 0..flow.packet_count {
            let pkt = PacketDescriptor::new(flow.packet_size, src, dst, flow.protocol)
                .with_ports(flow.port, flow.port);
            offered += 1;
            scheduler.enqueue(pkt);
        }
    }

    let mut drained = 0u64;
    while scheduler.dequeue().is_some() {
        drained += 1;
    }

    let stats = scheduler.stats();
    println!("Offered {} packets across {} flows.", offered, profile.flows.len());
    println!("Drained {} packets.", drained);
    println!("Drops: {} unclassified, {} overlimit.",
              stats.unclassified_drops, stats.overlimit_drops);
}

fn print_usage(argv0: &str) {
    println!("Usage: {} <profile.json>", argv0);
}

// This is our traffic profile / configuration format.

#[derive(Serialize, Deserialize)]
struct Profile {
    n: usize,
    byte_limit: Option<u64>,
    quantum: Option<u32>,
    flows: Vec<FlowSpec>,
}

#[derive(Serialize, Deserialize)]
struct FlowSpec {
    label: String,
    dst_ip: String,
    protocol: u8,
    port: u16,
    packet_size: u32,
    packet_count: u32,
}

fn read_profile(path: &str) -> Result<Profile, Box<dyn Error>> {
    let file = File::open(path)?;
    let profile = serde_json::from_reader(BufReader::new(file))?;
    Ok(profile)
}

fn sanitize_labels(profile: &Profile) -> Result<(), io::Error> {
    let mut labels = HashSet::new();
    for flow in &profile.flows {
        if !LABEL_SYNTAX.is_match(&flow.label) {
            return Err(io::Error::new(io::ErrorKind::InvalidData,
                                       "Invalid characters in flow label."));
        }
        if !labels.insert(flow.label.clone()) {
            return Err(io::Error::new(io::ErrorKind::InvalidData,
                                       "Duplicate flow labels."));
        }
    }
    Ok(())
}
static LABEL_SYNTAX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w_]+$").unwrap());
