// FLOW CLASSIFIER
//
// Maps a PacketDescriptor to a 32-bit flow hash, or reports NO_MATCH. The
// hash only needs to be deterministic and well distributed modulo the
// scheduler's flow count; it is not a cryptographic digest.
//
//   Family - address family a filter recognizes (V4, V6)
//   Classifier - ordered set of installed family filters, plus hash mode
//   Classifier::classify(&PacketDescriptor) -> Option<u32> - hash, or NO_MATCH

use super::packet::{Address, PacketDescriptor};

pub const PROTOCOL_TCP: u8 = 6;
pub const PROTOCOL_UDP: u8 = 17;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
    V4,
    V6,
}

// Either the 5-tuple mix (default) or the ns-2 prime-modulo hash over a
// masked source address. The two are mutually exclusive: mask mode is
// selected by configuring a network_mask (see Design Notes open question 3
// in SPEC_FULL.md).
#[derive(Clone, Copy, Debug)]
enum HashMode {
    FiveTuple,
    Ns2Mask(u32),
}

#[derive(Clone, Debug)]
pub struct Classifier {
    installed: Vec<Family>,
    mode: HashMode,
}

impl Classifier {
    // A classifier with no installed filters is invalid per spec.md §4.7;
    // construction is infallible here and the scheduler rejects the empty
    // set at its own init time (see config::ConfigError::NoFilterInstalled).
    pub fn new(installed: Vec<Family>) -> Classifier {
        Classifier { installed, mode: HashMode::FiveTuple }
    }

    pub fn with_network_mask(installed: Vec<Family>, mask: u32) -> Classifier {
        Classifier { installed, mode: HashMode::Ns2Mask(mask) }
    }

    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
    }

    // Classify a packet, optionally perturbed by a rotating 32-bit salt
    // (SFQ's periodic hash perturbation; pass 0 when not in use).
    pub fn classify(&self, pkt: &PacketDescriptor, perturbation: u32) -> Option<u32> {
        let family = match pkt.src {
            Address::V4(_) => Family::V4,
            Address::V6(_) => Family::V6,
        };
        if !self.installed.contains(&family) {
            return None;
        }
        match self.mode {
            HashMode::FiveTuple => Some(five_tuple_hash(pkt, perturbation)),
            HashMode::Ns2Mask(mask) => match pkt.src {
                Address::V4(src) => Some(ns2_mask_hash(src, mask)),
                Address::V6(_) => None, // mask mode is IPv4-only, per spec.md §4.1
            },
        }
    }
}

// Ports are zero unless the protocol is TCP/UDP and this is the first
// fragment (or an unfragmented packet) -- later fragments carry no
// transport header to read ports from.
fn ports(pkt: &PacketDescriptor) -> (u16, u16) {
    let has_ports = pkt.first_fragment
        && (pkt.protocol == PROTOCOL_TCP || pkt.protocol == PROTOCOL_UDP);
    if has_ports {
        (pkt.src_port.unwrap_or(0), pkt.dst_port.unwrap_or(0))
    } else {
        (0, 0)
    }
}

fn five_tuple_hash(pkt: &PacketDescriptor, perturbation: u32) -> u32 {
    let (src_port, dst_port) = ports(pkt);
    let mut buf = Vec::with_capacity(37 + 4);
    match (pkt.src, pkt.dst) {
        (Address::V4(src), Address::V4(dst)) => {
            buf.extend_from_slice(&src.to_be_bytes());
            buf.extend_from_slice(&dst.to_be_bytes());
        }
        (Address::V6(src), Address::V6(dst)) => {
            buf.extend_from_slice(&src.to_be_bytes());
            buf.extend_from_slice(&dst.to_be_bytes());
        }
        // A PacketDescriptor's src/dst are always drawn from the same
        // family by construction; mixed families never reach this path
        // because classify() already dispatched on pkt.src's family.
        _ => unreachable!("mixed address families in one packet descriptor"),
    }
    buf.push(pkt.protocol);
    buf.extend_from_slice(&src_port.to_be_bytes());
    buf.extend_from_slice(&dst_port.to_be_bytes());
    if perturbation != 0 {
        buf.extend_from_slice(&perturbation.to_be_bytes());
    }
    murmur3_32(&buf, 0)
}

// ((s + (s>>8) + ~(s>>4)) mod P) + 1, P = 2^24 - 1. Reproduced verbatim from
// the ns-2 flow-hash path preserved in
// examples/original_source/ns-3/src/internet/model/ipv4-packet-filter.cc --
// `source` there is a 32-bit `uint32_t`, so the sum and the complement must
// both wrap at 32 bits, not 64.
fn ns2_mask_hash(src: u32, mask: u32) -> u32 {
    let s = src & mask;
    let p: u32 = (1u32 << 24) - 1;
    let mixed = s.wrapping_add(s >> 8).wrapping_add(!(s >> 4));
    (mixed % p) + 1
}

// MurmurHash3 x86_32, as used for the fq-codel-derived classifier hash in
// examples/original_source/ns-3/.../ipv4-packet-filter.cc (`Hash32`).
fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e2d51;
    const C2: u32 = 0x1b873593;

    let mut h = seed;
    let chunks = data.chunks_exact(4);
    let tail = chunks.remainder();

    for chunk in chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);
        h ^= k;
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe6546b64);
    }

    let mut k: u32 = 0;
    for (i, &b) in tail.iter().enumerate().rev() {
        k ^= (b as u32) << (8 * i);
    }
    if !tail.is_empty() {
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);
        h ^= k;
    }

    h ^= data.len() as u32;
    fmix32(h)
}

fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}
