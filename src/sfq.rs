// STOCHASTIC FAIRNESS QUEUEING SCHEDULER
//
// Shares the classifier and flow-slot structure with Drr (component C6 in
// SPEC_FULL.md) but differs in admission policy (a short-term fair-share
// packet cap instead of a global byte budget) and, in ns-2 mode, in
// accounting unit (plain round robin instead of a byte quantum). Grounded
// on examples/original_source/ns-3/src/traffic-control/model/sfq-queue-disc.cc.
//
//   Sfq - the scheduler
//   Sfq::new(SfqConfig, Classifier, Option<&dyn MtuProvider>) -> Result<Sfq, ConfigError>
//   Sfq::enqueue(PacketDescriptor) -> bool
//   Sfq::dequeue() -> Option<PacketDescriptor>
//   Sfq::peek() -> Option<&PacketDescriptor>
//   Sfq::maybe_perturb(Instant) - rotate the classifier's hash salt, if configured

use super::classifier::Classifier;
use super::config::{ConfigError, MtuProvider, SfqConfig};
use super::flow::{ActiveList, FlowTable, Status};
use super::packet::PacketDescriptor;
use super::stats::{DropReason, DropSink, Stats};
use std::time::Instant;

pub struct Sfq {
    n: usize,
    max_packets: usize,
    quantum: u32,
    ns2_style: bool,
    fairshare: usize,
    classifier: Classifier,
    table: FlowTable,
    active: ActiveList,
    nbytes: u64,
    npackets: u64,
    stats: Stats,
    drop_sink: Box<dyn DropSink>,
    perturbation_interval: Option<std::time::Duration>,
    perturbation: u32,
    last_perturbed: Option<Instant>,
}

// Slot id reserved for packets no installed filter can classify (spec.md
// §4.9): one beyond the configured flow range, so unclassified traffic
// still gets its own fair share instead of being discarded outright.
fn overflow_slot(n: usize) -> usize {
    n
}

impl Sfq {
    pub fn new(config: SfqConfig, classifier: Classifier,
               mtu: Option<&dyn MtuProvider>) -> Result<Sfq, ConfigError> {
        config.check()?;
        if classifier.is_empty() {
            return Err(ConfigError::NoFilterInstalled);
        }
        let quantum = match config.quantum {
            Some(q) => q,
            None if config.ns2_style => 0, // ns-2 mode has no byte quantum
            None => mtu.map(|m| m.mtu()).unwrap_or(1500),
        };
        Ok(Sfq {
            n: config.n,
            max_packets: config.max_packets,
            quantum,
            ns2_style: config.ns2_style,
            fairshare: config.fairshare(),
            classifier,
            table: FlowTable::new(config.n + 1), // + the overflow slot
            active: ActiveList::new(),
            nbytes: 0,
            npackets: 0,
            stats: Stats::new(),
            drop_sink: Box::new(()),
            perturbation_interval: config.perturbation_interval,
            perturbation: 0,
            last_perturbed: None,
        })
    }

    pub fn with_drop_sink(mut self, sink: Box<dyn DropSink>) -> Sfq {
        self.drop_sink = sink;
        self
    }

    pub fn npackets(&self) -> u64 {
        self.npackets
    }

    pub fn nbytes(&self) -> u64 {
        self.nbytes
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    // SFQ's perturbation timer is a pull the external driver invokes
    // between operations (see SPEC_FULL.md §6) -- there is no event loop
    // inside this crate to own a callback.
    pub fn maybe_perturb(&mut self, now: Instant) {
        let interval = match self.perturbation_interval {
            Some(i) => i,
            None => return,
        };
        let due = match self.last_perturbed {
            Some(last) => now.duration_since(last) >= interval,
            None => true,
        };
        if due {
            self.perturbation = rand::random();
            self.last_perturbed = Some(now);
        }
    }

    pub fn enqueue(&mut self, pkt: PacketDescriptor) -> bool {
        let slot_id = match self.classifier.classify(&pkt, self.perturbation) {
            Some(hash) => hash as usize % self.n,
            None => overflow_slot(self.n),
        };

        let current_flow_packets = self.table.get(slot_id).map(|s| s.packets()).unwrap_or(0);

        let admit = if self.ns2_style {
            let left = self.max_packets as i64 - self.npackets as i64;
            !(left <= 0 || (left < self.n as i64 && current_flow_packets as i64 > self.fairshare as i64))
        } else {
            let remaining = self.max_packets as i64 - self.npackets as i64;
            !(self.npackets as i64 >= self.max_packets as i64
              || (remaining < self.n as i64 && current_flow_packets > self.fairshare))
        };

        if !admit {
            self.stats.record(DropReason::OverlimitDrop);
            self.drop_sink.on_drop(&pkt, DropReason::OverlimitDrop);
            return false;
        }

        let slot = self.table.get_or_create(slot_id);
        if slot.status == Status::Inactive {
            slot.status = Status::Active;
            if !self.ns2_style {
                slot.deficit = self.quantum as i64;
            }
            self.active.push_back(slot_id);
        }
        self.nbytes += pkt.size as u64;
        self.npackets += 1;
        slot.push(pkt);
        true
    }

    pub fn dequeue(&mut self) -> Option<PacketDescriptor> {
        if self.ns2_style {
            return self.dequeue_ns2();
        }
        loop {
            let slot_id = loop {
                let id = self.active.front()?;
                let slot = self.table.get_mut(id).expect("active slot must exist");
                if slot.deficit <= 0 {
                    slot.deficit += self.quantum as i64;
                    self.active.pop_front();
                    self.active.push_back(id);
                } else {
                    break id;
                }
            };
            self.active.pop_front();
            let slot = self.table.get_mut(slot_id).expect("active slot must exist");
            let pkt = match slot.pop() {
                Some(p) => p,
                None => continue, // stale entry, already drained
            };
            self.nbytes -= pkt.size as u64;
            self.npackets -= 1;
            slot.deficit -= pkt.size as i64;
            if slot.is_empty() {
                slot.status = Status::Inactive;
                slot.deficit = 0;
            } else {
                self.active.push_back(slot_id);
            }
            return Some(pkt);
        }
    }

    fn dequeue_ns2(&mut self) -> Option<PacketDescriptor> {
        let slot_id = self.active.pop_front()?;
        let slot = self.table.get_mut(slot_id)?;
        let pkt = slot.pop()?;
        self.nbytes -= pkt.size as u64;
        self.npackets -= 1;
        if slot.is_empty() {
            slot.status = Status::Inactive;
        } else {
            self.active.push_back(slot_id);
        }
        Some(pkt)
    }

    pub fn peek(&self) -> Option<&PacketDescriptor> {
        let slot_id = self.active.front()?;
        self.table.get(slot_id).and_then(|s| s.peek())
    }
}

#[cfg(test)]
mod selftest {
    use super::*;
    use crate::classifier::{Classifier, Family, PROTOCOL_TCP};
    use crate::packet::Address;
    use std::net::Ipv4Addr;

    fn ip(a: u8, b: u8, c: u8, d: u8) -> Address {
        Address::v4(Ipv4Addr::new(a, b, c, d))
    }

    fn tcp(size: u32, dst: Address) -> PacketDescriptor {
        PacketDescriptor::new(size, ip(10, 0, 0, 1), dst, PROTOCOL_TCP).with_ports(1, 1)
    }

    fn sfq(max_packets: usize, n: usize, quantum: u32) -> Sfq {
        let mut c = SfqConfig::new();
        c.max_packets = max_packets;
        c.n = n;
        c.quantum = Some(quantum);
        Sfq::new(c, Classifier::new(vec![Family::V4]), None).unwrap()
    }

    // Scenario S5: fair-share admission
    #[test]
    fn fairshare_admission() {
        let mut s = sfq(8, 4, 90);
        let a = ip(10, 0, 0, 1);
        let b = ip(10, 0, 0, 2);
        assert!(s.enqueue(tcp(60, a)));
        assert!(s.enqueue(tcp(60, a)));
        assert!(s.enqueue(tcp(60, b)));
        assert!(s.enqueue(tcp(60, b)));
        assert!(s.enqueue(tcp(60, b)));
        assert_eq!(s.npackets(), 5);
        assert!(!s.enqueue(tcp(60, b)));
        assert_eq!(s.npackets(), 5);
        assert_eq!(s.stats().overlimit_drops, 1);
    }

    // Scenario S6: allot rotation
    #[test]
    fn allot_rotation() {
        let mut s = sfq(1000, 16, 90);
        let a = ip(10, 0, 0, 1);
        let b = ip(10, 0, 0, 2);
        s.enqueue(tcp(120, a));
        s.enqueue(tcp(120, a));

        let p = s.dequeue().unwrap();
        let a_hash = s.classifier.classify(&tcp(0, a), 0).unwrap() as usize % s.n;
        println!("dequeued {} bytes, A's allot now {}", p.size, s.table.get(a_hash).unwrap().deficit);
        assert_eq!(p.size, 120);
        assert_eq!(s.table.get(a_hash).unwrap().deficit, -30);
        assert_eq!(s.table.get(a_hash).unwrap().status, Status::Active);

        s.enqueue(tcp(120, b));
        let p = s.dequeue().unwrap();
        assert_eq!(p.size, 120);
        let b_hash = s.classifier.classify(&tcp(0, b), 0).unwrap() as usize % s.n;
        assert_eq!(b_hash, s.table.iter().find(|(id, _)| *id != a_hash).unwrap().0);
        // A was rotated out of the way (credited +90) while B, found with a
        // positive allot, was serviced.
        assert_eq!(s.table.get(a_hash).unwrap().deficit, 60);
    }

    #[test]
    fn unclassified_goes_to_overflow_slot() {
        let mut s = sfq(100, 4, 90);
        let p = PacketDescriptor::new(60, Address::V6(1), Address::V6(2), PROTOCOL_TCP);
        assert!(s.enqueue(p));
        assert_eq!(s.npackets(), 1);
        let overflow = s.dequeue().unwrap();
        assert_eq!(overflow.size, 60);
    }

    #[test]
    fn ns2_mode_round_robin_no_quantum() {
        let mut c = SfqConfig::new();
        c.ns2_style = true;
        c.max_packets = 100;
        c.n = 4;
        let mut s = Sfq::new(c, Classifier::new(vec![Family::V4]), None).unwrap();
        let a = ip(10, 0, 0, 1);
        assert!(s.enqueue(tcp(120, a)));
        let p = s.dequeue().unwrap();
        assert_eq!(p.size, 120);
        assert_eq!(s.npackets(), 0);
        assert_eq!(s.nbytes(), 0);
    }

    #[test]
    fn ns2_mode_admission_tight_capacity() {
        let mut c = SfqConfig::new();
        c.ns2_style = true;
        c.max_packets = 8;
        c.n = 4;
        let mut s = Sfq::new(c, Classifier::new(vec![Family::V4]), None).unwrap();
        let a = ip(10, 0, 0, 1);
        let b = ip(10, 0, 0, 2);
        for _ in 0..2 { s.enqueue(tcp(60, a)); }
        for _ in 0..3 { s.enqueue(tcp(60, b)); }
        assert_eq!(s.npackets(), 5);
        assert!(!s.enqueue(tcp(60, b)));
        assert_eq!(s.stats().overlimit_drops, 1);
    }
}
