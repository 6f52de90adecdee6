// DEFICIT ROUND ROBIN SCHEDULER
//
// The core of this crate (component C5 in SPEC_FULL.md). Owns the flow
// table and active list, classifies and admits packets on enqueue, sheds
// from the largest backlog when the global byte budget is exceeded, and
// services the active list round-robin with a per-flow byte quantum on
// dequeue. Grounded on
// examples/original_source/drr-queue-disc.cc (DoEnqueue/DoDequeue/DoPeek/
// DRRDrop/CheckConfig/InitializeParams).
//
//   Drr - the scheduler
//   Drr::new(Config, Classifier, Option<&dyn MtuProvider>) -> Result<Drr, ConfigError>
//   Drr::enqueue(PacketDescriptor) -> bool
//   Drr::dequeue() -> Option<PacketDescriptor>
//   Drr::peek() -> Option<&PacketDescriptor>
//   Drr::npackets(), Drr::nbytes(), Drr::stats()

use super::classifier::Classifier;
use super::config::{Config, ConfigError, MtuProvider};
use super::flow::{ActiveList, FlowTable, Status};
use super::packet::PacketDescriptor;
use super::stats::{DropReason, DropSink, Stats};

pub struct Drr {
    n: usize,
    byte_limit: u64,
    quantum: u32,
    classifier: Classifier,
    table: FlowTable,
    active: ActiveList,
    nbytes: u64,
    npackets: u64,
    stats: Stats,
    drop_sink: Box<dyn DropSink>,
}

impl Drr {
    pub fn new(config: Config, classifier: Classifier,
               mtu: Option<&dyn MtuProvider>) -> Result<Drr, ConfigError> {
        config.check()?;
        if classifier.is_empty() {
            return Err(ConfigError::NoFilterInstalled);
        }
        // Quantum defaults to the device MTU when unset, per spec.md §4.7.
        let quantum = match config.quantum {
            Some(q) => q,
            None => mtu.map(|m| m.mtu()).unwrap_or(1500),
        };
        Ok(Drr {
            n: config.n,
            byte_limit: config.byte_limit,
            quantum,
            classifier,
            table: FlowTable::new(config.n),
            active: ActiveList::new(),
            nbytes: 0,
            npackets: 0,
            stats: Stats::new(),
            drop_sink: Box::new(()),
        })
    }

    pub fn with_drop_sink(mut self, sink: Box<dyn DropSink>) -> Drr {
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

    pub fn quantum(&self) -> u32 {
        self.quantum
    }

    // §4.3: classify, admit, and shed down to byte_limit.
    pub fn enqueue(&mut self, pkt: PacketDescriptor) -> bool {
        let slot_id = match self.classifier.classify(&pkt, 0) {
            Some(hash) => hash as usize % self.n,
            None => {
                self.drop(pkt, DropReason::UnclassifiedDrop);
                return false;
            }
        };

        let slot = self.table.get_or_create(slot_id);
        if slot.status == Status::Inactive {
            slot.status = Status::Active;
            self.active.push_back(slot_id);
        }
        self.nbytes += pkt.size as u64;
        self.npackets += 1;
        slot.push(pkt);

        while self.nbytes > self.byte_limit {
            self.steal();
        }
        true
    }

    // §4.5: drop one packet from the head of the flow with the largest
    // backlog, tie-broken by lowest slot id (FlowTable::iter scans in
    // index order).
    fn steal(&mut self) {
        let mut victim = None;
        let mut max_backlog = 0u64;
        for (id, slot) in self.table.iter() {
            let bytes = slot.bytes();
            if bytes > max_backlog {
                max_backlog = bytes;
                victim = Some(id);
            }
        }
        let victim = match victim {
            Some(id) => id,
            // Unreachable: nbytes > byte_limit implies some slot is
            // non-empty.
            None => return,
        };

        let slot = self.table.get_mut(victim).expect("victim slot vanished");
        let pkt = slot.pop().expect("victim slot had no packets to steal");
        self.nbytes -= pkt.size as u64;
        self.npackets -= 1;
        if slot.is_empty() {
            slot.deficit = 0;
            slot.status = Status::Inactive;
            // §4.5 step 3: a flow drained by DRRDrop outside its own turn
            // must come off the ActiveList immediately, not just have its
            // status flipped -- otherwise a later re-enqueue sees Inactive
            // and pushes the id again, giving the slot two entries while
            // Active (invariant #2).
            self.active.remove(victim);
        }
        self.drop(pkt, DropReason::OverlimitDrop);
    }

    // §4.4: credit the head slot, send if its deficit covers the head
    // packet, otherwise rotate and keep accumulating.
    pub fn dequeue(&mut self) -> Option<PacketDescriptor> {
        loop {
            let slot_id = self.active.pop_front()?;
            let slot = match self.table.get_mut(slot_id) {
                Some(s) if s.status == Status::Active && !s.is_empty() => s,
                // steal() removes a slot's id from the ActiveList whenever
                // it empties it, so this should be unreachable; kept as a
                // defensive guard against a stale entry rather than a
                // panic.
                _ => continue,
            };

            slot.deficit += self.quantum as i64;
            let head_size = slot.peek().expect("active slot must be non-empty").size as i64;

            if slot.deficit >= head_size {
                let pkt = slot.pop().expect("active slot must be non-empty");
                slot.deficit -= pkt.size as i64;
                self.nbytes -= pkt.size as u64;
                self.npackets -= 1;
                if slot.is_empty() {
                    slot.deficit = 0;
                    slot.status = Status::Inactive;
                } else {
                    self.active.push_back(slot_id);
                }
                return Some(pkt);
            }

            self.active.push_back(slot_id);
        }
    }

    // §4.6: advisory, non-rotating peek at the head of the head slot.
    pub fn peek(&self) -> Option<&PacketDescriptor> {
        let slot_id = self.active.front()?;
        self.table.get(slot_id).and_then(|s| s.peek())
    }

    fn drop(&mut self, pkt: PacketDescriptor, reason: DropReason) {
        self.stats.record(reason);
        self.drop_sink.on_drop(&pkt, reason);
    }
}
