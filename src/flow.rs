// FLOW SLOTS, FLOW TABLE, ACTIVE LIST
//
// A FlowSlot is created on first enqueue to its hash bucket and persists for
// the scheduler's lifetime, toggling between Inactive and Active as packets
// arrive and drain. The FlowTable is a dense array indexed by slot id
// (0..n) rather than a hash map -- n is small and bounded by Config, so a
// sparse Vec<Option<FlowSlot>> gives lazy creation (C3) with O(1) lookup and
// no hashing overhead. The ActiveList models the original's intrusive
// linked list of flow objects as a queue of slot ids instead, which avoids
// the back-pointer reference cycle the original wiring has (see Design
// Notes in SPEC_FULL.md).
//
//   Status - Inactive or Active (whether a slot is on the ActiveList)
//   FlowSlot - one flow's subqueue, deficit/allot, and status
//   FlowTable - slot id -> FlowSlot, with lazy creation
//   ActiveList - service-order queue of slot ids

use super::packet::PacketDescriptor;
use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Inactive,
    Active,
}

pub struct FlowSlot {
    pub subqueue: VecDeque<PacketDescriptor>,
    // Signed so credit/debit arithmetic during dequeue can transiently go
    // negative (SPEC_FULL.md / spec.md §3); always >= 0 while Active.
    pub deficit: i64,
    pub status: Status,
    bytes: u64,
}

impl FlowSlot {
    fn new() -> FlowSlot {
        FlowSlot {
            subqueue: VecDeque::new(),
            deficit: 0,
            status: Status::Inactive,
            bytes: 0,
        }
    }

    pub fn push(&mut self, pkt: PacketDescriptor) {
        self.bytes += pkt.size as u64;
        self.subqueue.push_back(pkt);
    }

    pub fn pop(&mut self) -> Option<PacketDescriptor> {
        let pkt = self.subqueue.pop_front();
        if let Some(ref p) = pkt {
            self.bytes -= p.size as u64;
        }
        pkt
    }

    pub fn peek(&self) -> Option<&PacketDescriptor> {
        self.subqueue.front()
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn packets(&self) -> usize {
        self.subqueue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subqueue.is_empty()
    }
}

pub struct FlowTable {
    slots: Vec<Option<FlowSlot>>,
}

impl FlowTable {
    pub fn new(n: usize) -> FlowTable {
        let mut slots = Vec::with_capacity(n);
        slots.resize_with(n, || None);
        FlowTable { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    // Lazily creates the slot on first touch (C3).
    pub fn get_or_create(&mut self, id: usize) -> &mut FlowSlot {
        self.slots[id].get_or_insert_with(FlowSlot::new)
    }

    pub fn get(&self, id: usize) -> Option<&FlowSlot> {
        self.slots[id].as_ref()
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut FlowSlot> {
        self.slots[id].as_mut()
    }

    // Existing (possibly empty) slots, for the overflow scan in C5 (§4.5).
    // Tie-break on the largest backlog is "lowest slot id", which falls out
    // naturally from scanning in index order and using a strict `>`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &FlowSlot)> {
        self.slots.iter().enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i, s)))
    }
}

// Ordered working set of slots eligible to transmit this round; insertion
// order is service order.
#[derive(Default)]
pub struct ActiveList {
    queue: VecDeque<usize>,
}

impl ActiveList {
    pub fn new() -> ActiveList {
        ActiveList { queue: VecDeque::new() }
    }

    pub fn push_back(&mut self, id: usize) {
        self.queue.push_back(id);
    }

    pub fn pop_front(&mut self) -> Option<usize> {
        self.queue.pop_front()
    }

    pub fn front(&self) -> Option<usize> {
        self.queue.front().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    // Drops the first occurrence of `id`, if present. Used when a slot is
    // drained outside its own dequeue turn (overflow stealing) so it never
    // lingers on the list while Inactive.
    pub fn remove(&mut self, id: usize) {
        if let Some(pos) = self.queue.iter().position(|&x| x == id) {
            self.queue.remove(pos);
        }
    }
}

#[cfg(test)]
mod selftest {
    use super::*;
    use crate::classifier::PROTOCOL_TCP;
    use crate::packet::Address;
    use std::net::Ipv4Addr;

    fn pkt(size: u32) -> PacketDescriptor {
        PacketDescriptor::new(size, Address::v4(Ipv4Addr::new(1, 2, 3, 4)),
                               Address::v4(Ipv4Addr::new(5, 6, 7, 8)), PROTOCOL_TCP)
    }

    #[test]
    fn lazy_creation() {
        let mut t = FlowTable::new(4);
        assert!(t.get(0).is_none());
        t.get_or_create(0).push(pkt(100));
        assert_eq!(t.get(0).unwrap().bytes(), 100);
    }

    #[test]
    fn slot_byte_and_packet_counts_track_subqueue() {
        let mut s = FlowSlot::new();
        s.push(pkt(100));
        s.push(pkt(200));
        assert_eq!(s.bytes(), 300);
        assert_eq!(s.packets(), 2);
        s.pop();
        assert_eq!(s.bytes(), 200);
        assert_eq!(s.packets(), 1);
    }

    #[test]
    fn active_list_is_fifo() {
        let mut a = ActiveList::new();
        a.push_back(3);
        a.push_back(1);
        assert_eq!(a.front(), Some(3));
        assert_eq!(a.pop_front(), Some(3));
        assert_eq!(a.pop_front(), Some(1));
        assert!(a.is_empty());
    }

    #[test]
    fn remove_drops_first_occurrence_only() {
        let mut a = ActiveList::new();
        a.push_back(3);
        a.push_back(1);
        a.push_back(3);
        a.remove(3);
        assert_eq!(a.pop_front(), Some(1));
        assert_eq!(a.pop_front(), Some(3));
        assert!(a.is_empty());
    }

    #[test]
    fn remove_of_absent_id_is_a_noop() {
        let mut a = ActiveList::new();
        a.push_back(5);
        a.remove(9);
        assert_eq!(a.len(), 1);
    }
}
