// PACKET DESCRIPTOR
//
// The scheduler never parses wire bytes. It receives a PacketDescriptor that
// already carries the fields the classifier needs (a "classifier-input
// extractor" is an external collaborator, not part of this crate). A
// descriptor is immutable once built; the scheduler only moves it between
// queues and hands it back to the caller on dequeue or drop.
//
//   PacketDescriptor - one packet's classifiable fields plus its byte size
//   Address - IPv4 or IPv6 address, whichever the original packet carried

use std::net::{Ipv4Addr, Ipv6Addr};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Address {
    V4(u32),
    V6(u128),
}

impl Address {
    pub fn v4(addr: Ipv4Addr) -> Address {
        Address::V4(u32::from(addr))
    }

    pub fn v6(addr: Ipv6Addr) -> Address {
        Address::V6(u128::from(addr))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketDescriptor {
    pub size: u32,
    pub src: Address,
    pub dst: Address,
    pub protocol: u8,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
    // True for the first fragment of a fragmented datagram, or for a
    // datagram that was never fragmented. False for any later fragment,
    // which carries no transport header and therefore no ports.
    pub first_fragment: bool,
}

impl PacketDescriptor {
    pub fn new(size: u32, src: Address, dst: Address, protocol: u8) -> PacketDescriptor {
        PacketDescriptor {
            size,
            src,
            dst,
            protocol,
            src_port: None,
            dst_port: None,
            first_fragment: true,
        }
    }

    pub fn with_ports(mut self, src_port: u16, dst_port: u16) -> PacketDescriptor {
        self.src_port = Some(src_port);
        self.dst_port = Some(dst_port);
        self
    }

    pub fn fragment(mut self, first_fragment: bool) -> PacketDescriptor {
        self.first_fragment = first_fragment;
        self
    }
}

#[cfg(test)]
mod selftest {
    use super::*;

    #[test]
    fn builder() {
        let p = PacketDescriptor::new(520, Address::v4(Ipv4Addr::new(10, 0, 0, 1)),
                                       Address::v4(Ipv4Addr::new(10, 0, 0, 2)), 6)
            .with_ports(12345, 80);
        assert_eq!(p.size, 520);
        assert_eq!(p.src_port, Some(12345));
        assert_eq!(p.dst_port, Some(80));
        assert!(p.first_fragment);
    }

    #[test]
    fn later_fragment_has_no_ports() {
        let p = PacketDescriptor::new(1400, Address::v4(Ipv4Addr::new(10, 0, 0, 1)),
                                       Address::v4(Ipv4Addr::new(10, 0, 0, 2)), 17)
            .fragment(false);
        assert!(!p.first_fragment);
        assert_eq!(p.src_port, None);
    }
}
