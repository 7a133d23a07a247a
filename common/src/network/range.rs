use std::net::Ipv4Addr;

use pnet::ipnetwork::Ipv4Network;

/// Inclusive range of IPv4 addresses, iterated in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    pub start_addr: Ipv4Addr,
    pub end_addr: Ipv4Addr,
}

impl Ipv4Range {
    pub fn new(start_addr: Ipv4Addr, end_addr: Ipv4Addr) -> Self {
        Self {
            start_addr,
            end_addr,
        }
    }

    pub fn single(addr: Ipv4Addr) -> Self {
        Self::new(addr, addr)
    }

    pub fn to_iter(&self) -> impl Iterator<Item = Ipv4Addr> + use<> {
        let start: u32 = self.start_addr.into();
        let end: u32 = self.end_addr.into();
        (start..=end).map(Ipv4Addr::from)
    }

    /// Number of addresses in the range; zero when `start_addr > end_addr`.
    pub fn len(&self) -> u64 {
        let start: u32 = self.start_addr.into();
        let end: u32 = self.end_addr.into();
        if start > end {
            return 0;
        }
        u64::from(end - start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, addr: &Ipv4Addr) -> bool {
        let addr: u32 = (*addr).into();
        u32::from(self.start_addr) <= addr && addr <= u32::from(self.end_addr)
    }
}

/// Full span of a CIDR block, network and broadcast included.
pub fn cidr_range(net: &Ipv4Network) -> Ipv4Range {
    Ipv4Range::new(net.network(), net.broadcast())
}

/// Addresses worth probing inside a CIDR block.
///
/// Blocks with more than two addresses (prefix <= 30) lose their network and
/// broadcast address. A `/31` is a point-to-point link where both addresses
/// are hosts, and a `/32` is the host itself.
pub fn host_range(net: &Ipv4Network) -> Ipv4Range {
    let full = cidr_range(net);
    if net.prefix() >= 31 {
        return full;
    }

    let start_u32 = u32::from(full.start_addr).saturating_add(1);
    let end_u32 = u32::from(full.end_addr).saturating_sub(1);
    Ipv4Range::new(Ipv4Addr::from(start_u32), Ipv4Addr::from(end_u32))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
