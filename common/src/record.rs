use std::fmt;
use std::net::Ipv4Addr;

/// Placeholder for a hardware address the probe cannot see.
pub const UNKNOWN_HARDWARE: &str = "unknown";
/// Status attached to every host answering an echo request.
pub const STATUS_ONLINE: &str = "online";

/// Which probe produced a [`DiscoveryRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProbeSource {
    Icmp,
    NeighborCache,
}

impl fmt::Display for ProbeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeSource::Icmp => f.write_str("ICMP"),
            ProbeSource::NeighborCache => f.write_str("ARP cache"),
        }
    }
}

/// One observed or inferred host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveryRecord {
    pub address: Ipv4Addr,
    pub hardware_address: String,
    pub status: String,
    pub source: ProbeSource,
}

impl DiscoveryRecord {
    /// A host that answered an ICMP echo request.
    pub fn echo_reply(address: Ipv4Addr) -> Self {
        Self {
            address,
            hardware_address: UNKNOWN_HARDWARE.to_string(),
            status: STATUS_ONLINE.to_string(),
            source: ProbeSource::Icmp,
        }
    }

    /// A host found in the operating system's neighbor cache.
    pub fn neighbor(address: Ipv4Addr, hardware_address: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            address,
            hardware_address: hardware_address.into(),
            status: status.into(),
            source: ProbeSource::NeighborCache,
        }
    }
}

/// Sorts records by numeric address; records sharing an address keep their
/// arrival order.
pub fn sort_by_address(records: &mut [DiscoveryRecord]) {
    records.sort_by_key(|record| record.address);
}
