//! # Sweep Target Model
//!
//! A target is what the user asks to probe:
//! * A single IPv4 address (e.g. `10.0.0.5`).
//! * A CIDR block (e.g. `192.168.1.0/24`).
//!
//! Parsing happens before any socket is opened, so a bad specification is
//! reported without touching the network.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use pnet::ipnetwork::Ipv4Network;
use thiserror::Error;

use crate::network::range::{self, Ipv4Range};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("invalid target '{spec}': expected an IPv4 address or a CIDR block ({reason})")]
    InvalidSpec { spec: String, reason: String },
}

impl TargetError {
    fn invalid(spec: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSpec {
            spec: spec.to_string(),
            reason: reason.into(),
        }
    }
}

/// Represents a distinct target to be swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Probe a single specific host.
    Host { addr: Ipv4Addr },
    /// Probe every usable host of a CIDR block.
    Network { net: Ipv4Network },
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((ip_str, prefix_str)) = s.split_once('/') {
            return parse_cidr(s, ip_str, prefix_str);
        }

        s.parse::<Ipv4Addr>()
            .map(|addr| Target::Host { addr })
            .map_err(|e| TargetError::invalid(s, e.to_string()))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Host { addr } => write!(f, "{addr}"),
            Target::Network { net } => write!(f, "{}/{}", net.network(), net.prefix()),
        }
    }
}

impl From<Ipv4Addr> for Target {
    fn from(addr: Ipv4Addr) -> Self {
        Target::Host { addr }
    }
}

impl From<Ipv4Network> for Target {
    /// Host bits are cleared, so `192.168.1.77/24` and `192.168.1.0/24` are
    /// the same target.
    fn from(net: Ipv4Network) -> Self {
        let net = Ipv4Network::new(net.network(), net.prefix()).unwrap_or(net);
        Target::Network { net }
    }
}

impl Target {
    pub fn is_single_host(&self) -> bool {
        matches!(self, Target::Host { .. })
    }

    /// Lazily enumerable range of the addresses to probe.
    pub fn host_range(&self) -> Ipv4Range {
        match self {
            Target::Host { addr } => Ipv4Range::single(*addr),
            Target::Network { net } => range::host_range(net),
        }
    }

    /// Ordered list of the addresses to probe, ascending.
    pub fn addresses(&self) -> Vec<Ipv4Addr> {
        self.host_range().to_iter().collect()
    }

    /// Whether `addr` belongs to the target.
    ///
    /// Network and broadcast addresses count as members of a block here, since
    /// neighbor caches can legitimately hold them.
    pub fn contains(&self, addr: &Ipv4Addr) -> bool {
        match self {
            Target::Host { addr: target } => target == addr,
            Target::Network { net } => net.contains(*addr),
        }
    }
}

fn parse_cidr(s: &str, ip_str: &str, prefix_str: &str) -> Result<Target, TargetError> {
    let ipv4_addr = ip_str
        .parse::<Ipv4Addr>()
        .map_err(|e| TargetError::invalid(s, format!("invalid IP '{ip_str}': {e}")))?;

    let prefix = prefix_str
        .parse::<u8>()
        .map_err(|e| TargetError::invalid(s, format!("invalid prefix '{prefix_str}': {e}")))?;

    let net = Ipv4Network::new(ipv4_addr, prefix)
        .map_err(|e| TargetError::invalid(s, e.to_string()))?;

    Ok(Target::from(net))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
