use std::net::Ipv4Addr;

use anyhow::Context;
use pnet::datalink::{self, NetworkInterface};
use pnet::ipnetwork::{IpNetwork, Ipv4Network};
use tracing::debug;

use crate::network::target::Target;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ViabilityError {
    /// The interface is operationally down.
    IsDown,
    /// Loopback is never a discovery candidate.
    IsLoopback,
    /// The interface has no IPv4 network attached.
    NoIpv4,
}

/// The local IPv4 network used when no target is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNetwork {
    pub interface: String,
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub network: Ipv4Network,
}

impl LocalNetwork {
    pub fn target(&self) -> Target {
        Target::from(self.network)
    }
}

pub trait NetworkInterfaceExtension {
    fn get_ipv4_nets(&self) -> Vec<Ipv4Network>;
}

impl NetworkInterfaceExtension for NetworkInterface {
    fn get_ipv4_nets(&self) -> Vec<Ipv4Network> {
        self.ips
            .iter()
            .filter_map(|ip| {
                if let IpNetwork::V4(ipv4) = ip {
                    Some(*ipv4)
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Finds the primary LAN network of this host.
pub fn get_lan_network() -> anyhow::Result<LocalNetwork> {
    let interfaces: Vec<NetworkInterface> = datalink::interfaces();
    let lan = select_lan_network(&interfaces).context("no usable network interface found")?;
    debug!("using {} on {} as the local network", lan.network, lan.interface);
    Ok(lan)
}

/// Picks the first viable interface and its IPv4 network, preferring private
/// addresses over public ones.
pub fn select_lan_network(interfaces: &[NetworkInterface]) -> Option<LocalNetwork> {
    let viable: Vec<&NetworkInterface> = interfaces
        .iter()
        .filter(|interface| is_viable_lan_interface(interface).is_ok())
        .collect();

    let pick = |want_private: bool| {
        viable.iter().find_map(|interface| {
            interface
                .get_ipv4_nets()
                .into_iter()
                .find(|net| !net.ip().is_loopback() && net.ip().is_private() == want_private)
                .map(|net| LocalNetwork {
                    interface: interface.name.clone(),
                    address: net.ip(),
                    netmask: net.mask(),
                    network: net,
                })
        })
    };

    pick(true).or_else(|| pick(false))
}

fn is_viable_lan_interface(interface: &NetworkInterface) -> Result<(), ViabilityError> {
    if !interface.is_up() {
        return Err(ViabilityError::IsDown);
    }
    if interface.is_loopback() {
        return Err(ViabilityError::IsLoopback);
    }
    if interface.get_ipv4_nets().is_empty() {
        return Err(ViabilityError::NoIpv4);
    }
    Ok(())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
