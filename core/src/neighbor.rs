//! Reads the host's neighbor (ARP) cache and keeps the entries that fall
//! inside the swept target.

use std::path::Path;

use aliver_common::network::target::Target;
use aliver_common::record::DiscoveryRecord;
use aliver_protocols::neighbor::{self, NeighborEntry};
use anyhow::{Context, bail};
use tokio::process::Command;
use tracing::{debug, info};

const PROC_NET_ARP: &str = "/proc/net/arp";

/// Returns the cached neighbors that belong to `target`, ordered as the
/// operating system listed them.
pub async fn read_neighbor_cache(target: &Target) -> anyhow::Result<Vec<DiscoveryRecord>> {
    let entries = read_entries().await?;
    debug!("neighbor cache holds {} complete entries", entries.len());
    Ok(records_for_target(entries, target))
}

pub fn records_for_target(entries: Vec<NeighborEntry>, target: &Target) -> Vec<DiscoveryRecord> {
    entries
        .into_iter()
        .filter(|entry| target.contains(&entry.address))
        .map(|entry| {
            info!("Neighbor {} is at {} ({})", entry.address, entry.hardware_address, entry.state);
            DiscoveryRecord::neighbor(entry.address, entry.hardware_address, entry.state)
        })
        .collect()
}

async fn read_entries() -> anyhow::Result<Vec<NeighborEntry>> {
    if Path::new(PROC_NET_ARP).exists() {
        let contents = tokio::fs::read_to_string(PROC_NET_ARP)
            .await
            .with_context(|| format!("failed to read {PROC_NET_ARP}"))?;
        return Ok(neighbor::parse_proc_net_arp(&contents));
    }

    let output = Command::new("arp")
        .arg("-a")
        .output()
        .await
        .context("failed to run `arp -a`")?;
    if !output.status.success() {
        bail!("`arp -a` exited with {}", output.status);
    }
    Ok(neighbor::parse_arp_output(&String::from_utf8_lossy(&output.stdout)))
}
