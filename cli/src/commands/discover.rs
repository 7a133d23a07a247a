use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use aliver_common::config::{Config, SweepConfig};
use aliver_common::network::interface::{self, LocalNetwork};
use aliver_common::network::target::Target;
use aliver_common::record::{DiscoveryRecord, UNKNOWN_HARDWARE};
use aliver_core::neighbor;
use aliver_core::report::ReportWriter;
use aliver_core::sweep::SweepEngine;
use anyhow::Context;
use colored::*;
use is_root::is_root;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::mprint;
use crate::terminal::{colors, print, spinner};

type Detail = (String, ColoredString);

pub async fn discover(target: Option<Target>, sweep_cfg: SweepConfig, cfg: &Config) -> anyhow::Result<()> {
    let target: Target = match target {
        Some(target) => target,
        None => {
            let local = interface::get_lan_network().context("no target given and no local network detected")?;
            print_local_network(&local, cfg);
            local.target()
        }
    };

    print::header("getting ready for discovery", cfg.quiet);
    if !is_root() {
        warn!("Not running as root; opening the raw ICMP socket will likely fail");
    }

    let cancel = CancellationToken::new();
    let ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                match on_interrupt(&cancel) {
                    Interrupt::KeepResults => warn!("Interrupted, keeping what was found so far..."),
                    Interrupt::Exit => {
                        spinner::get_spinner().finish_and_clear();
                        warn!("Interrupted again, exiting without a report");
                        std::process::exit(130);
                    }
                }
            }
        }
    });

    let engine = SweepEngine::new(sweep_cfg)
        .with_cancellation(cancel.clone())
        .with_progress(Box::new(spinner::report_discovery_progress));

    let start_time: Instant = Instant::now();
    spinner::set_status(&format!("Sweeping {target}..."));
    let icmp: Vec<DiscoveryRecord> = match engine.sweep(&target).await {
        Ok(records) => records,
        Err(e) => {
            ctrl_c.abort();
            return Err(e.into());
        }
    };
    print::success(format!("ICMP sweep found {} active hosts", icmp.len()));

    let neighbors: Vec<DiscoveryRecord> = if cfg.no_arp {
        Vec::new()
    } else {
        spinner::set_status("Reading the ARP cache...");
        read_arp_cache(&target, &cancel).await
    };

    let writer = ReportWriter::new(&cfg.output);
    writer.write(&icmp, &neighbors, &target)?;
    spinner::get_spinner().finish_and_clear();
    info!("Report written to {}", writer.path().display());

    discovery_ends(&icmp, &neighbors, start_time.elapsed(), cfg);
    ctrl_c.abort();
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    KeepResults,
    Exit,
}

/// The first Ctrl-C stops the running stage, a second one leaves at once.
fn on_interrupt(cancel: &CancellationToken) -> Interrupt {
    if cancel.is_cancelled() {
        return Interrupt::Exit;
    }
    cancel.cancel();
    Interrupt::KeepResults
}

/// An interrupt that already stopped the sweep does not cut the cache read short.
async fn read_arp_cache(target: &Target, cancel: &CancellationToken) -> Vec<DiscoveryRecord> {
    let read = neighbor::read_neighbor_cache(target);
    let result = if cancel.is_cancelled() {
        read.await
    } else {
        match until_cancelled(read, cancel).await {
            Some(result) => result,
            None => {
                warn!("ARP cache read interrupted, reporting ICMP results only");
                return Vec::new();
            }
        }
    };

    match result {
        Ok(records) => {
            info!("ARP cache holds {} entries in range", records.len());
            records
        }
        Err(e) => {
            warn!("Could not read the ARP cache: {e:#}");
            Vec::new()
        }
    }
}

async fn until_cancelled<F: Future>(fut: F, cancel: &CancellationToken) -> Option<F::Output> {
    tokio::select! {
        output = fut => Some(output),
        _ = cancel.cancelled() => None,
    }
}

fn print_local_network(local: &LocalNetwork, cfg: &Config) {
    if cfg.quiet > 0 {
        return;
    }
    print::header("local network", cfg.quiet);
    print::set_key_width(["Interface", "Address", "Netmask", "Network"]);
    print::aligned_line("Interface", local.interface.as_str());
    print::aligned_line("Address", local.address.to_string().color(colors::IPV4_ADDR));
    print::aligned_line("Netmask", local.netmask.to_string());
    print::aligned_line("Network", format_network(local));
}

fn format_network(local: &LocalNetwork) -> ColoredString {
    let address = local.network.network().to_string().color(colors::IPV4_ADDR);
    let prefix = local.network.prefix().to_string().color(colors::IPV4_PREFIX);
    format!("{address}/{prefix}").color(colors::SEPARATOR)
}

fn discovery_ends(icmp: &[DiscoveryRecord], neighbors: &[DiscoveryRecord], total_time: Duration, cfg: &Config) {
    let hosts = group_by_address(icmp.iter().chain(neighbors));

    if hosts.is_empty() {
        print::header("zero hosts detected", cfg.quiet);
        print::no_results();
    } else {
        print::header("network discovery", cfg.quiet);
        if cfg.quiet < 2 {
            print_hosts(&hosts);
        }
    }
    print_summary(icmp.len(), neighbors.len(), total_time, cfg);
}

/// Records of every address, ascending, each group in arrival order.
fn group_by_address<'a>(records: impl Iterator<Item = &'a DiscoveryRecord>) -> BTreeMap<Ipv4Addr, Vec<&'a DiscoveryRecord>> {
    let mut hosts: BTreeMap<Ipv4Addr, Vec<&DiscoveryRecord>> = BTreeMap::new();
    for record in records {
        hosts.entry(record.address).or_default().push(record);
    }
    hosts
}

fn print_hosts(hosts: &BTreeMap<Ipv4Addr, Vec<&DiscoveryRecord>>) {
    for (idx, (addr, records)) in hosts.iter().enumerate() {
        print::tree_head(idx, &addr.to_string());
        print::as_tree_one_level(host_details(records));
        if idx + 1 != hosts.len() {
            mprint!();
        }
    }
}

fn host_details(records: &[&DiscoveryRecord]) -> Vec<Detail> {
    let mac: &str = records
        .iter()
        .map(|r| r.hardware_address.as_str())
        .find(|hw| *hw != UNKNOWN_HARDWARE)
        .unwrap_or(UNKNOWN_HARDWARE);
    let mac: ColoredString = if mac == UNKNOWN_HARDWARE { mac.dimmed() } else { mac.color(colors::MAC_ADDR) };

    let mut statuses: Vec<&str> = Vec::new();
    let mut sources: Vec<String> = Vec::new();
    for record in records {
        if !statuses.contains(&record.status.as_str()) {
            statuses.push(&record.status);
        }
        let source = record.source.to_string();
        if !sources.contains(&source) {
            sources.push(source);
        }
    }

    vec![
        ("MAC".to_string(), mac),
        ("Status".to_string(), statuses.join(", ").normal()),
        ("Source".to_string(), sources.join(", ").color(colors::SOURCE)),
    ]
}

fn print_summary(icmp_len: usize, neighbor_len: usize, total_time: Duration, cfg: &Config) {
    let active_hosts: ColoredString = format!("{icmp_len} active hosts").bold().green();
    let cached: ColoredString = format!("{neighbor_len} cached").bold().cyan();
    let total_time: ColoredString = format!("{:.2}s", total_time.as_secs_f64()).bold().yellow();
    let output: String = format!("Discovery Complete: {active_hosts} and {cached} in {total_time}")
        .color(colors::TEXT_DEFAULT)
        .to_string();

    match cfg.quiet {
        0 => {
            print::fat_separator();
            print::centerln(&output);
        }
        _ => {
            mprint!();
            print::success(&output);
        }
    }
}
