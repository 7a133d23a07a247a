//! Plain-text discovery report.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use aliver_common::network::target::Target;
use aliver_common::record::{self, DiscoveryRecord};
use anyhow::Context;
use chrono::{DateTime, Local};
use tracing::debug;

const BANNER_RULE: &str = "=======================";
const TABLE_RULE: &str = "------------------------------------------------------";

pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes both result sets, each sorted by address, to the report file.
    pub fn write(&self, icmp: &[DiscoveryRecord], neighbors: &[DiscoveryRecord], target: &Target) -> anyhow::Result<()> {
        let file = File::create(&self.path)
            .with_context(|| format!("failed to create report file {}", self.path.display()))?;
        let mut out = BufWriter::new(file);

        render(&mut out, icmp, neighbors, target, Local::now())
            .and_then(|()| out.flush())
            .with_context(|| format!("failed to write report file {}", self.path.display()))?;

        debug!("report written to {}", self.path.display());
        Ok(())
    }
}

pub fn render<W: Write>(
    out: &mut W,
    icmp: &[DiscoveryRecord],
    neighbors: &[DiscoveryRecord],
    target: &Target,
    generated_at: DateTime<Local>,
) -> io::Result<()> {
    writeln!(out, "=== Network Discovery Report ===")?;
    writeln!(out, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S"))?;
    if target.is_single_host() {
        writeln!(out, "Target address: {target}")?;
    } else {
        writeln!(out, "Target network: {target}")?;
    }
    writeln!(out, "{BANNER_RULE}\n")?;

    writeln!(out, "=== ICMP Results ===")?;
    writeln!(out, "Discovered {} active hosts\n", icmp.len())?;
    write_table(out, icmp)?;

    writeln!(out, "\n=== ARP Cache Results ===")?;
    writeln!(out, "Read {} ARP cache entries\n", neighbors.len())?;
    write_table(out, neighbors)?;

    writeln!(out, "\n{BANNER_RULE}")?;
    writeln!(out, "Report complete.")?;
    Ok(())
}

fn write_table<W: Write>(out: &mut W, records: &[DiscoveryRecord]) -> io::Result<()> {
    writeln!(out, "{:<15} {:<20} {:<10} {:<10}", "IP Address", "MAC Address", "Status", "Source")?;
    writeln!(out, "{TABLE_RULE}")?;

    let mut sorted = records.to_vec();
    record::sort_by_address(&mut sorted);
    for r in &sorted {
        writeln!(
            out,
            "{:<15} {:<20} {:<10} {:<10}",
            r.address.to_string(),
            r.hardware_address,
            r.status,
            r.source.to_string()
        )?;
    }
    Ok(())
}
