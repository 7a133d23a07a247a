pub mod discover;

use std::path::PathBuf;
use std::time::Duration;

use aliver_common::config::{Config, DEFAULT_CONCURRENCY, DEFAULT_REPORT_PATH, SweepConfig};
use aliver_common::network::target::{Target, TargetError};
use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(name = "aliver")]
#[command(version, about = "Finds live IPv4 hosts with an ICMP sweep and the local ARP cache.")]
pub struct CommandLine {
    /// Probe a single IPv4 address
    #[arg(short = 'i', long = "ip", value_name = "ADDRESS", conflicts_with = "network")]
    pub ip: Option<String>,

    /// Probe every host of a CIDR block, e.g. 192.168.1.0/24
    #[arg(short = 'n', long = "network", value_name = "CIDR")]
    pub network: Option<String>,

    /// Maximum number of echo requests in flight
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Delay between two submitted addresses, in milliseconds
    #[arg(long = "pacing-ms", value_name = "MS", default_value_t = 10)]
    pub pacing_ms: u64,

    /// How long to keep listening after the last request, in milliseconds
    #[arg(long = "window-ms", value_name = "MS", default_value_t = 2000)]
    pub window_ms: u64,

    /// Where to write the text report
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_REPORT_PATH)]
    pub output: PathBuf,

    /// Skip reading the ARP cache
    #[arg(long)]
    pub no_arp: bool,

    /// Less output; repeat for even less
    #[arg(short, action = ArgAction::Count)]
    pub quiet: u8,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The requested target, or `None` to fall back to the local network.
    pub fn target(&self) -> Result<Option<Target>, TargetError> {
        self.ip
            .as_deref()
            .or(self.network.as_deref())
            .map(str::parse)
            .transpose()
    }

    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig::default()
            .with_concurrency(self.concurrency)
            .with_pacing(Duration::from_millis(self.pacing_ms))
            .with_drain_window(Duration::from_millis(self.window_ms))
    }

    pub fn config(&self) -> Config {
        Config {
            quiet: self.quiet,
            output: self.output.clone(),
            no_arp: self.no_arp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CommandLine, clap::Error> {
        CommandLine::try_parse_from(std::iter::once("aliver").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_without_arguments() {
        let cmd = parse(&[]).unwrap();
        assert!(cmd.target().unwrap().is_none());
        assert_eq!(cmd.sweep_config(), SweepConfig::default());

        let cfg = cmd.config();
        assert_eq!(cfg.output, PathBuf::from(DEFAULT_REPORT_PATH));
        assert_eq!(cfg.quiet, 0);
        assert!(!cfg.no_arp);
    }

    #[test]
    fn address_and_network_are_exclusive() {
        let err = parse(&["-i", "10.0.0.5", "-n", "10.0.0.0/24"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn network_flag_yields_a_block() {
        let cmd = parse(&["-n", "192.168.1.7/30"]).unwrap();
        assert_eq!(cmd.target().unwrap().unwrap().to_string(), "192.168.1.4/30");
    }

    #[test]
    fn bad_target_is_reported_before_probing() {
        let cmd = parse(&["--ip", "10.0.0.256"]).unwrap();
        assert!(cmd.target().is_err());
    }

    #[test]
    fn tunables_reach_the_sweep_config() {
        let cmd = parse(&["--concurrency", "0", "--pacing-ms", "0", "--window-ms", "500", "-qq", "--no-arp"]).unwrap();
        let sweep = cmd.sweep_config();
        assert_eq!(sweep.concurrency, 1);
        assert_eq!(sweep.pacing, Duration::ZERO);
        assert_eq!(sweep.drain_window, Duration::from_millis(500));
        assert_eq!(cmd.config().quiet, 2);
        assert!(cmd.config().no_arp);
    }
}
