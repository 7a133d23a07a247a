use std::path::PathBuf;
use std::time::Duration;

/// Upper bound of echo requests in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 30;
/// Delay between two address submissions to the dispatch pool.
pub const DEFAULT_PACING: Duration = Duration::from_millis(10);
/// Time spent listening for replies after the last request went out.
pub const DEFAULT_DRAIN_WINDOW: Duration = Duration::from_secs(2);
pub const DEFAULT_PAYLOAD: &[u8] = b"hello";
pub const DEFAULT_REPORT_PATH: &str = "aliver.txt";

/// Tunables of a single ICMP sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepConfig {
    pub concurrency: usize,
    pub pacing: Duration,
    pub drain_window: Duration,
    pub payload: Vec<u8>,
    /// Fixed echo identifier. `None` draws a random one per sweep.
    pub identifier: Option<u16>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            pacing: DEFAULT_PACING,
            drain_window: DEFAULT_DRAIN_WINDOW,
            payload: DEFAULT_PAYLOAD.to_vec(),
            identifier: None,
        }
    }
}

impl SweepConfig {
    /// Concurrency is clamped to at least one worker.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_drain_window(mut self, drain_window: Duration) -> Self {
        self.drain_window = drain_window;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn with_identifier(mut self, identifier: u16) -> Self {
        self.identifier = Some(identifier);
        self
    }
}

/// Switches that shape a whole invocation rather than the sweep itself.
#[derive(Debug, Clone)]
pub struct Config {
    /// 0 prints everything, 1 drops headers and trees, 2 only prints the summary.
    pub quiet: u8,
    /// Where the text report is written.
    pub output: PathBuf,
    /// Skips reading the neighbor cache.
    pub no_arp: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quiet: 0,
            output: PathBuf::from(DEFAULT_REPORT_PATH),
            no_arp: false,
        }
    }
}
