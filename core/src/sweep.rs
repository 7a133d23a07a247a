//! ICMP echo sweep over a single address or a CIDR block.
//!
//! A sweep fans echo requests out through a bounded worker pool while one
//! blocking listener collects the replies tagged with the sweep's identifier.
//! Once every worker has returned, the listener gets a full drain window
//! before the socket is torn down.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use aliver_common::config::SweepConfig;
use aliver_common::network::range::Ipv4Range;
use aliver_common::network::target::Target;
use aliver_common::record::DiscoveryRecord;
use aliver_protocols::icmp::{self, ECHO_SEQUENCE, ReplyVerdict};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, trace, warn};

use crate::collector::ResultCollector;
use crate::error::{Result, SweepError};
use crate::socket::{CloseOnDrop, ProbeSocket, RawIcmpSocket, RecvError};

/// Large enough for any ICMP message carried in an Ethernet frame.
const RECV_BUFFER_SIZE: usize = 1500;
/// Consecutive transient receive errors tolerated before the listener gives up.
pub const MAX_TRANSIENT_RETRIES: u32 = 16;
const RETRY_BACKOFF_STEP: Duration = Duration::from_millis(5);
const RETRY_BACKOFF_CAP: Duration = Duration::from_millis(50);

pub type ProgressCallback = Arc<dyn Fn(usize) + Send + Sync>;

/// Everything one sweep needs to know about what it probes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepJob {
    pub target: Target,
    pub addresses: Ipv4Range,
    /// Tags every request of this sweep; replies carrying anything else are dropped.
    pub identifier: u16,
    pub sequence: u16,
}

impl SweepJob {
    pub fn new(target: Target, cfg: &SweepConfig) -> Self {
        Self {
            addresses: target.host_range(),
            identifier: cfg.identifier.unwrap_or_else(rand::random),
            sequence: ECHO_SEQUENCE,
            target,
        }
    }

    /// Parses `spec` as a bare address or a CIDR block.
    pub fn parse(spec: &str, cfg: &SweepConfig) -> Result<Self> {
        let target: Target = spec.parse()?;
        Ok(Self::new(target, cfg))
    }
}

/// Why the listener stopped reading.
#[derive(Debug)]
enum ListenerExit {
    Deadline,
    Stopped,
    Closed,
    RetriesExhausted,
    Failed(RecvError),
}

pub struct SweepEngine {
    cfg: SweepConfig,
    cancel: CancellationToken,
    on_host_found: Option<ProgressCallback>,
}

impl SweepEngine {
    pub fn new(cfg: SweepConfig) -> Self {
        Self {
            cfg,
            cancel: CancellationToken::new(),
            on_host_found: None,
        }
    }

    /// Cancelling `token` stops submitting addresses and cuts the drain
    /// window short. Whatever was collected so far is still returned.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// `callback` receives the running host count after every new reply.
    pub fn with_progress(mut self, callback: Box<dyn Fn(usize) + Send + Sync>) -> Self {
        self.on_host_found = Some(Arc::from(callback));
        self
    }

    pub fn config(&self) -> &SweepConfig {
        &self.cfg
    }

    /// Sweeps `target` over a freshly opened raw ICMP socket.
    pub async fn sweep(&self, target: &Target) -> Result<Vec<DiscoveryRecord>> {
        let job = SweepJob::new(*target, &self.cfg);
        let socket = Arc::new(RawIcmpSocket::open()?);
        self.run(job, socket)
            .instrument(info_span!("sweep", target = %target))
            .await
    }

    /// Same as [`SweepEngine::sweep`], starting from the textual target.
    pub async fn sweep_spec(&self, spec: &str) -> Result<Vec<DiscoveryRecord>> {
        let target: Target = spec.parse()?;
        self.sweep(&target).await
    }

    /// Runs `job` over an already opened socket and closes it before returning.
    pub async fn run<S>(&self, job: SweepJob, socket: Arc<S>) -> Result<Vec<DiscoveryRecord>>
    where
        S: ProbeSocket + 'static,
    {
        let close_guard = CloseOnDrop(socket.as_ref());

        let packet = icmp::create_echo_request(job.identifier, job.sequence, &self.cfg.payload)
            .map_err(|e| SweepError::Packet(e.to_string()))?;
        let packet = Arc::new(packet);

        info!(
            "Sweeping {} ({} addresses, identifier {:#06x})",
            job.target,
            job.addresses.len(),
            job.identifier
        );

        let collector = ResultCollector::new();
        let stop = CancellationToken::new();
        let listener = {
            let socket = socket.clone();
            let collector = collector.clone();
            let stop = stop.clone();
            let progress = self.on_host_found.clone();
            let identifier = job.identifier;
            let span = info_span!("listener", identifier);
            tokio::task::spawn_blocking(move || {
                let _enter = span.enter();
                listen(socket.as_ref(), identifier, &collector, &stop, progress.as_ref())
            })
        };

        self.dispatch(&job, socket.clone(), packet)
            .instrument(info_span!("dispatch"))
            .await;

        let window = if self.cancel.is_cancelled() {
            Duration::ZERO
        } else {
            self.cfg.drain_window
        };
        socket.set_read_deadline(Instant::now() + window);
        debug!("dispatch finished, draining replies for {:?}", window);

        tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!("sweep cancelled during drain");
                socket.set_read_deadline(Instant::now());
            }
            _ = time::sleep(window) => {}
        }

        stop.cancel();
        match listener.await {
            Ok(ListenerExit::Failed(e)) => warn!("listener stopped early: {e}"),
            Ok(exit) => debug!("listener exited: {:?}", exit),
            Err(e) => warn!("listener task failed: {e}"),
        }
        drop(close_guard);

        let records = collector.snapshot();
        debug!("sweep of {} collected {} replies", job.target, records.len());
        Ok(records)
    }

    /// Submits every address of `job` to a pool of at most `concurrency`
    /// senders and waits until all of them have returned.
    async fn dispatch<S>(&self, job: &SweepJob, socket: Arc<S>, packet: Arc<Vec<u8>>)
    where
        S: ProbeSocket + 'static,
    {
        let worker_count = usize::try_from(job.addresses.len())
            .unwrap_or(usize::MAX)
            .clamp(1, self.cfg.concurrency.max(1));

        let (queue_tx, queue_rx) = mpsc::channel::<Ipv4Addr>(worker_count);
        let queue_rx = Arc::new(Mutex::new(queue_rx));

        let mut workers = JoinSet::new();
        for _ in 0..worker_count {
            let queue_rx = queue_rx.clone();
            let socket = socket.clone();
            let packet = packet.clone();
            workers.spawn(async move {
                loop {
                    let next = queue_rx.lock().await.recv().await;
                    let Some(addr) = next else { break };
                    if let Err(e) = socket.send(addr, &packet) {
                        trace!("send to {addr} failed: {e}");
                    }
                }
            });
        }

        for (i, addr) in job.addresses.to_iter().enumerate() {
            if i > 0 && !self.cfg.pacing.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = time::sleep(self.cfg.pacing) => {}
                }
            }
            if self.cancel.is_cancelled() || queue_tx.send(addr).await.is_err() {
                break;
            }
        }
        drop(queue_tx);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!("dispatch worker failed: {e}");
            }
        }
    }
}

/// Reads datagrams until the deadline, the stop signal or a terminal error.
fn listen<S>(
    socket: &S,
    identifier: u16,
    collector: &ResultCollector,
    stop: &CancellationToken,
    progress: Option<&ProgressCallback>,
) -> ListenerExit
where
    S: ProbeSocket + ?Sized,
{
    let mut buf = [0u8; RECV_BUFFER_SIZE];
    let mut transient_errors: u32 = 0;

    loop {
        if stop.is_cancelled() {
            return ListenerExit::Stopped;
        }

        match socket.receive(&mut buf) {
            Ok(datagram) => {
                transient_errors = 0;
                handle_datagram(&buf[..datagram.len], datagram.source, identifier, collector, progress);
            }
            Err(RecvError::Timeout) => return ListenerExit::Deadline,
            Err(RecvError::Closed) => return ListenerExit::Closed,
            Err(RecvError::Transient(e)) => {
                transient_errors += 1;
                if transient_errors > MAX_TRANSIENT_RETRIES {
                    warn!("giving up after {MAX_TRANSIENT_RETRIES} consecutive receive errors: {e}");
                    return ListenerExit::RetriesExhausted;
                }
                trace!("transient receive error ({transient_errors}): {e}");
                std::thread::sleep(retry_backoff(transient_errors));
            }
            Err(e @ RecvError::Failed(_)) => return ListenerExit::Failed(e),
        }
    }
}

fn handle_datagram(
    bytes: &[u8],
    source: IpAddr,
    identifier: u16,
    collector: &ResultCollector,
    progress: Option<&ProgressCallback>,
) {
    match icmp::classify_reply(bytes, identifier) {
        ReplyVerdict::Matched(_) => {
            let IpAddr::V4(addr) = source else {
                return;
            };
            let count = collector.append(DiscoveryRecord::echo_reply(addr));
            info!("Host online: {addr}");
            if let Some(callback) = progress {
                callback(count);
            }
        }
        verdict => trace!("dropped datagram from {source}: {:?}", verdict),
    }
}

fn retry_backoff(attempt: u32) -> Duration {
    RETRY_BACKOFF_STEP.saturating_mul(attempt).min(RETRY_BACKOFF_CAP)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
