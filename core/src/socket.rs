//! The transport every sweep runs over.
//!
//! A [`ProbeSocket`] is shared by all dispatch workers (concurrent senders)
//! and a single listener (sole reader). Receiving honours a deadline set with
//! [`ProbeSocket::set_read_deadline`]; hitting it is reported as
//! [`RecvError::Timeout`], which callers treat as normal completion.

use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

pub mod raw;
pub mod simulated;

pub use raw::RawIcmpSocket;
pub use simulated::SimulatedSocket;

/// Longest a single blocking read may last before the closed flag and the
/// deadline are looked at again.
pub(crate) const POLL_SLICE: Duration = Duration::from_millis(100);

/// One inbound datagram, copied into the caller's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Datagram {
    pub len: usize,
    pub source: IpAddr,
}

#[derive(Debug, Error)]
pub enum RecvError {
    #[error("read deadline reached")]
    Timeout,
    #[error("transient receive error: {0}")]
    Transient(#[source] io::Error),
    #[error("socket closed")]
    Closed,
    #[error("receive failed: {0}")]
    Failed(#[source] io::Error),
}

impl From<io::Error> for RecvError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut => RecvError::Timeout,
            io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => RecvError::Transient(err),
            io::ErrorKind::NotConnected | io::ErrorKind::BrokenPipe => RecvError::Closed,
            _ => RecvError::Failed(err),
        }
    }
}

pub trait ProbeSocket: Send + Sync {
    /// Sends one ICMP message to `destination`.
    fn send(&self, destination: Ipv4Addr, packet: &[u8]) -> io::Result<()>;

    /// Makes `receive` give up with [`RecvError::Timeout`] once `deadline` passes.
    fn set_read_deadline(&self, deadline: Instant);

    /// Blocks until a datagram arrives, the read deadline passes or the
    /// socket is closed.
    fn receive(&self, buf: &mut [u8]) -> Result<Datagram, RecvError>;

    /// Releases the socket. Calling it again is a no-op.
    fn close(&self);
}

/// Read deadline shared between the driver and the listener.
#[derive(Debug, Default)]
pub(crate) struct ReadDeadline(Mutex<Option<Instant>>);

impl ReadDeadline {
    pub(crate) fn set(&self, deadline: Instant) {
        *self.lock() = Some(deadline);
    }

    /// How long the next blocking read may wait, or `None` once the deadline
    /// has passed.
    pub(crate) fn next_wait(&self) -> Option<Duration> {
        match *self.lock() {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                (!remaining.is_zero()).then(|| remaining.min(POLL_SLICE))
            }
            None => Some(POLL_SLICE),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Instant>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Closes the wrapped socket when dropped, on every exit path.
pub(crate) struct CloseOnDrop<'a, S: ProbeSocket + ?Sized>(pub(crate) &'a S);

impl<S: ProbeSocket + ?Sized> Drop for CloseOnDrop<'_, S> {
    fn drop(&mut self) {
        self.0.close();
    }
}
