//! In-memory stand-in for the raw socket.
//!
//! Answers echo requests sent to configured responders, lets tests inject
//! arbitrary datagrams or receive errors, and counts how often it was closed.

use std::collections::HashSet;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use aliver_protocols::icmp::{self, ECHO_HEADER_LEN};

use super::{Datagram, ProbeSocket, ReadDeadline, RecvError};

enum Inbound {
    Datagram(Vec<u8>, IpAddr),
    Error(io::ErrorKind),
}

pub struct SimulatedSocket {
    responders: HashSet<Ipv4Addr>,
    unreachable: HashSet<Ipv4Addr>,
    inbox_tx: Mutex<Sender<Inbound>>,
    inbox_rx: Mutex<Receiver<Inbound>>,
    deadline: ReadDeadline,
    sent: Mutex<Vec<Ipv4Addr>>,
    last_send: Mutex<Option<Instant>>,
    closes: AtomicUsize,
}

impl Default for SimulatedSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSocket {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            responders: HashSet::new(),
            unreachable: HashSet::new(),
            inbox_tx: Mutex::new(tx),
            inbox_rx: Mutex::new(rx),
            deadline: ReadDeadline::default(),
            sent: Mutex::new(Vec::new()),
            last_send: Mutex::new(None),
            closes: AtomicUsize::new(0),
        }
    }

    /// `addr` answers every echo request it receives.
    pub fn with_responder(mut self, addr: Ipv4Addr) -> Self {
        self.responders.insert(addr);
        self
    }

    /// Sending to `addr` fails with "network unreachable".
    pub fn with_unreachable(mut self, addr: Ipv4Addr) -> Self {
        self.unreachable.insert(addr);
        self
    }

    /// Queues a datagram as if it had arrived from `source`.
    pub fn inject(&self, bytes: Vec<u8>, source: IpAddr) {
        self.push(Inbound::Datagram(bytes, source));
    }

    /// Queues a receive error of the given kind.
    pub fn inject_error(&self, kind: io::ErrorKind) {
        self.push(Inbound::Error(kind));
    }

    /// Destinations of every successful send, in order.
    pub fn sent(&self) -> Vec<Ipv4Addr> {
        lock(&self.sent).clone()
    }

    /// When the most recent send returned, successful or not.
    pub fn last_send(&self) -> Option<Instant> {
        *lock(&self.last_send)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.close_count() > 0
    }

    fn deliver(&self, destination: Ipv4Addr, packet: &[u8]) -> io::Result<()> {
        if self.is_closed() {
            return Err(io::ErrorKind::NotConnected.into());
        }
        if self.unreachable.contains(&destination) {
            return Err(io::Error::new(io::ErrorKind::NetworkUnreachable, "network is unreachable"));
        }
        lock(&self.sent).push(destination);

        if !self.responders.contains(&destination) {
            return Ok(());
        }
        if let Some(fields) = icmp::parse_echo_request(packet) {
            let payload = packet.get(ECHO_HEADER_LEN..).unwrap_or_default();
            let reply = icmp::create_echo_reply(fields.identifier, fields.sequence, payload)
                .map_err(io::Error::other)?;
            self.push(Inbound::Datagram(reply, IpAddr::V4(destination)));
        }
        Ok(())
    }

    fn push(&self, inbound: Inbound) {
        // The receiver lives as long as `self`.
        let _ = lock(&self.inbox_tx).send(inbound);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ProbeSocket for SimulatedSocket {
    fn send(&self, destination: Ipv4Addr, packet: &[u8]) -> io::Result<()> {
        let result = self.deliver(destination, packet);
        *lock(&self.last_send) = Some(Instant::now());
        result
    }

    fn set_read_deadline(&self, deadline: Instant) {
        self.deadline.set(deadline);
    }

    fn receive(&self, buf: &mut [u8]) -> Result<Datagram, RecvError> {
        loop {
            if self.is_closed() {
                return Err(RecvError::Closed);
            }
            let wait = self.deadline.next_wait().ok_or(RecvError::Timeout)?;

            match lock(&self.inbox_rx).recv_timeout(wait) {
                Ok(Inbound::Datagram(bytes, source)) => {
                    let len = bytes.len().min(buf.len());
                    buf[..len].copy_from_slice(&bytes[..len]);
                    return Ok(Datagram { len, source });
                }
                Ok(Inbound::Error(kind)) => return Err(io::Error::from(kind).into()),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(RecvError::Closed),
            }
        }
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use aliver_protocols::icmp::{ReplyVerdict, classify_reply};

    #[test]
    fn responder_answers_with_same_identifier() {
        let addr = Ipv4Addr::new(10, 0, 0, 2);
        let socket = SimulatedSocket::new().with_responder(addr);
        let request = icmp::create_echo_request(0xBEEF, 1, b"hello").unwrap();

        socket.send(addr, &request).unwrap();
        socket.set_read_deadline(Instant::now() + Duration::from_secs(1));

        let mut buf = [0u8; 64];
        let datagram = socket.receive(&mut buf).unwrap();
        assert_eq!(datagram.source, IpAddr::V4(addr));
        assert!(matches!(classify_reply(&buf[..datagram.len], 0xBEEF), ReplyVerdict::Matched(_)));
    }

    #[test]
    fn silent_host_times_out() {
        let socket = SimulatedSocket::new();
        let request = icmp::create_echo_request(1, 1, b"").unwrap();
        socket.send(Ipv4Addr::new(10, 0, 0, 3), &request).unwrap();
        socket.set_read_deadline(Instant::now() + Duration::from_millis(50));

        let mut buf = [0u8; 64];
        assert!(matches!(socket.receive(&mut buf), Err(RecvError::Timeout)));
        assert_eq!(socket.sent(), vec![Ipv4Addr::new(10, 0, 0, 3)]);
    }

    #[test]
    fn unreachable_destination_fails_send() {
        let addr = Ipv4Addr::new(192, 0, 2, 1);
        let socket = SimulatedSocket::new().with_unreachable(addr);
        let err = socket.send(addr, &[8, 0, 0, 0, 0, 0, 0, 0]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NetworkUnreachable);
        assert!(socket.sent().is_empty());
    }

    #[test]
    fn injected_errors_surface_as_classified() {
        let socket = SimulatedSocket::new();
        socket.inject_error(io::ErrorKind::Interrupted);
        socket.inject_error(io::ErrorKind::PermissionDenied);

        let mut buf = [0u8; 16];
        assert!(matches!(socket.receive(&mut buf), Err(RecvError::Transient(_))));
        assert!(matches!(socket.receive(&mut buf), Err(RecvError::Failed(_))));
    }

    #[test]
    fn closed_socket_stops_receiving() {
        let socket = SimulatedSocket::new();
        socket.close();
        socket.close();

        let mut buf = [0u8; 16];
        assert!(matches!(socket.receive(&mut buf), Err(RecvError::Closed)));
        assert_eq!(socket.close_count(), 2);
    }
}
