use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use is_root::is_root;
use pnet::packet::Packet;
use pnet::packet::icmp::IcmpPacket;
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::transport::{
    self,
    TransportChannelType,
    TransportProtocol,
    TransportReceiver,
    TransportSender,
};
use tracing::debug;

use super::{Datagram, ProbeSocket, ReadDeadline, RecvError};
use crate::error::SweepError;

const TRANSPORT_BUFFER_SIZE: usize = 4096;
const CHANNEL_TYPE_ICMP: TransportChannelType =
    TransportChannelType::Layer4(TransportProtocol::Ipv4(IpNextHeaderProtocols::Icmp));

/// Raw IPv4 ICMP socket. Inbound datagrams arrive with the IP header
/// already stripped.
pub struct RawIcmpSocket {
    tx: Mutex<Option<TransportSender>>,
    rx: Mutex<Option<TransportReceiver>>,
    deadline: ReadDeadline,
    closed: AtomicBool,
}

impl RawIcmpSocket {
    pub fn open() -> Result<Self, SweepError> {
        let (tx, rx) = transport::transport_channel(TRANSPORT_BUFFER_SIZE, CHANNEL_TYPE_ICMP)
            .map_err(|reason| SweepError::SocketUnavailable {
                reason,
                hint: privilege_hint(),
            })?;
        debug!("opened raw ICMP socket");

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
            deadline: ReadDeadline::default(),
            closed: AtomicBool::new(false),
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn privilege_hint() -> Option<String> {
    (!is_root()).then(|| "raw sockets require root or CAP_NET_RAW".to_string())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ProbeSocket for RawIcmpSocket {
    fn send(&self, destination: Ipv4Addr, packet: &[u8]) -> io::Result<()> {
        let icmp = IcmpPacket::new(packet).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "ICMP message shorter than its header")
        })?;

        let mut guard = lock(&self.tx);
        let tx = guard.as_mut().ok_or(io::ErrorKind::NotConnected)?;
        tx.send_to(icmp, IpAddr::V4(destination))?;
        Ok(())
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

            let mut guard = lock(&self.rx);
            let rx = guard.as_mut().ok_or(RecvError::Closed)?;
            let mut iter = transport::icmp_packet_iter(rx);

            if let Some((packet, source)) = iter.next_with_timeout(wait)? {
                let bytes = packet.packet();
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                return Ok(Datagram { len, source });
            }
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        lock(&self.tx).take();
        lock(&self.rx).take();
        debug!("closed raw ICMP socket");
    }
}

impl Drop for RawIcmpSocket {
    fn drop(&mut self) {
        self.close();
    }
}
