//! ICMPv4 echo request/reply encoding and reply classification.
//!
//! Buffers handled here start at the ICMP header: the IPv4 header has already
//! been stripped by the transport layer.

use anyhow::Context;
use pnet::packet::Packet;
use pnet::packet::icmp::echo_reply::{self, EchoReplyPacket, MutableEchoReplyPacket};
use pnet::packet::icmp::echo_request::{self, EchoRequestPacket, MutableEchoRequestPacket};
use pnet::packet::icmp::{IcmpPacket, IcmpTypes, checksum};

/// Type, code, checksum, identifier and sequence number.
pub const ECHO_HEADER_LEN: usize = 8;
/// Every request of a sweep carries the same sequence number; replies are
/// correlated by identifier and source address.
pub const ECHO_SEQUENCE: u16 = 1;

/// Identifier and sequence number of an echo message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoFields {
    pub identifier: u16,
    pub sequence: u16,
}

/// Outcome of matching an inbound datagram against a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyVerdict {
    /// Echo reply carrying the sweep's identifier.
    Matched(EchoFields),
    /// Too short to be an ICMP message.
    Malformed,
    /// Some other ICMP type (our own requests on loopback, unreachables, ...).
    NotEchoReply(u8),
    /// Echo reply that belongs to somebody else.
    ForeignIdentifier(u16),
}

pub fn create_echo_request(identifier: u16, sequence: u16, payload: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut pkt = vec![0u8; ECHO_HEADER_LEN + payload.len()];
    let mut echo = MutableEchoRequestPacket::new(&mut pkt).context("failed to create echo request packet")?;

    echo.set_icmp_type(IcmpTypes::EchoRequest);
    echo.set_icmp_code(echo_request::IcmpCodes::NoCode);
    echo.set_identifier(identifier);
    echo.set_sequence_number(sequence);
    echo.set_payload(payload);

    echo.set_checksum(0);
    let echo_imm = echo.to_immutable();
    let icmp_pkt = IcmpPacket::new(echo_imm.packet()).context("failed to create ICMP packet")?;
    let csm = checksum(&icmp_pkt);
    echo.set_checksum(csm);
    Ok(pkt)
}

pub fn create_echo_reply(identifier: u16, sequence: u16, payload: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut pkt = vec![0u8; ECHO_HEADER_LEN + payload.len()];
    let mut echo = MutableEchoReplyPacket::new(&mut pkt).context("failed to create echo reply packet")?;

    echo.set_icmp_type(IcmpTypes::EchoReply);
    echo.set_icmp_code(echo_reply::IcmpCodes::NoCode);
    echo.set_identifier(identifier);
    echo.set_sequence_number(sequence);
    echo.set_payload(payload);

    echo.set_checksum(0);
    let echo_imm = echo.to_immutable();
    let icmp_pkt = IcmpPacket::new(echo_imm.packet()).context("failed to create ICMP packet")?;
    let csm = checksum(&icmp_pkt);
    echo.set_checksum(csm);
    Ok(pkt)
}

/// Reads the fields of an echo request, `None` for anything else.
pub fn parse_echo_request(bytes: &[u8]) -> Option<EchoFields> {
    let icmp = IcmpPacket::new(bytes)?;
    if icmp.get_icmp_type() != IcmpTypes::EchoRequest {
        return None;
    }
    let echo = EchoRequestPacket::new(bytes)?;
    Some(EchoFields {
        identifier: echo.get_identifier(),
        sequence: echo.get_sequence_number(),
    })
}

/// Decides whether `bytes` is an echo reply addressed to the sweep tagged
/// with `identifier`.
pub fn classify_reply(bytes: &[u8], identifier: u16) -> ReplyVerdict {
    let Some(icmp) = IcmpPacket::new(bytes) else {
        return ReplyVerdict::Malformed;
    };
    let icmp_type = icmp.get_icmp_type();
    if icmp_type != IcmpTypes::EchoReply {
        return ReplyVerdict::NotEchoReply(icmp_type.0);
    }
    let Some(echo) = EchoReplyPacket::new(bytes) else {
        return ReplyVerdict::Malformed;
    };
    if echo.get_identifier() != identifier {
        return ReplyVerdict::ForeignIdentifier(echo.get_identifier());
    }
    ReplyVerdict::Matched(EchoFields {
        identifier,
        sequence: echo.get_sequence_number(),
    })
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
