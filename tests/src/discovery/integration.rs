use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use aliver_common::config::SweepConfig;
use aliver_common::record::{DiscoveryRecord, ProbeSource, STATUS_ONLINE, UNKNOWN_HARDWARE};
use aliver_core::socket::{ProbeSocket, SimulatedSocket};
use aliver_core::sweep::{SweepEngine, SweepJob};
use aliver_protocols::icmp::{self, ECHO_SEQUENCE};
use tokio_util::sync::CancellationToken;

const ID: u16 = 0x5a5a;
const WINDOW: Duration = Duration::from_millis(300);
/// Slack allowed on top of the drain window before teardown completes.
const TEARDOWN_SLACK: Duration = Duration::from_secs(1);

fn config() -> SweepConfig {
    SweepConfig::default()
        .with_pacing(Duration::from_millis(1))
        .with_drain_window(WINDOW)
        .with_identifier(ID)
}

#[tokio::test]
async fn slash_30_sweep_reports_the_responder() {
    let responder = Ipv4Addr::new(192, 168, 1, 2);
    let socket = Arc::new(SimulatedSocket::new().with_responder(responder));
    let engine = SweepEngine::new(config());
    let job = SweepJob::parse("192.168.1.0/30", engine.config()).unwrap();

    let records = engine.run(job, socket.clone()).await.unwrap();

    assert_eq!(records, vec![DiscoveryRecord::echo_reply(responder)]);
    assert_eq!(records[0].status, STATUS_ONLINE);
    assert_eq!(records[0].hardware_address, UNKNOWN_HARDWARE);
    assert_eq!(records[0].source, ProbeSource::Icmp);

    let mut sent = socket.sent();
    sent.sort();
    assert_eq!(sent, vec![Ipv4Addr::new(192, 168, 1, 1), Ipv4Addr::new(192, 168, 1, 2)]);
}

#[tokio::test]
async fn silent_single_host_completes_empty() {
    let socket = Arc::new(SimulatedSocket::new());
    let engine = SweepEngine::new(config());
    let job = SweepJob::parse("10.0.0.5", engine.config()).unwrap();

    let records = engine.run(job, socket.clone()).await.unwrap();

    assert!(records.is_empty());
    assert_eq!(socket.sent(), vec![Ipv4Addr::new(10, 0, 0, 5)]);
}

#[tokio::test]
async fn foreign_identifier_never_produces_a_record() {
    let socket = Arc::new(SimulatedSocket::new());
    let stranger = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));
    socket.inject(icmp::create_echo_reply(ID ^ 0xffff, ECHO_SEQUENCE, b"hello").unwrap(), stranger);
    socket.inject(icmp::create_echo_reply(ID.wrapping_add(1), ECHO_SEQUENCE, b"").unwrap(), stranger);

    let engine = SweepEngine::new(config());
    let job = SweepJob::parse("10.0.0.5", engine.config()).unwrap();

    assert!(engine.run(job, socket).await.unwrap().is_empty());
}

#[tokio::test]
async fn matching_reply_records_its_source() {
    let socket = Arc::new(SimulatedSocket::new());
    // Correlation is by identifier and source, not by the probed address.
    let source = Ipv4Addr::new(172, 20, 3, 4);
    socket.inject(icmp::create_echo_reply(ID, ECHO_SEQUENCE, b"hello").unwrap(), IpAddr::V4(source));

    let engine = SweepEngine::new(config());
    let job = SweepJob::parse("10.0.0.5", engine.config()).unwrap();

    assert_eq!(engine.run(job, socket).await.unwrap(), vec![DiscoveryRecord::echo_reply(source)]);
}

#[tokio::test]
async fn drain_window_is_honoured_after_the_last_send() {
    let socket = Arc::new(SimulatedSocket::new());
    let engine = SweepEngine::new(config().with_concurrency(8));
    let job = SweepJob::parse("10.1.0.0/28", engine.config()).unwrap();

    engine.run(job, socket.clone()).await.unwrap();
    let finished = Instant::now();

    let last_send = socket.last_send().unwrap();
    let drained = finished.duration_since(last_send);
    assert!(drained >= WINDOW, "returned {drained:?} after the last send");
    assert!(drained < WINDOW + TEARDOWN_SLACK, "teardown took {drained:?}");
    assert_eq!(socket.sent().len(), 14);
}

#[tokio::test]
async fn socket_is_closed_and_closing_again_is_harmless() {
    let socket = Arc::new(SimulatedSocket::new().with_responder(Ipv4Addr::new(10, 0, 0, 1)));
    let engine = SweepEngine::new(config());
    let job = SweepJob::parse("10.0.0.0/30", engine.config()).unwrap();

    engine.run(job, socket.clone()).await.unwrap();
    assert!(socket.is_closed());

    socket.close();
    let mut buf = [0u8; 64];
    assert!(socket.receive(&mut buf).is_err());
}

#[tokio::test]
async fn failed_sends_do_not_abort_the_sweep() {
    let socket = Arc::new(
        SimulatedSocket::new()
            .with_unreachable(Ipv4Addr::new(10, 2, 0, 1))
            .with_unreachable(Ipv4Addr::new(10, 2, 0, 3))
            .with_responder(Ipv4Addr::new(10, 2, 0, 6)),
    );
    let engine = SweepEngine::new(config());
    let job = SweepJob::parse("10.2.0.0/29", engine.config()).unwrap();

    let records = engine.run(job, socket.clone()).await.unwrap();

    assert_eq!(records, vec![DiscoveryRecord::echo_reply(Ipv4Addr::new(10, 2, 0, 6))]);
    assert_eq!(socket.sent().len(), 4);
}

#[tokio::test]
async fn cancellation_stops_dispatch_and_drain() {
    let socket = Arc::new(SimulatedSocket::new().with_responder(Ipv4Addr::new(10, 3, 0, 1)));
    let token = CancellationToken::new();
    let engine = SweepEngine::new(
        config()
            .with_concurrency(2)
            .with_pacing(Duration::from_millis(20))
            .with_drain_window(Duration::from_secs(30)),
    )
    .with_cancellation(token.clone());
    let job = SweepJob::parse("10.3.0.0/24", engine.config()).unwrap();

    let started = Instant::now();
    let cancel_soon = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
    };
    let (records, ()) = tokio::join!(engine.run(job, socket.clone()), cancel_soon);
    let records = records.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(socket.sent().len() < 254);
    assert_eq!(records, vec![DiscoveryRecord::echo_reply(Ipv4Addr::new(10, 3, 0, 1))]);
    assert!(socket.is_closed());
}

#[tokio::test]
async fn concurrent_sweeps_keep_their_own_replies() {
    let socket = Arc::new(
        SimulatedSocket::new()
            .with_responder(Ipv4Addr::new(10, 4, 0, 1))
            .with_responder(Ipv4Addr::new(10, 5, 0, 1)),
    );
    let first = SweepEngine::new(config().with_identifier(1));
    let second = SweepEngine::new(config().with_identifier(2));
    let first_job = SweepJob::parse("10.4.0.1", first.config()).unwrap();
    let second_job = SweepJob::parse("10.5.0.1", second.config()).unwrap();

    // Both listeners read from one inbox, so a reply may be consumed by the
    // sweep it does not belong to; neither sweep may ever record a foreign one.
    let (a, b) = tokio::join!(first.run(first_job, socket.clone()), second.run(second_job, socket.clone()));
    for record in a.unwrap() {
        assert_eq!(record.address, Ipv4Addr::new(10, 4, 0, 1));
    }
    for record in b.unwrap() {
        assert_eq!(record.address, Ipv4Addr::new(10, 5, 0, 1));
    }
}

#[tokio::test]
#[ignore = "needs root or CAP_NET_RAW"]
async fn raw_socket_sweep_of_loopback() {
    let engine = SweepEngine::new(SweepConfig::default().with_drain_window(Duration::from_millis(500)));
    let records = engine.sweep_spec("127.0.0.1").await.unwrap();
    assert!(records.iter().any(|r| r.address == Ipv4Addr::LOCALHOST));
}
