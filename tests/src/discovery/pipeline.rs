use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use aliver_common::config::SweepConfig;
use aliver_common::network::target::Target;
use aliver_core::neighbor::records_for_target;
use aliver_core::report::ReportWriter;
use aliver_core::socket::SimulatedSocket;
use aliver_core::sweep::{SweepEngine, SweepJob};
use aliver_protocols::neighbor::parse_proc_net_arp;

const PROC_NET_ARP: &str = "\
IP address       HW type     Flags       HW address            Mask     Device
192.168.7.1      0x1         0x2         3c:84:6a:11:22:33     *        eth0
192.168.7.9      0x1         0x0         00:00:00:00:00:00     *        eth0
192.168.7.20     0x1         0x6         a4:5e:60:aa:bb:cc     *        eth0
10.10.0.1        0x1         0x2         02:42:ac:11:00:02     *        docker0
";

struct TempReport(PathBuf);

impl TempReport {
    fn new(name: &str) -> Self {
        Self(std::env::temp_dir().join(format!("aliver-{name}-{}.txt", std::process::id())))
    }
}

impl Drop for TempReport {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[tokio::test]
async fn sweep_and_cache_end_up_in_the_report() {
    let target: Target = "192.168.7.0/27".parse().unwrap();
    let socket = Arc::new(
        SimulatedSocket::new()
            .with_responder(Ipv4Addr::new(192, 168, 7, 20))
            .with_responder(Ipv4Addr::new(192, 168, 7, 3)),
    );
    let cfg = SweepConfig::default()
        .with_pacing(Duration::ZERO)
        .with_drain_window(Duration::from_millis(200));
    let engine = SweepEngine::new(cfg);

    let icmp = engine.run(SweepJob::new(target, engine.config()), socket).await.unwrap();
    let neighbors = records_for_target(parse_proc_net_arp(PROC_NET_ARP), &target);
    assert_eq!(icmp.len(), 2);
    assert_eq!(neighbors.len(), 2);

    let report = TempReport::new("pipeline");
    ReportWriter::new(&report.0).write(&icmp, &neighbors, &target).unwrap();
    let text = std::fs::read_to_string(&report.0).unwrap();

    assert!(text.contains("Target network: 192.168.7.0/27"));
    assert!(text.contains("Discovered 2 active hosts"));
    assert!(text.contains("Read 2 ARP cache entries"));

    let icmp_section = &text[text.find("=== ICMP Results ===").unwrap()..text.find("=== ARP Cache Results ===").unwrap()];
    let dot3 = icmp_section.find("192.168.7.3 ").unwrap();
    let dot20 = icmp_section.find("192.168.7.20 ").unwrap();
    assert!(dot3 < dot20, "ICMP rows must be sorted numerically");

    assert!(text.contains("a4:5e:60:aa:bb:cc"));
    assert!(text.contains("permanent"));
    assert!(!text.contains("10.10.0.1"));
    assert!(!text.contains("192.168.7.9 "));
}

#[tokio::test]
async fn empty_sweep_still_writes_a_report() {
    let target: Target = "10.0.0.5".parse().unwrap();
    let engine = SweepEngine::new(SweepConfig::default().with_drain_window(Duration::from_millis(100)));
    let icmp = engine
        .run(SweepJob::new(target, engine.config()), Arc::new(SimulatedSocket::new()))
        .await
        .unwrap();

    let report = TempReport::new("empty");
    ReportWriter::new(&report.0).write(&icmp, &[], &target).unwrap();
    let text = std::fs::read_to_string(&report.0).unwrap();

    assert!(text.contains("Target address: 10.0.0.5"));
    assert!(text.contains("Discovered 0 active hosts"));
    assert!(text.contains("Read 0 ARP cache entries"));
}
