//! Parsers for the operating system's neighbor (ARP) cache.
//!
//! Three layouts are understood:
//! * `/proc/net/arp` on Linux.
//! * `arp -a` on Windows: `192.168.1.1    00-11-22-33-44-55    dynamic`.
//! * `arp -a` on BSD, macOS and net-tools:
//!   `router (192.168.1.1) at 0:11:22:33:44:55 on en0 ifscope [ethernet]`.

use std::net::Ipv4Addr;

use tracing::trace;

/// Linux `ATF_COM`: the entry is resolved.
const ATF_COM: u32 = 0x02;
/// Linux `ATF_PERM`: the entry never expires.
const ATF_PERM: u32 = 0x04;

pub const STATE_DYNAMIC: &str = "dynamic";
pub const STATE_PERMANENT: &str = "permanent";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborEntry {
    pub address: Ipv4Addr,
    pub hardware_address: String,
    pub state: String,
}

/// Parses the contents of `/proc/net/arp`, skipping incomplete entries.
pub fn parse_proc_net_arp(contents: &str) -> Vec<NeighborEntry> {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [ip, _hw_type, flags, mac, ..] = fields.as_slice() else {
                return None;
            };
            let address = ip.parse::<Ipv4Addr>().ok()?;
            let flags = u32::from_str_radix(flags.trim_start_matches("0x"), 16).ok()?;
            if flags & ATF_COM == 0 || is_zero_mac(mac) {
                trace!("skipping incomplete neighbor entry {address}");
                return None;
            }
            let state = if flags & ATF_PERM != 0 { STATE_PERMANENT } else { STATE_DYNAMIC };
            Some(NeighborEntry {
                address,
                hardware_address: mac.to_string(),
                state: state.to_string(),
            })
        })
        .collect()
}

/// Parses the output of `arp -a` in either the Windows or the BSD layout.
pub fn parse_arp_output(output: &str) -> Vec<NeighborEntry> {
    output
        .lines()
        .map(str::trim)
        .filter_map(|line| parse_windows_line(line).or_else(|| parse_bsd_line(line)))
        .collect()
}

fn parse_windows_line(line: &str) -> Option<NeighborEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [ip, mac, state] = fields.as_slice() else {
        return None;
    };
    let address = ip.parse::<Ipv4Addr>().ok()?;
    if !is_dashed_mac(mac) {
        return None;
    }
    Some(NeighborEntry {
        address,
        hardware_address: mac.to_string(),
        state: state.to_string(),
    })
}

fn parse_bsd_line(line: &str) -> Option<NeighborEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let at = fields.iter().position(|field| *field == "at")?;
    let address = fields
        .get(..at)?
        .iter()
        .find_map(|field| field.strip_prefix('(')?.strip_suffix(')')?.parse::<Ipv4Addr>().ok())?;
    let mac = fields.get(at + 1)?;
    if mac.starts_with('(') || is_zero_mac(mac) {
        trace!("skipping incomplete neighbor entry {address}");
        return None;
    }
    let state = if fields.contains(&"permanent") { STATE_PERMANENT } else { STATE_DYNAMIC };
    Some(NeighborEntry {
        address,
        hardware_address: mac.to_string(),
        state: state.to_string(),
    })
}

fn is_dashed_mac(s: &str) -> bool {
    s.contains('-') && s.chars().all(|c| c == '-' || c.is_ascii_hexdigit())
}

fn is_zero_mac(s: &str) -> bool {
    s.chars().all(|c| c == '0' || c == ':' || c == '-')
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    const PROC_NET_ARP: &str = "\
IP address       HW type     Flags       HW address            Mask     Device
192.168.1.1      0x1         0x2         a4:2b:b0:11:22:33     *        eth0
192.168.1.77     0x1         0x0         00:00:00:00:00:00     *        eth0
192.168.1.20     0x1         0x6         de:ad:be:ef:00:01     *        eth0
";

    const WINDOWS_ARP: &str = "
Interface: 192.168.1.10 --- 0xb
  Internet Address      Physical Address      Type
  192.168.1.1           00-11-22-33-44-55     dynamic
  192.168.1.255         ff-ff-ff-ff-ff-ff     static
  224.0.0.22            01-00-5e-00-00-16     static
";

    const BSD_ARP: &str = "\
router.lan (192.168.1.1) at a4:2b:b0:11:22:33 on en0 ifscope [ethernet]
? (192.168.1.5) at (incomplete) on en0 ifscope [ethernet]
? (192.168.1.9) at 0:c:29:aa:bb:cc on en0 ifscope permanent [ethernet]
? (10.0.0.7) at 52:54:00:12:34:56 [ether] on eth0
";

    #[test]
    fn proc_net_arp_skips_header_and_incomplete() {
        let entries = parse_proc_net_arp(PROC_NET_ARP);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].address, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(entries[0].hardware_address, "a4:2b:b0:11:22:33");
        assert_eq!(entries[0].state, "dynamic");
        assert_eq!(entries[1].state, "permanent");
    }

    #[test]
    fn windows_layout() {
        let entries = parse_arp_output(WINDOWS_ARP);
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[0],
            NeighborEntry {
                address: Ipv4Addr::new(192, 168, 1, 1),
                hardware_address: "00-11-22-33-44-55".into(),
                state: "dynamic".into(),
            }
        );
        assert_eq!(entries[1].state, "static");
    }

    #[test]
    fn bsd_layout() {
        let entries = parse_arp_output(BSD_ARP);
        let addresses: Vec<Ipv4Addr> = entries.iter().map(|e| e.address).collect();
        assert_eq!(
            addresses,
            vec![
                Ipv4Addr::new(192, 168, 1, 1),
                Ipv4Addr::new(192, 168, 1, 9),
                Ipv4Addr::new(10, 0, 0, 7),
            ]
        );
        assert_eq!(entries[1].state, "permanent");
        assert_eq!(entries[2].hardware_address, "52:54:00:12:34:56");
    }

    #[test]
    fn garbage_yields_nothing() {
        assert!(parse_arp_output("no entries\n\n   \nfoo bar baz").is_empty());
        assert!(parse_proc_net_arp("").is_empty());
    }
}
