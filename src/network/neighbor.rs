//! Link-layer address lookup from the kernel neighbour cache
//!
//! A successful ping or TCP connect to an on-link host leaves an ARP entry behind, so the MAC
//! is read back after liveness instead of crafting raw ARP frames. Off-link hosts never appear.

use std::net::Ipv4Addr;
use tokio::process::Command;

const PROC_NET_ARP: &str = "/proc/net/arp";

/// One neighbour cache row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborEntry {
    pub ip: Ipv4Addr,
    pub mac: String,
    /// Interface the entry was learned on, when the source reports it
    pub device: Option<String>,
}

/// Look up the MAC of `ip` in the neighbour cache, preferring entries learned on `interface`.
/// Best effort: any failure is `None`.
pub async fn lookup_mac(ip: Ipv4Addr, interface: &str) -> Option<String> {
    let entries = if cfg!(target_os = "linux") {
        match tokio::fs::read_to_string(PROC_NET_ARP).await {
            Ok(contents) => parse_proc_net_arp(&contents),
            Err(_) => arp_command_table().await,
        }
    } else {
        arp_command_table().await
    };

    pick_mac(&entries, ip, interface)
}

/// MAC for `ip`: the entry on `interface` if there is one, else the first entry for `ip`.
pub fn pick_mac(entries: &[NeighborEntry], ip: Ipv4Addr, interface: &str) -> Option<String> {
    entries
        .iter()
        .find(|e| e.ip == ip && e.device.as_deref() == Some(interface))
        .or_else(|| entries.iter().find(|e| e.ip == ip))
        .map(|e| e.mac.clone())
}

async fn arp_command_table() -> Vec<NeighborEntry> {
    match Command::new("arp").arg("-a").output().await {
        Ok(output) => parse_arp_output(&String::from_utf8_lossy(&output.stdout)),
        Err(e) => {
            crate::log_debug!("arp command unavailable: {}", e);
            Vec::new()
        }
    }
}

/// Parse `/proc/net/arp`:
/// `IP address  HW type  Flags  HW address  Mask  Device`
pub fn parse_proc_net_arp(contents: &str) -> Vec<NeighborEntry> {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 {
                return None;
            }
            // Flags 0x0 marks an incomplete entry
            if cols[2] == "0x0" {
                return None;
            }
            Some(NeighborEntry {
                ip: cols[0].parse::<Ipv4Addr>().ok()?,
                mac: normalize_mac(cols[3])?,
                device: cols.get(5).map(|d| d.to_string()),
            })
        })
        .collect()
}

/// Parse `arp -a` output from Linux, macOS or Windows.
pub fn parse_arp_output(stdout: &str) -> Vec<NeighborEntry> {
    let mut entries = Vec::new();

    for line in stdout.lines() {
        let mut ip = None;
        let mut mac = None;
        let mut device = None;
        let mut parts = line.split_whitespace();
        while let Some(part) = parts.next() {
            let clean = part.trim_matches(|c| c == '(' || c == ')');
            if clean == "on" {
                device = parts.next().map(str::to_string);
            } else if let Ok(parsed) = clean.parse::<Ipv4Addr>() {
                ip = Some(parsed);
            } else if let Some(normalized) = normalize_mac(clean) {
                mac = Some(normalized);
            }
        }

        if let (Some(ip), Some(mac)) = (ip, mac) {
            if !ip.is_multicast() && !ip.is_broadcast() {
                entries.push(NeighborEntry { ip, mac, device });
            }
        }
    }

    entries
}

fn normalize_mac(raw: &str) -> Option<String> {
    let unified = raw.replace('-', ":");
    let octets: Vec<&str> = unified.split(':').collect();
    if octets.len() != 6 || octets.iter().any(|o| o.is_empty() || o.len() > 2) {
        return None;
    }
    if !octets.iter().all(|o| o.chars().all(|c| c.is_ascii_hexdigit())) {
        return None;
    }

    let mac = octets
        .iter()
        .map(|o| format!("{:0>2}", o.to_ascii_uppercase()))
        .collect::<Vec<_>>()
        .join(":");

    if mac == "00:00:00:00:00:00" {
        None
    } else {
        Some(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac_of<'a>(entries: &'a [NeighborEntry], ip: Ipv4Addr) -> Option<&'a str> {
        entries.iter().find(|e| e.ip == ip).map(|e| e.mac.as_str())
    }

    #[test]
    fn parses_proc_net_arp_and_skips_incomplete() {
        let contents = "IP address       HW type     Flags       HW address            Mask     Device\n\
                        192.168.1.1      0x1         0x2         a4:2b:b0:11:22:33     *        eth0\n\
                        192.168.1.50     0x1         0x0         00:00:00:00:00:00     *        eth0\n";
        let entries = parse_proc_net_arp(contents);
        assert_eq!(entries.len(), 1);
        assert_eq!(
            mac_of(&entries, Ipv4Addr::new(192, 168, 1, 1)),
            Some("A4:2B:B0:11:22:33")
        );
        assert_eq!(entries[0].device.as_deref(), Some("eth0"));
    }

    #[test]
    fn parses_unix_and_windows_arp_output() {
        let stdout = "? (10.0.0.1) at 0:11:22:aa:bb:cc on en0 ifscope [ethernet]\n\
                      Interface: 10.0.0.20 --- 0x4\n\
                        10.0.0.30           00-1b-63-84-45-e6     dynamic\n\
                        224.0.0.22          01-00-5e-00-00-16     static\n";
        let entries = parse_arp_output(stdout);
        assert_eq!(
            mac_of(&entries, Ipv4Addr::new(10, 0, 0, 1)),
            Some("00:11:22:AA:BB:CC")
        );
        assert_eq!(entries[0].device.as_deref(), Some("en0"));
        assert_eq!(
            mac_of(&entries, Ipv4Addr::new(10, 0, 0, 30)),
            Some("00:1B:63:84:45:E6")
        );
        assert!(mac_of(&entries, Ipv4Addr::new(224, 0, 0, 22)).is_none());
        assert!(mac_of(&entries, Ipv4Addr::new(10, 0, 0, 20)).is_none());
    }

    #[test]
    fn configured_interface_wins_over_other_links() {
        let contents = "IP address       HW type     Flags       HW address            Mask     Device\n\
                        192.168.1.1      0x1         0x2         02:00:00:00:00:01     *        docker0\n\
                        192.168.1.1      0x1         0x2         a4:2b:b0:11:22:33     *        wlan0\n";
        let entries = parse_proc_net_arp(contents);
        let ip = Ipv4Addr::new(192, 168, 1, 1);

        assert_eq!(
            pick_mac(&entries, ip, "wlan0").as_deref(),
            Some("A4:2B:B0:11:22:33")
        );
        // unknown interface falls back to the first entry
        assert_eq!(
            pick_mac(&entries, ip, "eth0").as_deref(),
            Some("02:00:00:00:00:01")
        );
        assert_eq!(pick_mac(&entries, Ipv4Addr::new(192, 168, 1, 9), "wlan0"), None);
    }
}
