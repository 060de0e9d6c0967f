//! Configuration constants and env-driven runtime settings for the assessment engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default Suricata EVE JSON log location
pub const DEFAULT_EVE_LOG_PATH: &str = "/var/log/suricata/eve.json";

/// Network scanned when the caller does not name one
pub const DEFAULT_NETWORK: &str = "192.168.1.0/24";

/// Capture interface the IDS is attached to (informational)
pub const DEFAULT_NETWORK_INTERFACE: &str = "eth0";

/// Maximum hosts probed in parallel
pub const MAX_CONCURRENT_PROBES: usize = 128;

/// Timeout for each ICMP echo request
pub const PING_TIMEOUT: Duration = Duration::from_millis(1000);

/// Number of echo attempts per host
pub const PING_RETRIES: u8 = 1;

/// Timeout for each HTTP identification probe
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout for each TCP connect during port enumeration
pub const TCP_CONNECT_TIMEOUT: Duration = Duration::from_millis(400);

/// Maximum hosts expanded from one scan target (a /22 worth)
pub const MAX_SCAN_HOSTS: usize = 1024;

/// Ports checked for every live host during discovery
pub const DISCOVERY_PORTS: &[u16] = &[21, 22, 23, 80, 443, 445, 554, 3389, 8080, 9100];

/// Ordered HTTP identification ports; the first one that answers wins
pub const HTTP_PROBE_PORTS: &[u16] = &[80, 443, 8080];

/// Heatmap bucket width (one hour)
pub const HEATMAP_BUCKET_SECS: u64 = 3600;

/// Poll interval when following a growing IDS log
pub const TAIL_POLL_INTERVAL: Duration = Duration::from_millis(1000);

pub(crate) fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn env_parse_u64(name: &str, default: u64, min: u64, max: u64) -> u64 {
    match env_var(name).and_then(|v| v.parse::<u64>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}

fn env_parse_usize(name: &str, default: usize, min: usize, max: usize) -> usize {
    match env_var(name).and_then(|v| v.parse::<usize>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}

fn env_parse_u8(name: &str, default: u8, min: u8, max: u8) -> u8 {
    match env_var(name).and_then(|v| v.parse::<u8>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}

pub(crate) fn env_parse_bool(name: &str, default: bool) -> bool {
    match env_var(name) {
        Some(value) => {
            let normalized = value.to_ascii_lowercase();
            match normalized.as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => default,
            }
        }
        None => default,
    }
}

fn env_parse_ports(name: &str, default: &[u16]) -> Vec<u16> {
    let parsed: Vec<u16> = env_var(name)
        .map(|raw| {
            raw.split(',')
                .filter_map(|p| p.trim().parse::<u16>().ok())
                .filter(|p| *p > 0)
                .collect()
        })
        .unwrap_or_default();

    if parsed.is_empty() {
        default.to_vec()
    } else {
        parsed
    }
}

/// Runtime-tunable IDS log path.
/// Env: `NETCERT_EVE_LOG_PATH`
pub fn eve_log_path() -> PathBuf {
    PathBuf::from(env_var("NETCERT_EVE_LOG_PATH").unwrap_or_else(|| DEFAULT_EVE_LOG_PATH.into()))
}

/// Runtime-tunable max concurrent host probes.
/// Env: `NETCERT_MAX_CONCURRENT_PROBES`
pub fn max_concurrent_probes() -> usize {
    env_parse_usize("NETCERT_MAX_CONCURRENT_PROBES", MAX_CONCURRENT_PROBES, 1, 4096)
}

/// Runtime-tunable ICMP timeout.
/// Env: `NETCERT_PING_TIMEOUT_MS`
pub fn ping_timeout() -> Duration {
    Duration::from_millis(env_parse_u64(
        "NETCERT_PING_TIMEOUT_MS",
        PING_TIMEOUT.as_millis() as u64,
        50,
        10_000,
    ))
}

/// Runtime-tunable ICMP retry count.
/// Env: `NETCERT_PING_RETRIES`
pub fn ping_retries() -> u8 {
    env_parse_u8("NETCERT_PING_RETRIES", PING_RETRIES, 1, 5)
}

/// Runtime-tunable HTTP identification timeout.
/// Env: `NETCERT_PROBE_TIMEOUT_MS`
pub fn probe_timeout() -> Duration {
    Duration::from_millis(env_parse_u64(
        "NETCERT_PROBE_TIMEOUT_MS",
        PROBE_TIMEOUT.as_millis() as u64,
        250,
        10_000,
    ))
}

/// Runtime-tunable TCP connect timeout.
/// Env: `NETCERT_TCP_CONNECT_TIMEOUT_MS`
pub fn tcp_connect_timeout() -> Duration {
    Duration::from_millis(env_parse_u64(
        "NETCERT_TCP_CONNECT_TIMEOUT_MS",
        TCP_CONNECT_TIMEOUT.as_millis() as u64,
        50,
        5_000,
    ))
}

/// Runtime-tunable host cap for scan target expansion.
/// Env: `NETCERT_MAX_SCAN_HOSTS`
pub fn max_scan_hosts() -> usize {
    env_parse_usize("NETCERT_MAX_SCAN_HOSTS", MAX_SCAN_HOSTS, 1, 65_536)
}

/// Settings shared by the prober, ingestor and aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    pub eve_log_path: PathBuf,
    pub default_network: String,
    /// Preferred interface for neighbour-cache MAC lookups
    pub network_interface: String,
    pub max_concurrent_probes: usize,
    pub ping_timeout_ms: u64,
    pub ping_retries: u8,
    pub probe_timeout_ms: u64,
    pub tcp_connect_timeout_ms: u64,
    pub max_scan_hosts: usize,
    pub discovery_ports: Vec<u16>,
    pub http_probe_ports: Vec<u16>,
    pub heatmap_bucket_secs: u64,
    /// Emit hosts that never answered as `down` devices instead of dropping them.
    pub report_down_hosts: bool,
    pub tail_poll_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            eve_log_path: PathBuf::from(DEFAULT_EVE_LOG_PATH),
            default_network: DEFAULT_NETWORK.to_string(),
            network_interface: DEFAULT_NETWORK_INTERFACE.to_string(),
            max_concurrent_probes: MAX_CONCURRENT_PROBES,
            ping_timeout_ms: PING_TIMEOUT.as_millis() as u64,
            ping_retries: PING_RETRIES,
            probe_timeout_ms: PROBE_TIMEOUT.as_millis() as u64,
            tcp_connect_timeout_ms: TCP_CONNECT_TIMEOUT.as_millis() as u64,
            max_scan_hosts: MAX_SCAN_HOSTS,
            discovery_ports: DISCOVERY_PORTS.to_vec(),
            http_probe_ports: HTTP_PROBE_PORTS.to_vec(),
            heatmap_bucket_secs: HEATMAP_BUCKET_SECS,
            report_down_hosts: true,
            tail_poll_ms: TAIL_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl EngineSettings {
    pub fn from_env() -> Self {
        Self {
            eve_log_path: eve_log_path(),
            default_network: env_var("NETCERT_DEFAULT_NETWORK")
                .unwrap_or_else(|| DEFAULT_NETWORK.to_string()),
            network_interface: env_var("NETCERT_NETWORK_INTERFACE")
                .unwrap_or_else(|| DEFAULT_NETWORK_INTERFACE.to_string()),
            max_concurrent_probes: max_concurrent_probes(),
            ping_timeout_ms: ping_timeout().as_millis() as u64,
            ping_retries: ping_retries(),
            probe_timeout_ms: probe_timeout().as_millis() as u64,
            tcp_connect_timeout_ms: tcp_connect_timeout().as_millis() as u64,
            max_scan_hosts: max_scan_hosts(),
            discovery_ports: env_parse_ports("NETCERT_DISCOVERY_PORTS", DISCOVERY_PORTS),
            http_probe_ports: env_parse_ports("NETCERT_HTTP_PROBE_PORTS", HTTP_PROBE_PORTS),
            heatmap_bucket_secs: env_parse_u64(
                "NETCERT_HEATMAP_BUCKET_SECS",
                HEATMAP_BUCKET_SECS,
                1,
                86_400 * 7,
            ),
            report_down_hosts: env_parse_bool("NETCERT_REPORT_DOWN_HOSTS", true),
            tail_poll_ms: env_parse_u64(
                "NETCERT_TAIL_POLL_MS",
                TAIL_POLL_INTERVAL.as_millis() as u64,
                50,
                60_000,
            ),
        }
    }

    pub fn with_eve_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.eve_log_path = path.into();
        self
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn tcp_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.tcp_connect_timeout_ms)
    }

    pub fn tail_poll_interval(&self) -> Duration {
        Duration::from_millis(self.tail_poll_ms)
    }
}
