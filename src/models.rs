//! Data models shared by the prober, the scan orchestrator and the engine facade

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;

/// device_type assigned when nothing could be identified
pub const UNKNOWN_DEVICE_TYPE: &str = "Unknown";

/// Confidence carried by a device whose probes returned nothing at all
pub const NO_SIGNAL_CONFIDENCE: f32 = 0.0;

/// Host liveness as observed by the discovery sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Up,
    Down,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Up => "up",
            DeviceStatus::Down => "down",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "up" => Some(DeviceStatus::Up),
            "down" => Some(DeviceStatus::Down),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discovered network host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub ip: IpAddr,
    /// Only known for hosts on the local link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    pub status: DeviceStatus,
    #[serde(default)]
    pub hostnames: Vec<String>,
    #[serde(default)]
    pub open_ports: BTreeSet<u16>,
    pub device_type: String,
    /// Vendor/firmware string from identification, or the raw banner when unclassified
    pub firmware: String,
    pub confidence: f32,
}

impl Device {
    /// Canonical constructor: an unidentified host with no link-layer or port data.
    pub fn new(ip: IpAddr, status: DeviceStatus) -> Self {
        Self {
            ip,
            mac: None,
            status,
            hostnames: Vec::new(),
            open_ports: BTreeSet::new(),
            device_type: UNKNOWN_DEVICE_TYPE.to_string(),
            firmware: UNKNOWN_DEVICE_TYPE.to_string(),
            confidence: NO_SIGNAL_CONFIDENCE,
        }
    }

    pub fn with_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.open_ports.extend(ports);
        self
    }

    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = device_type.into();
        self
    }

    pub fn is_up(&self) -> bool {
        self.status == DeviceStatus::Up
    }

    pub fn is_unknown(&self) -> bool {
        self.device_type == UNKNOWN_DEVICE_TYPE
    }

    /// Merge a follow-up identification result into this device.
    ///
    /// Discovery-owned fields (status, ports, MAC, hostnames) are left alone.
    pub fn apply_identification(&mut self, identified: Identification) {
        self.device_type = identified.device_type;
        self.firmware = identified.firmware;
        self.confidence = identified.confidence;
    }
}

/// Result of service probing for a single host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    pub device_type: String,
    pub firmware: String,
    pub confidence: f32,
    /// Port whose response produced the classification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl Identification {
    /// Nothing answered on any probe port.
    pub fn no_signal() -> Self {
        Self {
            device_type: UNKNOWN_DEVICE_TYPE.to_string(),
            firmware: UNKNOWN_DEVICE_TYPE.to_string(),
            confidence: NO_SIGNAL_CONFIDENCE,
            port: None,
        }
    }
}

/// Scan job lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Scanning,
    Complete,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Scanning => "scanning",
            ScanStatus::Complete => "complete",
            ScanStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScanStatus::Scanning)
    }
}

/// Opaque scan identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanId(String);

impl ScanId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ScanId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returned to the caller as soon as a scan is accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTicket {
    pub scan_id: ScanId,
    pub status: ScanStatus,
}

/// Point-in-time view of a scan job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanJob {
    pub scan_id: ScanId,
    pub network: String,
    pub status: ScanStatus,
    pub device_count: usize,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanJob {
    pub fn new(scan_id: ScanId, network: impl Into<String>) -> Self {
        Self {
            scan_id,
            network: network.into(),
            status: ScanStatus::Scanning,
            device_count: 0,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn new_device_is_unknown_with_no_signal() {
        let device = Device::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)), DeviceStatus::Down);
        assert!(device.is_unknown());
        assert_eq!(device.confidence, NO_SIGNAL_CONFIDENCE);
        assert_eq!(device.firmware, "Unknown");
    }

    #[test]
    fn identification_updates_only_classification_fields() {
        let mut device = Device::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)), DeviceStatus::Up)
            .with_ports([80, 9100]);
        device.hostnames.push("printer.lan".to_string());

        device.apply_identification(Identification {
            device_type: "Printer".to_string(),
            firmware: "Canon".to_string(),
            confidence: 0.85,
            port: Some(80),
        });

        assert_eq!(device.device_type, "Printer");
        assert_eq!(device.hostnames, vec!["printer.lan".to_string()]);
        assert_eq!(device.open_ports.len(), 2);
        assert!(device.is_up());
    }

    #[test]
    fn device_serializes_status_lowercase_and_sorted_ports() {
        let device = Device::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)), DeviceStatus::Up)
            .with_ports([8080, 80, 443]);
        let json = serde_json::to_string(&device).expect("device should serialize");
        assert!(json.contains("\"status\":\"up\""));
        assert!(json.contains("\"open_ports\":[80,443,8080]"));
        assert!(!json.contains("\"mac\""));
    }

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!(DeviceStatus::parse(" UP "), Some(DeviceStatus::Up));
        assert_eq!(DeviceStatus::parse("down"), Some(DeviceStatus::Down));
        assert_eq!(DeviceStatus::parse("sideways"), None);
    }
}
