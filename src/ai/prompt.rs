use serde::{Deserialize, Serialize};

use crate::insights::Vulnerability;
use crate::models::Device;
use crate::telemetry::Flow;

/// Inputs for one report: the current devices plus recent traffic and findings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSnapshot {
    pub devices: Vec<Device>,
    pub flows: Vec<Flow>,
    pub vulnerabilities: Vec<Vulnerability>,
}

impl ReportSnapshot {
    pub fn suspicious_flow_count(&self) -> usize {
        self.flows.iter().filter(|f| f.alerted).count()
    }
}

pub(crate) fn build_report_prompt(snapshot: &ReportSnapshot) -> String {
    let device_lines = if snapshot.devices.is_empty() {
        "- none".to_string()
    } else {
        snapshot
            .devices
            .iter()
            .map(|d| {
                format!(
                    "- IP: {}, MAC: {}, Type: {}, Vendor: {}",
                    d.ip,
                    d.mac.as_deref().unwrap_or("N/A"),
                    d.device_type,
                    d.firmware
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Generate a network security and credibility report from the data below.\n\
\n\
1. Discovered devices ({device_count} total):\n\
{device_lines}\n\
\n\
2. Network traffic:\n\
- Total flows recorded: {total_flows}\n\
- Flows with security alerts: {suspicious_flows}\n\
\n\
3. Vulnerabilities:\n\
- Known vulnerabilities found: {vuln_count}\n\
\n\
Structure the report as:\n\
1. Overall security posture: a score from 1-100 (100 most secure) and one summary paragraph.\n\
2. Key risks and recommendations: the top 3-5 risks with concrete mitigation steps.\n\
3. Suspicious activity: what the alerted traffic could indicate.\n\
4. Device analysis: high-risk devices and why.\n\
\n\
Start with the summary paragraph, separated from the rest by a blank line. \
Write for a non-technical reader and do not invent facts that are not in the data.",
        device_count = snapshot.devices.len(),
        device_lines = device_lines,
        total_flows = snapshot.flows.len(),
        suspicious_flows = snapshot.suspicious_flow_count(),
        vuln_count = snapshot.vulnerabilities.len(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeviceStatus;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn prompt_lists_devices_and_counts() {
        let mut camera = Device::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)), DeviceStatus::Up)
            .with_device_type("Camera");
        camera.mac = Some("AA:BB:CC:00:11:22".to_string());
        camera.firmware = "Wylie".to_string();

        let snapshot = ReportSnapshot {
            devices: vec![camera],
            flows: vec![],
            vulnerabilities: vec![],
        };
        let prompt = build_report_prompt(&snapshot);

        assert!(prompt.contains("(1 total)"));
        assert!(prompt.contains("- IP: 10.0.0.7, MAC: AA:BB:CC:00:11:22, Type: Camera, Vendor: Wylie"));
        assert!(prompt.contains("Total flows recorded: 0"));
        assert!(prompt.contains("Known vulnerabilities found: 0"));
    }

    #[test]
    fn empty_snapshot_still_builds() {
        let prompt = build_report_prompt(&ReportSnapshot::default());
        assert!(prompt.contains("(0 total):\n- none"));
    }
}
