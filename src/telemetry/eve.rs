//! Suricata EVE JSON record parsing
//!
//! One line is one event. Lines are dispatched on `event_type`; only `alert` and `flow`
//! become records, everything else is skipped without validation.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::IpAddr;

/// One IDS detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Higher is more severe
    pub severity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_ip: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_ip: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proto: Option<String>,
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_id: Option<u64>,
    pub category: String,
}

/// One flow summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_ip: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_ip: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proto: Option<String>,
    pub bytes_toserver: u64,
    pub bytes_toclient: u64,
    pub pkts_toserver: u64,
    pub pkts_toclient: u64,
    /// The IDS raised at least one alert on this flow
    pub alerted: bool,
}

impl Flow {
    pub fn total_bytes(&self) -> u64 {
        self.bytes_toserver.saturating_add(self.bytes_toclient)
    }

    pub fn total_packets(&self) -> u64 {
        self.pkts_toserver.saturating_add(self.pkts_toclient)
    }
}

/// A parsed line that the engine cares about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "lowercase")]
pub enum EveRecord {
    Alert(Alert),
    Flow(Flow),
}

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    timestamp: Option<String>,
    src_ip: Option<IpAddr>,
    #[serde(alias = "dst_ip")]
    dest_ip: Option<IpAddr>,
    src_port: Option<u16>,
    #[serde(alias = "dst_port")]
    dest_port: Option<u16>,
    proto: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AlertBody {
    #[serde(default)]
    severity: i64,
    #[serde(default)]
    signature: String,
    signature_id: Option<u64>,
    #[serde(default)]
    category: String,
}

#[derive(Debug, Default, Deserialize)]
struct FlowBody {
    src_ip: Option<IpAddr>,
    #[serde(alias = "dst_ip")]
    dest_ip: Option<IpAddr>,
    start: Option<String>,
    #[serde(default)]
    bytes_toserver: u64,
    #[serde(default)]
    bytes_toclient: u64,
    #[serde(default)]
    pkts_toserver: u64,
    #[serde(default)]
    pkts_toclient: u64,
    #[serde(alias = "alert")]
    alerted: Option<bool>,
}

/// Parse one log line.
///
/// `Ok(None)` for blank lines and event types the engine ignores; `Err(reason)` when the line
/// is not valid JSON or an alert/flow event has fields of the wrong shape.
pub fn parse_line(line: &str) -> Result<Option<EveRecord>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let mut value: Value = serde_json::from_str(trimmed).map_err(|e| e.to_string())?;
    let event_type = match value.get("event_type").and_then(Value::as_str) {
        Some(t) => t.to_string(),
        None => return Err("missing event_type".to_string()),
    };

    match event_type.as_str() {
        "alert" => parse_alert(&mut value).map(|a| Some(EveRecord::Alert(a))),
        "flow" => parse_flow(&mut value).map(|f| Some(EveRecord::Flow(f))),
        _ => Ok(None),
    }
}

fn take_field<T: for<'de> Deserialize<'de> + Default>(
    value: &mut Value,
    key: &str,
) -> Result<T, String> {
    match value.get_mut(key).map(Value::take) {
        Some(Value::Null) | None => Ok(T::default()),
        Some(inner) => serde_json::from_value(inner).map_err(|e| format!("{}: {}", key, e)),
    }
}

fn parse_alert(value: &mut Value) -> Result<Alert, String> {
    let body: AlertBody = take_field(value, "alert")?;
    let envelope: Envelope = serde_json::from_value(value.take()).map_err(|e| e.to_string())?;

    Ok(Alert {
        timestamp: envelope.timestamp.as_deref().and_then(parse_eve_timestamp),
        severity: body.severity,
        src_ip: envelope.src_ip,
        dest_ip: envelope.dest_ip,
        src_port: envelope.src_port,
        dest_port: envelope.dest_port,
        proto: envelope.proto,
        signature: body.signature,
        signature_id: body.signature_id,
        category: body.category,
    })
}

fn parse_flow(value: &mut Value) -> Result<Flow, String> {
    let body: FlowBody = take_field(value, "flow")?;
    let envelope: Envelope = serde_json::from_value(value.take()).map_err(|e| e.to_string())?;

    let start = body
        .start
        .as_deref()
        .and_then(parse_eve_timestamp)
        .or_else(|| envelope.timestamp.as_deref().and_then(parse_eve_timestamp));

    Ok(Flow {
        start,
        src_ip: body.src_ip.or(envelope.src_ip),
        dest_ip: body.dest_ip.or(envelope.dest_ip),
        src_port: envelope.src_port,
        dest_port: envelope.dest_port,
        proto: envelope.proto,
        bytes_toserver: body.bytes_toserver,
        bytes_toclient: body.bytes_toclient,
        pkts_toserver: body.pkts_toserver,
        pkts_toclient: body.pkts_toclient,
        alerted: body.alerted.unwrap_or(false),
    })
}

/// Suricata writes `2024-01-15T10:30:00.123456+0000`; RFC 3339 and naive UTC are accepted too.
pub fn parse_eve_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use std::net::Ipv4Addr;

    const ALERT_LINE: &str = r#"{"timestamp":"2024-01-15T10:30:00.123456+0000","event_type":"alert","src_ip":"10.0.0.5","src_port":51544,"dest_ip":"93.184.216.34","dest_port":80,"proto":"TCP","alert":{"action":"allowed","signature_id":2100498,"signature":"GPL ATTACK_RESPONSE id check returned root","category":"Potentially Bad Traffic","severity":2}}"#;

    const FLOW_LINE: &str = r#"{"timestamp":"2024-01-15T10:31:00.000000+0000","event_type":"flow","src_ip":"10.0.0.5","dest_ip":"10.0.0.1","proto":"UDP","flow":{"pkts_toserver":3,"pkts_toclient":2,"bytes_toserver":300,"bytes_toclient":200,"start":"2024-01-15T10:29:59.500000+0000","alerted":true}}"#;

    #[test]
    fn parses_suricata_alert() {
        let record = parse_line(ALERT_LINE)
            .expect("alert should parse")
            .expect("alert should be kept");
        let EveRecord::Alert(alert) = record else {
            panic!("expected an alert record");
        };
        assert_eq!(alert.severity, 2);
        assert_eq!(alert.src_ip, Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))));
        assert_eq!(alert.dest_port, Some(80));
        assert_eq!(alert.signature_id, Some(2100498));
        assert_eq!(alert.category, "Potentially Bad Traffic");
        let ts = alert.timestamp.expect("timestamp should parse");
        assert_eq!((ts.hour(), ts.minute()), (10, 30));
    }

    #[test]
    fn parses_suricata_flow_with_nested_start() {
        let record = parse_line(FLOW_LINE)
            .expect("flow should parse")
            .expect("flow should be kept");
        let EveRecord::Flow(flow) = record else {
            panic!("expected a flow record");
        };
        assert!(flow.alerted);
        assert_eq!(flow.total_bytes(), 500);
        assert_eq!(flow.total_packets(), 5);
        assert_eq!(flow.start.map(|s| s.minute()), Some(29));
    }

    #[test]
    fn nested_flow_addresses_take_precedence() {
        let line = r#"{"event_type":"flow","src_ip":"1.1.1.1","flow":{"src_ip":"10.0.0.9","dst_ip":"10.0.0.1","alert":false}}"#;
        let Some(EveRecord::Flow(flow)) = parse_line(line).expect("flow should parse") else {
            panic!("expected a flow record");
        };
        assert_eq!(flow.src_ip, Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9))));
        assert_eq!(flow.dest_ip, Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert!(!flow.alerted);
        assert_eq!(flow.start, None);
    }

    #[test]
    fn other_event_types_are_skipped() {
        for line in [
            r#"{"event_type":"dns","dns":{"rrname":"example.com"}}"#,
            r#"{"event_type":"stats","stats":{"uptime":10}}"#,
            "   ",
        ] {
            assert_eq!(parse_line(line).expect("should not error"), None);
        }
    }

    #[test]
    fn malformed_lines_are_errors() {
        for line in [
            "{not json",
            r#"{"no_type":true}"#,
            r#"{"event_type":"alert","alert":{"severity":"high"}}"#,
            r#"{"event_type":"flow","src_ip":"not-an-ip","flow":{}}"#,
        ] {
            assert!(parse_line(line).is_err(), "line should be rejected: {line}");
        }
    }

    #[test]
    fn alert_without_severity_defaults_to_zero() {
        let line = r#"{"event_type":"alert","alert":{"signature":"x"}}"#;
        let Some(EveRecord::Alert(alert)) = parse_line(line).expect("alert should parse") else {
            panic!("expected an alert record");
        };
        assert_eq!(alert.severity, 0);
    }

    #[test]
    fn timestamp_formats() {
        assert!(parse_eve_timestamp("2024-01-15T10:30:00.123456+0000").is_some());
        assert!(parse_eve_timestamp("2024-01-15T10:30:00Z").is_some());
        assert!(parse_eve_timestamp("2024-01-15T10:30:00").is_some());
        assert!(parse_eve_timestamp("yesterday").is_none());
    }
}
