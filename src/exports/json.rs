//! JSON export
//!
//! Every command result is wrapped with the command name and an RFC3339 export stamp.

use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct JsonExport<'a, T: Serialize> {
    kind: &'a str,
    exported_at: String,
    data: &'a T,
}

/// Pretty-printed `{"kind", "exported_at", "data"}` document.
pub fn export_json<T: Serialize>(kind: &str, data: &T) -> Result<String> {
    let export = JsonExport {
        kind,
        exported_at: chrono::Utc::now().to_rfc3339(),
        data,
    };
    Ok(serde_json::to_string_pretty(&export)?)
}

/// Single-line JSON for streaming output.
pub fn export_json_line<T: Serialize>(data: &T) -> Result<String> {
    Ok(serde_json::to_string(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::score_devices;

    #[test]
    fn export_wraps_payload_with_stamp() {
        let cert = score_devices(&[], 0);
        let json = export_json("certificate", &cert).expect("certificate should export");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");

        assert_eq!(parsed["kind"], "certificate");
        assert_eq!(parsed["data"]["score"], 100);
        assert_eq!(parsed["data"]["grade"], "A+");
        let stamp = parsed["exported_at"].as_str().expect("stamp should be a string");
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
        assert!(json.contains('\n'));
    }

    #[test]
    fn line_export_is_single_line() {
        let line = export_json_line(&vec![1, 2, 3]).expect("vec should export");
        assert_eq!(line, "[1,2,3]");
    }
}
