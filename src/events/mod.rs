//! Real-time engine events
//!
//! Serialized as `{"event": "<name>", "payload": {...}}` so transports can forward them as-is.

mod publisher;

pub use publisher::{EventPublisher, SubscriberId, Subscription};

use serde::{Deserialize, Serialize};

use crate::ai::ReportOutcome;
use crate::models::{Device, ScanId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum EngineEvent {
    /// A scan produced one device
    #[serde(rename = "device:new")]
    DeviceNew(Device),

    /// Emitted once per scan, after all of its `device:new` events
    #[serde(rename = "scan:complete")]
    ScanComplete {
        scan_id: ScanId,
        total_devices: usize,
    },

    /// A scan could not run or was aborted
    #[serde(rename = "scan:failed")]
    ScanFailed { scan_id: ScanId, reason: String },

    #[serde(rename = "report:generated")]
    ReportGenerated(ReportOutcome),
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::DeviceNew(_) => "device:new",
            EngineEvent::ScanComplete { .. } => "scan:complete",
            EngineEvent::ScanFailed { .. } => "scan:failed",
            EngineEvent::ReportGenerated(_) => "report:generated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_complete_wire_format() {
        let event = EngineEvent::ScanComplete {
            scan_id: ScanId::from("abc"),
            total_devices: 3,
        };
        let value = serde_json::to_value(&event).expect("event should serialize");
        assert_eq!(value["event"], "scan:complete");
        assert_eq!(value["payload"]["scan_id"], "abc");
        assert_eq!(value["payload"]["total_devices"], 3);
        assert_eq!(event.name(), "scan:complete");
    }
}
