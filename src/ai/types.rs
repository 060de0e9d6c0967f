use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// AI routing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiMode {
    Disabled,
    Local,
    Cloud,
    HybridAuto,
}

impl AiMode {
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "disabled" | "off" => Some(Self::Disabled),
            "local" => Some(Self::Local),
            "cloud" => Some(Self::Cloud),
            "hybrid" | "hybrid_auto" | "auto" => Some(Self::HybridAuto),
            _ => None,
        }
    }
}

/// A generated network credibility report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkReport {
    pub report_text: String,
    /// First paragraph of `report_text`
    pub summary: String,
    pub provider: String,
    pub model: String,
    pub generated_at: DateTime<Utc>,
}

/// Result of one report request. Generation failures are values, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportOutcome {
    Generated(NetworkReport),
    Failed { error: String },
}

impl ReportOutcome {
    pub(crate) fn failed(reason: impl std::fmt::Display) -> Self {
        Self::Failed {
            error: format!("report generation failed: {}", reason),
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, Self::Generated(_))
    }

    pub fn report(&self) -> Option<&NetworkReport> {
        match self {
            Self::Generated(report) => Some(report),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Generated(_) => None,
            Self::Failed { error } => Some(error),
        }
    }
}
