//! Engine error taxonomy
//!
//! Only [`EngineError::ScanTargetInvalid`] is fatal, and only to the scan job it belongs to.
//! Everything else is recovered per item by the component that hits it.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A single host/service probe did not answer in time.
    #[error("probe timed out: {target}")]
    ProbeTimeout { target: String },

    #[error("invalid scan target '{target}': {reason}")]
    ScanTargetInvalid { target: String, reason: String },

    #[error("IDS log unavailable at {}: {source}", path.display())]
    LogUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed log record at line {line}: {reason}")]
    MalformedLogRecord { line: usize, reason: String },

    #[error("upstream service failure: {0}")]
    UpstreamServiceFailure(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn invalid_target(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ScanTargetInvalid {
            target: target.into(),
            reason: reason.into(),
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
