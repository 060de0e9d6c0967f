//! AI report generation over local (Ollama) and cloud (OpenAI) providers.

pub mod config;
mod prompt;
mod provider;
mod providers;
mod router;
pub mod types;

pub use config::AiSettings;
pub use prompt::ReportSnapshot;
pub use router::{generate_report, summarize_report};
pub use types::{AiMode, NetworkReport, ReportOutcome};
