//! NetCert Core Engine - network discovery, IDS telemetry and security certification
//!
//! - Concurrent host probing (ICMP, TCP connect, HTTP banner fingerprinting)
//! - Background scan jobs with real-time `device:new` / `scan:complete` events
//! - Suricata EVE log queries, tailing and traffic heatmaps
//! - Security certificates scored from the discovered device set
//! - AI-generated network credibility reports (Ollama or OpenAI)

pub mod ai;
pub mod app;
pub mod cli;
mod command_handlers;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod exports;
pub mod insights;
pub mod logging;
pub mod models;
pub mod network;
pub mod scan;
pub mod scanner;
pub mod telemetry;

pub use ai::{
    generate_report, summarize_report, AiMode, AiSettings, NetworkReport, ReportOutcome,
    ReportSnapshot,
};
pub use app::{
    execute_command_typed, execute_command_with_context, run, run_with_context, run_with_ctrl_c,
    AppCommandResult, AppContext, OutputHook, ScanOutput,
};
pub use cli::{parse_cli_args, usage_text, version_text, CliCommand};
pub use config::EngineSettings;
pub use engine::{AlertQueryResult, Artifact, ArtifactHook, DeviceDetail, SecurityEngine};
pub use error::{EngineError, EngineResult};
pub use events::{EngineEvent, EventPublisher, SubscriberId, Subscription};
pub use exports::{export_json, export_json_line};
pub use insights::{
    grade_for, score_devices, Grade, NoVulnerabilities, SecurityCertificate, StaticCveCatalog,
    Vulnerability, VulnerabilitySource,
};
pub use models::*;
pub use network::ScanTarget;
pub use scan::ScanOrchestrator;
pub use scanner::{classify_banner, HostDiscovery, HostProber, IcmpPinger};
pub use telemetry::{
    aggregate_device_stats, aggregate_heatmap, Alert, DeviceTrafficStats, EveLogReader, EveRecord,
    EveTail, Flow, Heatmap, HeatmapCell, IngestReport, TimeBucket,
};

#[doc(hidden)]
pub use tracing as __tracing;
