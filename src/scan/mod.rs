//! Background scan jobs

mod orchestrator;

pub use orchestrator::ScanOrchestrator;
