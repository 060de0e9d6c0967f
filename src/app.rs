use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::ai::{AiSettings, ReportOutcome};
use crate::cli::{parse_cli_args, usage_text, version_text, CliCommand};
use crate::command_handlers::{
    alerts_result, certificate_result, flows_result, heatmap_result, report_result, scan_result,
    tail_log,
};
use crate::config::EngineSettings;
use crate::engine::{AlertQueryResult, ArtifactHook};
use crate::exports::export_json;
use crate::insights::SecurityCertificate;
use crate::models::{Device, ScanJob};
use crate::scanner::HostDiscovery;
use crate::telemetry::{Flow, Heatmap};

pub type OutputHook = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone)]
pub struct AppContext {
    settings: EngineSettings,
    ai_settings: AiSettings,
    output_hook: OutputHook,
    artifact_hook: Option<ArtifactHook>,
    discovery: Option<Arc<dyn HostDiscovery>>,
    cancel_flag: Arc<AtomicBool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScanOutput {
    pub job: ScanJob,
    pub devices: Vec<Device>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum AppCommandResult {
    HelpText(String),
    VersionText(String),
    Scan(ScanOutput),
    Certificate(SecurityCertificate),
    Report(ReportOutcome),
    Alerts(AlertQueryResult),
    Flows(Vec<Flow>),
    Heatmap(Heatmap),
    /// Number of records streamed before cancellation
    Tail(usize),
}

impl Default for AppContext {
    fn default() -> Self {
        Self::from_env()
    }
}

impl AppContext {
    pub fn from_env() -> Self {
        Self {
            settings: EngineSettings::from_env(),
            ai_settings: AiSettings::from_env(),
            output_hook: Arc::new(|line| println!("{}", line)),
            artifact_hook: None,
            discovery: None,
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_ai_settings(mut self, ai_settings: AiSettings) -> Self {
        self.ai_settings = ai_settings;
        self
    }

    pub fn with_output_hook(mut self, output_hook: OutputHook) -> Self {
        self.output_hook = output_hook;
        self
    }

    pub fn with_artifact_hook(mut self, artifact_hook: ArtifactHook) -> Self {
        self.artifact_hook = Some(artifact_hook);
        self
    }

    /// Replace the live network prober, e.g. with a scripted one.
    pub fn with_discovery(mut self, discovery: Arc<dyn HostDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn ai_settings(&self) -> &AiSettings {
        &self.ai_settings
    }

    pub(crate) fn artifact_hook(&self) -> Option<&ArtifactHook> {
        self.artifact_hook.as_ref()
    }

    pub(crate) fn discovery(&self) -> Option<&Arc<dyn HostDiscovery>> {
        self.discovery.as_ref()
    }

    pub fn emit_line(&self, line: &str) {
        (self.output_hook)(line);
    }

    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn reset_cancel(&self) {
        self.cancel_flag.store(false, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }
}

/// Parse CLI-style args (program name first) and dispatch with settings from the environment.
pub async fn run<I, S>(args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    run_with_context(args, &AppContext::from_env()).await
}

/// Like [`run_with_context`], but Ctrl+C flips the context's cancel flag so long-running
/// commands (scan, tail) stop cleanly.
pub async fn run_with_ctrl_c<I, S>(args: I, context: &AppContext) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let signal_context = context.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            crate::log_warn!("Interrupted, stopping current command");
            signal_context.cancel();
        }
    });

    let outcome = run_with_context(args, context).await;
    signal_task.abort();
    outcome
}

pub async fn run_with_context<I, S>(args: I, context: &AppContext) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let command = parse_cli_args(args)?;
    execute_command_with_context(command, context).await
}

/// Execute a pre-parsed command with an explicit execution context.
pub async fn execute_command_with_context(command: CliCommand, context: &AppContext) -> Result<()> {
    let result = execute_command_typed(command, context).await?;
    emit_command_result(&result, context)
}

/// Execute a pre-parsed command and return a strongly-typed result payload.
pub async fn execute_command_typed(
    command: CliCommand,
    context: &AppContext,
) -> Result<AppCommandResult> {
    match command {
        CliCommand::Help => Ok(AppCommandResult::HelpText(usage_text())),
        CliCommand::Version => Ok(AppCommandResult::VersionText(version_text())),
        CliCommand::Scan { network } => Ok(AppCommandResult::Scan(
            scan_result(network, context).await?,
        )),
        CliCommand::Certificate { network } => Ok(AppCommandResult::Certificate(
            certificate_result(network, context).await?,
        )),
        CliCommand::Report { network } => Ok(AppCommandResult::Report(
            report_result(network, context).await?,
        )),
        CliCommand::Alerts { min_severity, log } => Ok(AppCommandResult::Alerts(
            alerts_result(min_severity, log, context).await?,
        )),
        CliCommand::Flows { src_ip, log } => Ok(AppCommandResult::Flows(
            flows_result(src_ip, log, context).await?,
        )),
        CliCommand::Heatmap { bucket_secs, log } => Ok(AppCommandResult::Heatmap(
            heatmap_result(bucket_secs, log, context).await?,
        )),
        CliCommand::Tail { log } => Ok(AppCommandResult::Tail(tail_log(log, context).await?)),
    }
}

fn emit_command_result(result: &AppCommandResult, context: &AppContext) -> Result<()> {
    let output = match result {
        AppCommandResult::HelpText(text) | AppCommandResult::VersionText(text) => text.clone(),
        AppCommandResult::Scan(scan) => {
            export_json("scan", scan).context("Failed to serialize scan result")?
        }
        AppCommandResult::Certificate(cert) => {
            export_json("certificate", cert).context("Failed to serialize certificate")?
        }
        AppCommandResult::Report(outcome) => {
            export_json("report", outcome).context("Failed to serialize report")?
        }
        AppCommandResult::Alerts(alerts) => {
            export_json("alerts", alerts).context("Failed to serialize alerts")?
        }
        AppCommandResult::Flows(flows) => {
            export_json("flows", flows).context("Failed to serialize flows")?
        }
        AppCommandResult::Heatmap(heatmap) => {
            export_json("heatmap", heatmap).context("Failed to serialize heatmap")?
        }
        // records were already streamed line by line
        AppCommandResult::Tail(_) => return Ok(()),
    };

    context.emit_line(&output);
    Ok(())
}
