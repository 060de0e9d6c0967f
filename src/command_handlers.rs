use anyhow::{Context, Result};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::ai::ReportOutcome;
use crate::app::{AppContext, ScanOutput};
use crate::config::EngineSettings;
use crate::engine::{AlertQueryResult, SecurityEngine};
use crate::events::EngineEvent;
use crate::exports::export_json_line;
use crate::insights::SecurityCertificate;
use crate::models::{ScanJob, ScanStatus};
use crate::scanner::{HostDiscovery, HostProber, IcmpPinger};
use crate::telemetry::{Flow, Heatmap};

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Engine for this command. Telemetry-only commands skip opening an ICMP socket.
fn build_engine(
    context: &AppContext,
    settings: EngineSettings,
    live_icmp: bool,
) -> Result<SecurityEngine> {
    let ai_settings = context.ai_settings().clone();
    let mut engine = match context.discovery() {
        Some(discovery) => {
            SecurityEngine::with_discovery(settings, ai_settings, Arc::clone(discovery))
        }
        None if live_icmp => SecurityEngine::new(settings, ai_settings)
            .context("Failed to initialize network prober")?,
        None => {
            let prober = HostProber::with_pinger(settings.clone(), IcmpPinger::disabled())
                .context("Failed to initialize network prober")?;
            let discovery: Arc<dyn HostDiscovery> = Arc::new(prober);
            SecurityEngine::with_discovery(settings, ai_settings, discovery)
        }
    };

    if let Some(hook) = context.artifact_hook() {
        engine = engine.with_artifact_hook(Arc::clone(hook));
    }
    Ok(engine)
}

fn settings_with_log(context: &AppContext, log: Option<PathBuf>) -> EngineSettings {
    let settings = context.settings().clone();
    match log {
        Some(path) => settings.with_eve_log_path(path),
        None => settings,
    }
}

/// Run one scan to completion, logging devices as they arrive.
async fn run_scan(
    engine: &SecurityEngine,
    network: Option<String>,
    context: &AppContext,
) -> Result<ScanJob> {
    let network = network.unwrap_or_else(|| engine.settings().default_network.clone());
    let mut events = engine.subscribe();
    let ticket = engine.request_scan(&network);

    crate::log_stderr!(
        "NetCert Core v{} - scanning {} (scan {})",
        env!("CARGO_PKG_VERSION"),
        network,
        ticket.scan_id
    );

    let mut ticker = tokio::time::interval(CANCEL_POLL_INTERVAL);
    loop {
        tokio::select! {
            event = events.recv() => match event.as_deref() {
                Some(EngineEvent::DeviceNew(device)) => {
                    crate::log_stderr!(
                        "[SCAN] {} {} {} ({})",
                        device.ip,
                        device.status,
                        device.device_type,
                        device.firmware
                    );
                }
                Some(EngineEvent::ScanComplete { scan_id, .. })
                | Some(EngineEvent::ScanFailed { scan_id, .. })
                    if *scan_id == ticket.scan_id =>
                {
                    break;
                }
                Some(_) => {}
                None => break,
            },
            _ = ticker.tick() => {
                if context.is_cancelled() {
                    engine.cancel_scan(&ticket.scan_id);
                    break;
                }
            }
        }
    }

    let job = engine
        .scan_status(&ticket.scan_id)
        .context("Scan job disappeared from the registry")?;
    if job.status == ScanStatus::Failed {
        return Err(anyhow::anyhow!(
            "Scan of {} failed: {}",
            network,
            job.error.as_deref().unwrap_or("unknown error")
        ));
    }
    Ok(job)
}

pub(crate) async fn scan_result(network: Option<String>, context: &AppContext) -> Result<ScanOutput> {
    let engine = build_engine(context, context.settings().clone(), true)?;
    let job = run_scan(&engine, network, context).await?;
    let devices = engine
        .scan_devices(&job.scan_id)
        .map(|devices| devices.to_vec())
        .unwrap_or_default();
    Ok(ScanOutput { job, devices })
}

pub(crate) async fn certificate_result(
    network: Option<String>,
    context: &AppContext,
) -> Result<SecurityCertificate> {
    let engine = build_engine(context, context.settings().clone(), true)?;
    run_scan(&engine, network, context).await?;
    Ok(engine.generate_certificate())
}

pub(crate) async fn report_result(
    network: Option<String>,
    context: &AppContext,
) -> Result<ReportOutcome> {
    let engine = build_engine(context, context.settings().clone(), true)?;
    run_scan(&engine, network, context).await?;
    let snapshot = engine.current_snapshot().await;
    Ok(engine.generate_report(&snapshot).await)
}

pub(crate) async fn alerts_result(
    min_severity: Option<i64>,
    log: Option<PathBuf>,
    context: &AppContext,
) -> Result<AlertQueryResult> {
    let engine = build_engine(context, settings_with_log(context, log), false)?;
    Ok(engine.alerts(min_severity).await)
}

pub(crate) async fn flows_result(
    src_ip: Option<IpAddr>,
    log: Option<PathBuf>,
    context: &AppContext,
) -> Result<Vec<Flow>> {
    let engine = build_engine(context, settings_with_log(context, log), false)?;
    Ok(engine.flows(src_ip).await)
}

pub(crate) async fn heatmap_result(
    bucket_secs: Option<u64>,
    log: Option<PathBuf>,
    context: &AppContext,
) -> Result<Heatmap> {
    let mut settings = settings_with_log(context, log);
    if let Some(secs) = bucket_secs {
        settings.heatmap_bucket_secs = secs;
    }
    let engine = build_engine(context, settings, false)?;
    Ok(engine.heatmap().await)
}

/// Stream newly appended log records as JSON lines until cancelled.
pub(crate) async fn tail_log(log: Option<PathBuf>, context: &AppContext) -> Result<usize> {
    let engine = build_engine(context, settings_with_log(context, log), false)?;
    let cancel = CancellationToken::new();

    let watcher = {
        let context = context.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                if context.is_cancelled() {
                    cancel.cancel();
                    break;
                }
                tokio::time::sleep(CANCEL_POLL_INTERVAL).await;
            }
        })
    };

    crate::log_stderr!(
        "[INGEST] Following {} (Ctrl+C to stop)",
        engine.settings().eve_log_path.display()
    );

    let mut records = engine.follow_log(cancel).await;
    let mut streamed = 0usize;
    while let Some(record) = records.recv().await {
        let line = export_json_line(&record).context("Failed to serialize log record")?;
        context.emit_line(&line);
        streamed += 1;
    }

    watcher.abort();
    crate::log_stderr!("[INGEST] Tail stopped after {} records", streamed);
    Ok(streamed)
}
