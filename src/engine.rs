//! `SecurityEngine`: the one entry point transports and the CLI talk to.
//!
//! All collaborators are passed in at construction. Nothing here is global.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::ai::{generate_report, AiSettings, ReportOutcome, ReportSnapshot};
use crate::config::EngineSettings;
use crate::events::{EngineEvent, EventPublisher, Subscription};
use crate::insights::{
    score_devices, SecurityCertificate, StaticCveCatalog, Vulnerability, VulnerabilitySource,
};
use crate::models::{Device, DeviceStatus, ScanId, ScanJob, ScanTicket};
use crate::scan::ScanOrchestrator;
use crate::scanner::{HostDiscovery, HostProber};
use crate::telemetry::{
    aggregate_device_stats, aggregate_heatmap, Alert, DeviceTrafficStats, EveLogReader,
    EveRecord, EveTail, Flow, Heatmap, TimeBucket,
};

/// Lowest alert severity returned when the caller does not ask for one
pub const DEFAULT_MIN_SEVERITY: i64 = 1;

const TAIL_CHANNEL_CAPACITY: usize = 256;

/// Something the engine produced that a persistence layer may want to keep
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Artifact {
    Certificate(SecurityCertificate),
    Report(ReportOutcome),
}

/// Persistence hook. Called synchronously after each artifact is produced.
pub type ArtifactHook = Arc<dyn Fn(&Artifact) + Send + Sync>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertQueryResult {
    pub alerts: Vec<Alert>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDetail {
    pub device: Device,
    pub traffic: DeviceTrafficStats,
    pub vulnerabilities: Vec<Vulnerability>,
}

pub struct SecurityEngine {
    settings: EngineSettings,
    ai_settings: AiSettings,
    scans: ScanOrchestrator,
    publisher: EventPublisher,
    telemetry: EveLogReader,
    vulnerabilities: Arc<dyn VulnerabilitySource>,
    artifact_hook: Option<ArtifactHook>,
}

impl SecurityEngine {
    /// Engine backed by the live network prober. Must be called inside a Tokio runtime.
    pub fn new(settings: EngineSettings, ai_settings: AiSettings) -> anyhow::Result<Self> {
        let prober = HostProber::new(settings.clone())?;
        Ok(Self::with_discovery(settings, ai_settings, Arc::new(prober)))
    }

    pub fn with_discovery(
        settings: EngineSettings,
        ai_settings: AiSettings,
        discovery: Arc<dyn HostDiscovery>,
    ) -> Self {
        let publisher = EventPublisher::new();
        let scans = ScanOrchestrator::new(discovery, publisher.clone());
        let telemetry = EveLogReader::new(settings.eve_log_path.clone());

        Self {
            settings,
            ai_settings,
            scans,
            publisher,
            telemetry,
            vulnerabilities: Arc::new(StaticCveCatalog::new()),
            artifact_hook: None,
        }
    }

    pub fn with_vulnerability_source(mut self, source: Arc<dyn VulnerabilitySource>) -> Self {
        self.vulnerabilities = source;
        self
    }

    pub fn with_artifact_hook(mut self, hook: ArtifactHook) -> Self {
        self.artifact_hook = Some(hook);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn subscribe(&self) -> Subscription {
        self.publisher.subscribe()
    }

    pub fn request_scan(&self, network: &str) -> ScanTicket {
        self.scans.start_scan(network)
    }

    /// Scan the configured default network.
    pub fn request_default_scan(&self) -> ScanTicket {
        self.scans.start_scan(&self.settings.default_network)
    }

    pub fn scan_status(&self, scan_id: &ScanId) -> Option<ScanJob> {
        self.scans.status(scan_id)
    }

    pub fn scan_devices(&self, scan_id: &ScanId) -> Option<Arc<[Device]>> {
        self.scans.devices(scan_id)
    }

    pub fn cancel_scan(&self, scan_id: &ScanId) -> bool {
        self.scans.cancel(scan_id)
    }

    /// Drop a finished scan and its devices from the registry.
    pub fn forget_scan(&self, scan_id: &ScanId) -> bool {
        self.scans.forget(scan_id)
    }

    pub fn scan_jobs(&self) -> Vec<ScanJob> {
        self.scans.jobs()
    }

    pub async fn wait_for_scan(&self, scan_id: &ScanId) -> Option<ScanJob> {
        self.scans.wait_until_finished(scan_id).await
    }

    /// Devices of the current device set, optionally filtered by status.
    pub fn devices(&self, status: Option<DeviceStatus>) -> Vec<Device> {
        let Some(devices) = self.scans.latest_devices() else {
            return Vec::new();
        };
        devices
            .iter()
            .filter(|d| status.map_or(true, |s| d.status == s))
            .cloned()
            .collect()
    }

    pub async fn device_detail(&self, ip: IpAddr) -> Option<DeviceDetail> {
        let device = self
            .scans
            .latest_devices()?
            .iter()
            .find(|d| d.ip == ip)
            .cloned()?;

        let flows = self.telemetry.flows(Some(ip)).await;
        let traffic = aggregate_device_stats(&flows, ip);
        let vulnerabilities = self.vulnerabilities.lookup(ip, &device.firmware);

        Some(DeviceDetail {
            device,
            traffic,
            vulnerabilities,
        })
    }

    pub async fn alerts(&self, min_severity: Option<i64>) -> AlertQueryResult {
        let alerts = self
            .telemetry
            .alerts(min_severity.unwrap_or(DEFAULT_MIN_SEVERITY))
            .await;
        AlertQueryResult {
            count: alerts.len(),
            alerts,
        }
    }

    pub async fn flows(&self, src_ip: Option<IpAddr>) -> Vec<Flow> {
        self.telemetry.flows(src_ip).await
    }

    pub async fn heatmap(&self) -> Heatmap {
        let flows = self.telemetry.flows(None).await;
        aggregate_heatmap(&flows, TimeBucket::from_secs(self.settings.heatmap_bucket_secs))
    }

    /// Certificate over the live devices of the current device set.
    pub fn generate_certificate(&self) -> SecurityCertificate {
        let devices = self.devices(Some(DeviceStatus::Up));
        let vuln_count: usize = devices
            .iter()
            .map(|d| self.vulnerabilities.lookup(d.ip, &d.firmware).len())
            .sum();

        let certificate = score_devices(&devices, vuln_count);
        crate::log_stderr!(
            "[CERT] {} scored {} ({}) over {} devices, {} issues",
            certificate.certificate_id,
            certificate.score,
            certificate.grade,
            certificate.device_count,
            certificate.issues.len()
        );

        self.persist(&Artifact::Certificate(certificate.clone()));
        certificate
    }

    /// Devices, all flows and their vulnerabilities, ready for [`Self::generate_report`].
    pub async fn current_snapshot(&self) -> ReportSnapshot {
        let devices = self.devices(None);
        let vulnerabilities = devices
            .iter()
            .flat_map(|d| self.vulnerabilities.lookup(d.ip, &d.firmware))
            .collect();
        let flows = self.telemetry.flows(None).await;

        ReportSnapshot {
            devices,
            flows,
            vulnerabilities,
        }
    }

    /// Generate a report, publish `report:generated` and persist it, success or not.
    pub async fn generate_report(&self, snapshot: &ReportSnapshot) -> ReportOutcome {
        let outcome = generate_report(&self.ai_settings, snapshot).await;
        self.publisher
            .publish(EngineEvent::ReportGenerated(outcome.clone()));
        self.persist(&Artifact::Report(outcome.clone()));
        outcome
    }

    /// Follow the IDS log from its current end until `cancel` fires.
    pub async fn follow_log(&self, cancel: CancellationToken) -> mpsc::Receiver<EveRecord> {
        let (tx, rx) = mpsc::channel(TAIL_CHANNEL_CAPACITY);
        let tail = EveTail::from_end(self.settings.eve_log_path.clone()).await;
        tokio::spawn(tail.follow(self.settings.tail_poll_interval(), tx, cancel));
        rx
    }

    fn persist(&self, artifact: &Artifact) {
        if let Some(hook) = &self.artifact_hook {
            hook(artifact);
        }
    }
}
