//! Scan orchestration
//!
//! `start_scan` registers a job and spawns one task per scan. That task is the only consumer of
//! the prober's device channel, so `device:new` events go out one at a time in discovery
//! completion order, and `scan:complete` is published only after the channel has drained.
//!
//! Recording a device and publishing its event happen under the job's registry entry, the same
//! lock `cancel` takes. Once `cancel` returns, nothing more is published for that scan.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::events::{EngineEvent, EventPublisher};
use crate::models::{Device, ScanId, ScanJob, ScanStatus, ScanTicket};
use crate::network::ScanTarget;
use crate::scanner::HostDiscovery;

const DEVICE_CHANNEL_CAPACITY: usize = 64;
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const CANCELLED_REASON: &str = "cancelled by caller";
/// Finished jobs kept in the registry before the oldest are evicted
pub const DEFAULT_MAX_FINISHED_JOBS: usize = 32;

struct JobEntry {
    job: ScanJob,
    /// Devices recorded so far, in emission order
    devices: Vec<Device>,
    /// Frozen result, set once the job reaches a terminal state
    snapshot: Option<Arc<[Device]>>,
    cancel: CancellationToken,
}

impl JobEntry {
    fn freeze(&mut self, status: ScanStatus, error: Option<String>) {
        self.job.status = status;
        self.job.error = error;
        self.job.finished_at = Some(Utc::now());
        self.job.device_count = self.devices.len();
        self.snapshot = Some(Arc::from(std::mem::take(&mut self.devices)));
    }

    fn current_devices(&self) -> Arc<[Device]> {
        match &self.snapshot {
            Some(snapshot) => Arc::clone(snapshot),
            None => Arc::from(self.devices.clone()),
        }
    }
}

/// Runs scans in the background and tracks their jobs. Cheap to clone.
#[derive(Clone)]
pub struct ScanOrchestrator {
    discovery: Arc<dyn HostDiscovery>,
    publisher: EventPublisher,
    jobs: Arc<DashMap<ScanId, JobEntry>>,
    latest_complete: Arc<RwLock<Option<ScanId>>>,
    max_finished_jobs: usize,
}

impl ScanOrchestrator {
    pub fn new(discovery: Arc<dyn HostDiscovery>, publisher: EventPublisher) -> Self {
        Self {
            discovery,
            publisher,
            jobs: Arc::new(DashMap::new()),
            latest_complete: Arc::new(RwLock::new(None)),
            max_finished_jobs: DEFAULT_MAX_FINISHED_JOBS,
        }
    }

    /// Keep at most `max` finished jobs (minimum 1). The latest completed scan is never evicted.
    pub fn with_job_retention(mut self, max: usize) -> Self {
        self.max_finished_jobs = max.max(1);
        self
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    /// Register a scan of `network` and start it in the background.
    ///
    /// Returns immediately with status `scanning`; the target is validated by the scan task.
    /// Must be called from within a Tokio runtime.
    pub fn start_scan(&self, network: &str) -> ScanTicket {
        let scan_id = ScanId::generate();
        let cancel = CancellationToken::new();
        let network = network.trim().to_string();

        self.jobs.insert(
            scan_id.clone(),
            JobEntry {
                job: ScanJob::new(scan_id.clone(), network.clone()),
                devices: Vec::new(),
                snapshot: None,
                cancel: cancel.clone(),
            },
        );

        crate::log_stderr!("[SCAN] {} queued for {}", scan_id, network);

        let this = self.clone();
        let task_id = scan_id.clone();
        tokio::spawn(async move { this.run_scan(task_id, network, cancel).await });

        ScanTicket {
            scan_id,
            status: ScanStatus::Scanning,
        }
    }

    pub fn status(&self, scan_id: &ScanId) -> Option<ScanJob> {
        self.jobs.get(scan_id).map(|entry| entry.job.clone())
    }

    /// Devices of one scan: the frozen result once finished, the devices so far before that.
    pub fn devices(&self, scan_id: &ScanId) -> Option<Arc<[Device]>> {
        self.jobs.get(scan_id).map(|entry| entry.current_devices())
    }

    /// Abort a running scan. Returns false for unknown or already finished scans.
    pub fn cancel(&self, scan_id: &ScanId) -> bool {
        let Some(mut entry) = self.jobs.get_mut(scan_id) else {
            return false;
        };
        if entry.job.status.is_terminal() {
            return false;
        }

        entry.cancel.cancel();
        entry.freeze(ScanStatus::Failed, Some(CANCELLED_REASON.to_string()));
        crate::log_stderr!(
            "[SCAN] {} cancelled after {} devices",
            scan_id,
            entry.job.device_count
        );
        drop(entry);

        self.prune_finished();
        true
    }

    /// Drop a finished job and its devices. Running jobs are kept; cancel them first.
    pub fn forget(&self, scan_id: &ScanId) -> bool {
        let removed = self
            .jobs
            .remove_if(scan_id, |_, entry| entry.job.status.is_terminal())
            .is_some();
        if removed {
            if let Ok(mut latest) = self.latest_complete.write() {
                if latest.as_ref() == Some(scan_id) {
                    *latest = None;
                }
            }
        }
        removed
    }

    /// The current device set: the latest completed scan, or failing that the newest scan
    /// that produced any devices.
    pub fn latest_devices(&self) -> Option<Arc<[Device]>> {
        let latest = self
            .latest_complete
            .read()
            .ok()
            .and_then(|guard| guard.clone());
        if let Some(devices) = latest.and_then(|id| self.devices(&id)) {
            return Some(devices);
        }

        self.jobs
            .iter()
            .filter(|entry| {
                entry.snapshot.as_ref().is_some_and(|s| !s.is_empty()) || !entry.devices.is_empty()
            })
            .max_by_key(|entry| entry.job.started_at)
            .map(|entry| entry.current_devices())
    }

    pub fn jobs(&self) -> Vec<ScanJob> {
        let mut jobs: Vec<ScanJob> = self.jobs.iter().map(|entry| entry.job.clone()).collect();
        jobs.sort_by_key(|job| job.started_at);
        jobs
    }

    /// Poll until the scan reaches a terminal state.
    pub async fn wait_until_finished(&self, scan_id: &ScanId) -> Option<ScanJob> {
        loop {
            let job = self.status(scan_id)?;
            if job.status.is_terminal() {
                return Some(job);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    async fn run_scan(&self, scan_id: ScanId, network: String, cancel: CancellationToken) {
        let target = match ScanTarget::parse(&network) {
            Ok(target) => target,
            Err(e) => {
                self.fail(&scan_id, e.to_string());
                return;
            }
        };

        let (tx, mut rx) = mpsc::channel(DEVICE_CHANNEL_CAPACITY);
        let discovery = Arc::clone(&self.discovery);
        let probe_cancel = cancel.clone();
        let producer = tokio::spawn(async move {
            tokio::select! {
                result = discovery.discover(&target, tx) => Some(result),
                _ = probe_cancel.cancelled() => None,
            }
        });

        loop {
            let device = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = rx.recv() => match next {
                    Some(device) => device,
                    None => break,
                },
            };
            if !self.emit_device(&scan_id, device) {
                break;
            }
        }
        drop(rx);

        let discovery_result = match producer.await {
            Ok(result) => result,
            Err(e) => {
                crate::log_error!("[SCAN] {} discovery task failed: {}", scan_id, e);
                None
            }
        };

        if cancel.is_cancelled() {
            return;
        }

        match discovery_result {
            Some(Err(e @ EngineError::ScanTargetInvalid { .. })) => {
                self.fail(&scan_id, e.to_string());
                return;
            }
            Some(Err(e)) => {
                crate::log_warn!("[SCAN] {} discovery ended early: {}", scan_id, e);
            }
            Some(Ok(_)) | None => {}
        }

        self.complete(&scan_id);
    }

    /// Record one device and publish it. False once the scan has been cancelled.
    fn emit_device(&self, scan_id: &ScanId, device: Device) -> bool {
        let Some(mut entry) = self.jobs.get_mut(scan_id) else {
            return false;
        };
        if entry.cancel.is_cancelled() || entry.job.status.is_terminal() {
            return false;
        }

        entry.devices.push(device.clone());
        entry.job.device_count = entry.devices.len();
        self.publisher.publish(EngineEvent::DeviceNew(device));
        true
    }

    fn complete(&self, scan_id: &ScanId) {
        let total_devices = {
            let Some(mut entry) = self.jobs.get_mut(scan_id) else {
                return;
            };
            if entry.job.status.is_terminal() {
                return;
            }
            entry.freeze(ScanStatus::Complete, None);
            entry.job.device_count
        };

        if let Ok(mut latest) = self.latest_complete.write() {
            *latest = Some(scan_id.clone());
        }

        crate::log_stderr!("[SCAN] {} complete: {} devices", scan_id, total_devices);
        self.publisher.publish(EngineEvent::ScanComplete {
            scan_id: scan_id.clone(),
            total_devices,
        });
        self.prune_finished();
    }

    fn fail(&self, scan_id: &ScanId, reason: String) {
        {
            let Some(mut entry) = self.jobs.get_mut(scan_id) else {
                return;
            };
            if entry.job.status.is_terminal() {
                return;
            }
            entry.freeze(ScanStatus::Failed, Some(reason.clone()));
        }

        crate::log_warn!("[SCAN] {} failed: {}", scan_id, reason);
        self.publisher.publish(EngineEvent::ScanFailed {
            scan_id: scan_id.clone(),
            reason,
        });
        self.prune_finished();
    }

    /// Evict the oldest finished jobs beyond the retention limit.
    fn prune_finished(&self) {
        let latest = self
            .latest_complete
            .read()
            .ok()
            .and_then(|guard| guard.clone());

        let mut finished: Vec<(ScanId, Option<chrono::DateTime<Utc>>)> = self
            .jobs
            .iter()
            .filter(|entry| entry.job.status.is_terminal())
            .filter(|entry| latest.as_ref() != Some(entry.key()))
            .map(|entry| (entry.key().clone(), entry.job.finished_at))
            .collect();

        let keep = self.max_finished_jobs - usize::from(latest.is_some());
        if finished.len() <= keep {
            return;
        }

        finished.sort_by_key(|(_, finished_at)| *finished_at);
        let evict = finished.len() - keep;
        for (scan_id, _) in finished.into_iter().take(evict) {
            if self.forget(&scan_id) {
                crate::log_debug!("[SCAN] {} evicted from the job registry", scan_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineResult;
    use crate::events::Subscription;
    use crate::models::DeviceStatus;
    use std::future::Future;
    use std::net::{IpAddr, Ipv4Addr};
    use std::pin::Pin;
    use tokio::sync::Notify;

    fn device(last: u8) -> Device {
        Device::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last)), DeviceStatus::Up)
    }

    /// Sends a fixed list of devices; optionally parks after the first until released.
    struct ScriptedDiscovery {
        devices: Vec<Device>,
        gate: Option<Arc<Notify>>,
    }

    impl HostDiscovery for ScriptedDiscovery {
        fn discover<'a>(
            &'a self,
            _target: &'a ScanTarget,
            sink: mpsc::Sender<Device>,
        ) -> Pin<Box<dyn Future<Output = EngineResult<usize>> + Send + 'a>> {
            Box::pin(async move {
                let mut sent = 0;
                for (i, device) in self.devices.iter().enumerate() {
                    if i == 1 {
                        if let Some(gate) = &self.gate {
                            gate.notified().await;
                        }
                    }
                    if sink.send(device.clone()).await.is_err() {
                        break;
                    }
                    sent += 1;
                }
                Ok(sent)
            })
        }
    }

    fn orchestrator(devices: Vec<Device>, gate: Option<Arc<Notify>>) -> ScanOrchestrator {
        ScanOrchestrator::new(
            Arc::new(ScriptedDiscovery { devices, gate }),
            EventPublisher::new(),
        )
    }

    async fn next_event(sub: &mut Subscription) -> Arc<EngineEvent> {
        tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("event should arrive in time")
            .expect("publisher should stay open")
    }

    #[tokio::test]
    async fn devices_are_emitted_in_order_before_completion() {
        let orch = orchestrator(vec![device(1), device(2), device(3)], None);
        let mut sub = orch.publisher().subscribe();

        let ticket = orch.start_scan("10.0.0.0/29");
        assert_eq!(ticket.status, ScanStatus::Scanning);

        let mut seen = Vec::new();
        loop {
            match next_event(&mut sub).await.as_ref() {
                EngineEvent::DeviceNew(d) => seen.push(d.ip),
                EngineEvent::ScanComplete {
                    scan_id,
                    total_devices,
                } => {
                    assert_eq!(scan_id, &ticket.scan_id);
                    assert_eq!(*total_devices, 3);
                    break;
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(seen, vec![device(1).ip, device(2).ip, device(3).ip]);

        let job = orch.status(&ticket.scan_id).expect("job should exist");
        assert_eq!(job.status, ScanStatus::Complete);
        assert_eq!(job.device_count, 3);
        assert!(job.finished_at.is_some());
        assert_eq!(orch.latest_devices().expect("latest set").len(), 3);
    }

    #[tokio::test]
    async fn empty_scan_completes_with_zero_devices() {
        let orch = orchestrator(vec![], None);
        let mut sub = orch.publisher().subscribe();
        let ticket = orch.start_scan("10.0.0.0/30");

        match next_event(&mut sub).await.as_ref() {
            EngineEvent::ScanComplete { total_devices, .. } => assert_eq!(*total_devices, 0),
            other => panic!("expected completion, got {:?}", other),
        }
        let job = orch
            .wait_until_finished(&ticket.scan_id)
            .await
            .expect("job should exist");
        assert_eq!(job.status, ScanStatus::Complete);
        assert!(orch.latest_devices().expect("empty set is still a result").is_empty());
    }

    #[tokio::test]
    async fn invalid_target_fails_the_job() {
        let orch = orchestrator(vec![device(1)], None);
        let mut sub = orch.publisher().subscribe();
        let ticket = orch.start_scan("10.0.0.0/99");

        match next_event(&mut sub).await.as_ref() {
            EngineEvent::ScanFailed { scan_id, reason } => {
                assert_eq!(scan_id, &ticket.scan_id);
                assert!(reason.contains("10.0.0.0/99"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        let job = orch.status(&ticket.scan_id).expect("job should exist");
        assert_eq!(job.status, ScanStatus::Failed);
        assert!(orch.latest_devices().is_none());
    }

    #[tokio::test]
    async fn cancel_stops_further_events() {
        let gate = Arc::new(Notify::new());
        let orch = orchestrator(vec![device(1), device(2), device(3)], Some(Arc::clone(&gate)));
        let mut sub = orch.publisher().subscribe();
        let ticket = orch.start_scan("10.0.0.0/29");

        match next_event(&mut sub).await.as_ref() {
            EngineEvent::DeviceNew(d) => assert_eq!(d.ip, device(1).ip),
            other => panic!("expected first device, got {:?}", other),
        }

        assert!(orch.cancel(&ticket.scan_id));
        assert!(!orch.cancel(&ticket.scan_id));
        gate.notify_one();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(sub.try_recv().is_none());

        let job = orch.status(&ticket.scan_id).expect("job should exist");
        assert_eq!(job.status, ScanStatus::Failed);
        assert_eq!(job.error.as_deref(), Some(CANCELLED_REASON));
        let kept = orch.devices(&ticket.scan_id).expect("devices should exist");
        assert_eq!(kept.len(), 1);
    }

    #[tokio::test]
    async fn unknown_scan_queries_are_empty() {
        let orch = orchestrator(vec![], None);
        let missing = ScanId::from("no-such-scan");
        assert!(orch.status(&missing).is_none());
        assert!(orch.devices(&missing).is_none());
        assert!(!orch.cancel(&missing));
    }

    #[tokio::test]
    async fn finished_jobs_beyond_retention_are_evicted() {
        let orch = orchestrator(vec![device(1)], None).with_job_retention(2);

        let mut ids = Vec::new();
        for _ in 0..4 {
            let ticket = orch.start_scan("10.0.0.0/29");
            orch.wait_until_finished(&ticket.scan_id)
                .await
                .expect("scan should finish");
            ids.push(ticket.scan_id);
        }

        let kept: Vec<ScanId> = orch.jobs().into_iter().map(|job| job.scan_id).collect();
        assert_eq!(kept, vec![ids[2].clone(), ids[3].clone()]);
        assert!(orch.status(&ids[0]).is_none());
        assert_eq!(orch.latest_devices().expect("latest scan kept").len(), 1);
    }

    #[tokio::test]
    async fn forget_drops_only_finished_jobs() {
        let gate = Arc::new(Notify::new());
        let orch = orchestrator(vec![device(1), device(2)], Some(Arc::clone(&gate)));
        let mut sub = orch.publisher().subscribe();
        let ticket = orch.start_scan("10.0.0.0/29");
        next_event(&mut sub).await;

        assert!(!orch.forget(&ticket.scan_id), "running job should be kept");

        gate.notify_one();
        orch.wait_until_finished(&ticket.scan_id)
            .await
            .expect("scan should finish");
        assert!(orch.forget(&ticket.scan_id));
        assert!(orch.status(&ticket.scan_id).is_none());
        assert!(orch.latest_devices().is_none());
        assert!(!orch.forget(&ticket.scan_id));
    }
}
