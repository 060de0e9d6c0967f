//! Host prober: liveness sweep, port enumeration and service identification
//!
//! Every host runs its own pipeline (ping -> ports -> MAC/DNS -> HTTP identification) under a
//! shared semaphore, so one host can be identified while others are still being pinged.
//! Finished devices are pushed into a channel in completion order.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::config::EngineSettings;
use crate::error::EngineResult;
use crate::models::{Device, DeviceStatus};
use crate::network::{lookup_hostnames, lookup_mac, ScanTarget};
use crate::scanner::http::HttpIdentifier;
use crate::scanner::icmp::IcmpPinger;
use crate::scanner::tcp::probe_host_ports;

/// Source of discovered devices for the scan orchestrator.
///
/// Implementations send each device into `sink` as soon as it is known and return how many
/// were sent. A closed sink means the scan was abandoned and the implementation should stop.
pub trait HostDiscovery: Send + Sync {
    fn discover<'a>(
        &'a self,
        target: &'a ScanTarget,
        sink: mpsc::Sender<Device>,
    ) -> Pin<Box<dyn Future<Output = EngineResult<usize>> + Send + 'a>>;
}

struct ProberInner {
    settings: EngineSettings,
    pinger: IcmpPinger,
    http: HttpIdentifier,
}

/// Concurrent network prober. Cheap to clone.
#[derive(Clone)]
pub struct HostProber {
    inner: Arc<ProberInner>,
}

impl HostProber {
    /// Build a prober with a live ICMP client. Must be called inside a Tokio runtime.
    pub fn new(settings: EngineSettings) -> anyhow::Result<Self> {
        let pinger = IcmpPinger::new(settings.ping_timeout(), settings.ping_retries);
        Self::with_pinger(settings, pinger)
    }

    pub fn with_pinger(settings: EngineSettings, pinger: IcmpPinger) -> anyhow::Result<Self> {
        let http = HttpIdentifier::new(settings.http_probe_ports.clone(), settings.probe_timeout())?;
        Ok(Self {
            inner: Arc::new(ProberInner {
                settings,
                pinger,
                http,
            }),
        })
    }

    /// Sweep `network` and collect every device. Convenience over [`HostDiscovery::discover`].
    pub async fn discover_all(&self, network: &str) -> EngineResult<Vec<Device>> {
        let target = ScanTarget::parse(network)?;
        let (tx, mut rx) = mpsc::channel(64);

        let collector = tokio::spawn(async move {
            let mut devices = Vec::new();
            while let Some(device) = rx.recv().await {
                devices.push(device);
            }
            devices
        });

        self.discover_into(&target, tx).await?;
        Ok(collector.await.unwrap_or_default())
    }

    /// Identify one host by HTTP probing, returning it as a live device.
    pub async fn identify(&self, ip: IpAddr, candidate_ports: &[u16]) -> Device {
        let mut device =
            Device::new(ip, DeviceStatus::Up).with_ports(candidate_ports.iter().copied());
        let identification = self.inner.http.identify(ip, candidate_ports).await;
        device.apply_identification(identification);
        device
    }

    async fn discover_into(
        &self,
        target: &ScanTarget,
        sink: mpsc::Sender<Device>,
    ) -> EngineResult<usize> {
        let settings = &self.inner.settings;
        let hosts = target.hosts(settings.max_scan_hosts);

        crate::log_stderr!(
            "[SCAN] Probing {} hosts in {} (concurrency {}, ICMP {})",
            hosts.len(),
            target,
            settings.max_concurrent_probes,
            if self.inner.pinger.is_available() {
                "on"
            } else {
                "off"
            }
        );

        let semaphore = Arc::new(Semaphore::new(settings.max_concurrent_probes.max(1)));
        let mut tasks = JoinSet::new();

        for ip in hosts {
            let semaphore = Arc::clone(&semaphore);
            let inner = Arc::clone(&self.inner);
            let sink = sink.clone();

            tasks.spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        crate::log_warn!("Probe semaphore acquire failed for {}: {}", ip, e);
                        return false;
                    }
                };

                if sink.is_closed() {
                    return false;
                }

                match inner.probe_host(ip).await {
                    Some(device) => sink.send(device).await.is_ok(),
                    None => false,
                }
            });
        }
        drop(sink);

        let mut sent = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => sent += 1,
                Ok(false) => {}
                Err(e) => {
                    crate::log_warn!("Host probe task failed: {}", e);
                }
            }
        }

        crate::log_stderr!("[SCAN] Probing of {} finished: {} devices reported", target, sent);
        Ok(sent)
    }
}

impl ProberInner {
    async fn probe_host(&self, ip: Ipv4Addr) -> Option<Device> {
        let addr = IpAddr::V4(ip);
        let icmp_reply = self.pinger.ping(ip).await;
        let ports = probe_host_ports(
            addr,
            &self.settings.discovery_ports,
            self.settings.tcp_connect_timeout(),
        )
        .await;

        if icmp_reply.is_none() && !ports.host_answered {
            return self
                .settings
                .report_down_hosts
                .then(|| Device::new(addr, DeviceStatus::Down));
        }

        let mut device =
            Device::new(addr, DeviceStatus::Up).with_ports(ports.open_ports.iter().copied());

        let (mac, hostnames) = tokio::join!(
            lookup_mac(ip, &self.settings.network_interface),
            lookup_hostnames(addr)
        );
        device.mac = mac;
        device.hostnames = hostnames;

        let identification = self.http.identify(addr, &ports.open_ports).await;
        device.apply_identification(identification);

        crate::log_debug!(
            "[SCAN] {} up: ports={:?} type={} firmware={}",
            ip,
            device.open_ports,
            device.device_type,
            device.firmware
        );

        Some(device)
    }
}

impl HostDiscovery for HostProber {
    fn discover<'a>(
        &'a self,
        target: &'a ScanTarget,
        sink: mpsc::Sender<Device>,
    ) -> Pin<Box<dyn Future<Output = EngineResult<usize>> + Send + 'a>> {
        Box::pin(self.discover_into(target, sink))
    }
}
