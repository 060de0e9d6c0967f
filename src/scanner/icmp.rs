//! ICMP echo liveness probing

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use surge_ping::{Client, Config, PingIdentifier, PingSequence};

/// Generates a ping identifier that differs between runs
fn rand_id() -> u16 {
    use std::time::SystemTime;
    let duration = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    ((duration.as_nanos() % 0xFFFF) as u16).wrapping_add(1)
}

/// Shared ICMP client. Creating the raw socket needs privileges; when that fails the pinger is
/// inert and callers fall back to TCP liveness.
#[derive(Clone)]
pub struct IcmpPinger {
    client: Option<Arc<Client>>,
    timeout: Duration,
    retries: u8,
}

impl IcmpPinger {
    pub fn new(timeout: Duration, retries: u8) -> Self {
        let client = match Client::new(&Config::default()) {
            Ok(c) => Some(Arc::new(c)),
            Err(e) => {
                crate::log_warn!(
                    "[SCAN] ICMP client unavailable ({}), liveness falls back to TCP connect",
                    e
                );
                None
            }
        };

        Self {
            client,
            timeout,
            retries: retries.max(1),
        }
    }

    /// A pinger that never sends anything
    pub fn disabled() -> Self {
        Self {
            client: None,
            timeout: Duration::ZERO,
            retries: 1,
        }
    }

    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }

    /// Round-trip time of the first echo reply, or `None` when every attempt timed out.
    pub async fn ping(&self, ip: Ipv4Addr) -> Option<Duration> {
        let client = self.client.as_ref()?;
        let payload = [0u8; 56];

        for attempt in 0..self.retries {
            let start = Instant::now();
            let reply = client
                .pinger(IpAddr::V4(ip), PingIdentifier(rand_id()))
                .await
                .timeout(self.timeout)
                .ping(PingSequence(attempt as u16), &payload)
                .await;

            if reply.is_ok() {
                return Some(start.elapsed());
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_pinger_reports_no_reply() {
        let pinger = IcmpPinger::disabled();
        assert!(!pinger.is_available());
        assert_eq!(pinger.ping(Ipv4Addr::LOCALHOST).await, None);
    }
}
