//! TCP connect probing for port enumeration and fallback liveness

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinSet;

use crate::error::{EngineError, EngineResult};

/// Outcome of a single connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Open,
    /// RST received: nothing listening, but the host itself answered
    Refused,
    /// Timeout or unreachable: no signal
    Silent,
}

impl PortState {
    /// Classify a connect outcome. Timeouts and unreachable routes carry no signal.
    pub fn from_connect(outcome: &EngineResult<()>) -> Self {
        match outcome {
            Ok(()) => Self::Open,
            Err(EngineError::Io(e)) if e.kind() == ErrorKind::ConnectionRefused => Self::Refused,
            Err(_) => Self::Silent,
        }
    }
}

/// Ports that accepted a connection, plus whether the host answered at all
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortProbe {
    pub open_ports: Vec<u16>,
    pub host_answered: bool,
}

/// Connect to `addr`, mapping an expired timeout to [`EngineError::ProbeTimeout`].
pub async fn connect_with_timeout(addr: SocketAddr, timeout: Duration) -> EngineResult<TcpStream> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(connected) => Ok(connected?),
        Err(_) => Err(EngineError::ProbeTimeout {
            target: addr.to_string(),
        }),
    }
}

/// Connect to one port with a timeout
pub async fn probe_port(ip: IpAddr, port: u16, timeout: Duration) -> PortState {
    let outcome = connect_with_timeout(SocketAddr::new(ip, port), timeout)
        .await
        .map(|_| ());
    if let Err(e @ EngineError::ProbeTimeout { .. }) = &outcome {
        crate::log_debug!("[SCAN] {}", e);
    }
    PortState::from_connect(&outcome)
}

/// Probe all `ports` on one host concurrently. Open ports come back sorted.
pub async fn probe_host_ports(ip: IpAddr, ports: &[u16], timeout: Duration) -> PortProbe {
    let mut tasks = JoinSet::new();
    for &port in ports {
        tasks.spawn(async move { (port, probe_port(ip, port, timeout).await) });
    }

    let mut probe = PortProbe::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((port, PortState::Open)) => {
                probe.open_ports.push(port);
                probe.host_answered = true;
            }
            Ok((_, PortState::Refused)) => probe.host_answered = true,
            Ok((_, PortState::Silent)) => {}
            Err(e) => {
                crate::log_warn!("TCP probe task failed for {}: {}", ip, e);
            }
        }
    }

    probe.open_ports.sort_unstable();
    probe
}
