//! Scan target parsing and host enumeration

use ipnetwork::Ipv4Network;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use crate::error::{EngineError, EngineResult};

/// A validated IPv4 scan range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    raw: String,
    network: Ipv4Network,
}

impl ScanTarget {
    /// Parse a CIDR block (`192.168.1.0/24`) or a single address (`10.0.0.5`).
    ///
    /// Host bits in a CIDR are masked off, so `10.0.0.5/24` scans `10.0.0.0/24`.
    pub fn parse(raw: &str) -> EngineResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EngineError::invalid_target(raw, "empty network"));
        }

        let parsed = if trimmed.contains('/') {
            let (addr, _) = trimmed.split_once('/').unwrap_or((trimmed, ""));
            if addr.parse::<IpAddr>().is_ok_and(|ip| ip.is_ipv6()) {
                return Err(EngineError::invalid_target(
                    raw,
                    "IPv6 ranges are not supported",
                ));
            }
            trimmed
                .parse::<Ipv4Network>()
                .map_err(|e| EngineError::invalid_target(raw, e.to_string()))?
        } else {
            match trimmed.parse::<IpAddr>() {
                Ok(IpAddr::V4(ip)) => Ipv4Network::new(ip, 32)
                    .map_err(|e| EngineError::invalid_target(raw, e.to_string()))?,
                Ok(IpAddr::V6(_)) => {
                    return Err(EngineError::invalid_target(
                        raw,
                        "IPv6 targets are not supported",
                    ));
                }
                Err(e) => return Err(EngineError::invalid_target(raw, e.to_string())),
            }
        };

        let network = Ipv4Network::new(parsed.network(), parsed.prefix())
            .map_err(|e| EngineError::invalid_target(raw, e.to_string()))?;

        Ok(Self {
            raw: trimmed.to_string(),
            network,
        })
    }

    /// The normalized network this target covers
    pub fn network(&self) -> Ipv4Network {
        self.network
    }

    /// The target exactly as the caller supplied it (trimmed)
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Host addresses to probe, in ascending order, capped at `max_hosts`.
    ///
    /// Network and broadcast addresses are skipped unless the prefix is /31 or /32,
    /// where every address is a host.
    pub fn hosts(&self, max_hosts: usize) -> Vec<Ipv4Addr> {
        let skip_special = self.network.prefix() < 31;
        let mut hosts: Vec<Ipv4Addr> = self
            .network
            .iter()
            .filter(|ip| !skip_special || !is_special_address(*ip, &self.network))
            .take(max_hosts.saturating_add(1))
            .collect();

        if hosts.len() > max_hosts {
            crate::log_warn!(
                "[SCAN] Target {} exceeds the {}-host cap, scanning the first {} hosts only",
                self.network,
                max_hosts,
                max_hosts
            );
            hosts.truncate(max_hosts);
        }

        hosts
    }
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.network)
    }
}

/// Checks if an IP address is the network or broadcast address of `subnet`
pub fn is_special_address(ip: Ipv4Addr, subnet: &Ipv4Network) -> bool {
    ip == subnet.network() || ip == subnet.broadcast()
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod target_tests;
