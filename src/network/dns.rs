//! Reverse DNS resolution for discovered hosts

use dns_lookup::lookup_addr;
use std::net::IpAddr;
use std::time::Duration;

/// Reverse lookups are blocking; anything slower than this is treated as no answer
const DNS_TIMEOUT: Duration = Duration::from_millis(2000);

/// Blocking PTR lookup. Answers that merely echo the address back are discarded.
pub fn reverse_lookup(ip: IpAddr) -> Option<String> {
    match lookup_addr(&ip) {
        Ok(hostname) if hostname != ip.to_string() && !hostname.is_empty() => Some(hostname),
        _ => None,
    }
}

/// Resolve the hostnames of one host without blocking the runtime.
///
/// Returns an empty list on timeout or lookup failure.
pub async fn lookup_hostnames(ip: IpAddr) -> Vec<String> {
    let lookup = tokio::time::timeout(
        DNS_TIMEOUT,
        tokio::task::spawn_blocking(move || reverse_lookup(ip)),
    )
    .await;

    match lookup {
        Ok(Ok(Some(hostname))) => vec![hostname],
        Ok(Ok(None)) | Err(_) => Vec::new(),
        Ok(Err(e)) => {
            crate::log_warn!("DNS worker join failed for {}: {}", ip, e);
            Vec::new()
        }
    }
}
