//! Scanner module - ICMP/TCP liveness, HTTP identification, fingerprinting

pub mod fingerprint;
mod http;
mod icmp;
mod prober;
mod tcp;

pub use fingerprint::{
    classify_banner, Classification, FingerprintRule, FINGERPRINT_RULES, LOW_CONFIDENCE,
    MATCH_CONFIDENCE,
};
pub use http::HttpIdentifier;
pub use icmp::IcmpPinger;
pub use prober::{HostDiscovery, HostProber};
pub use tcp::{probe_host_ports, probe_port, PortProbe, PortState};
