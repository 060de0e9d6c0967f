//! Security scoring and vulnerability lookup

mod certificate;
mod vulnerabilities;

pub use certificate::{grade_for, score_devices, Grade, SecurityCertificate};
pub use vulnerabilities::{NoVulnerabilities, StaticCveCatalog, Vulnerability, VulnerabilitySource};
