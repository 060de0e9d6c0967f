//! Known-vulnerability lookup
//!
//! The engine treats lookup as a black box from `(ip, firmware)` to a list of findings. The
//! built-in catalogue is a small offline list matched on vendor keywords in the firmware string.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub cve_id: String,
    pub vendor: String,
    pub description: String,
    /// CRITICAL, HIGH, MEDIUM or LOW
    pub severity: String,
    pub cvss_score: Option<f32>,
}

pub trait VulnerabilitySource: Send + Sync {
    fn lookup(&self, ip: IpAddr, firmware: &str) -> Vec<Vulnerability>;
}

/// Source that never reports anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVulnerabilities;

impl VulnerabilitySource for NoVulnerabilities {
    fn lookup(&self, _ip: IpAddr, _firmware: &str) -> Vec<Vulnerability> {
        Vec::new()
    }
}

struct CatalogEntry {
    keyword: &'static str,
    vendor: &'static str,
    cve_id: &'static str,
    description: &'static str,
    severity: &'static str,
    cvss_score: f32,
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        keyword: "tp-link",
        vendor: "TP-Link",
        cve_id: "CVE-2023-1389",
        description: "Command injection in the Archer AX21 web management interface",
        severity: "CRITICAL",
        cvss_score: 9.8,
    },
    CatalogEntry {
        keyword: "tp-link",
        vendor: "TP-Link",
        cve_id: "CVE-2022-30075",
        description: "Authenticated remote code execution via backup restore",
        severity: "HIGH",
        cvss_score: 8.8,
    },
    CatalogEntry {
        keyword: "cisco",
        vendor: "Cisco",
        cve_id: "CVE-2023-20198",
        description: "Privilege escalation in the IOS XE web UI",
        severity: "CRITICAL",
        cvss_score: 10.0,
    },
    CatalogEntry {
        keyword: "hp",
        vendor: "HP",
        cve_id: "CVE-2021-39238",
        description: "Buffer overflow in font parsing on LaserJet printers",
        severity: "CRITICAL",
        cvss_score: 9.3,
    },
    CatalogEntry {
        keyword: "canon",
        vendor: "Canon",
        cve_id: "CVE-2022-24673",
        description: "Stack buffer overflow in the SLP service of office printers",
        severity: "CRITICAL",
        cvss_score: 9.8,
    },
    CatalogEntry {
        keyword: "mikrotik",
        vendor: "MikroTik",
        cve_id: "CVE-2018-14847",
        description: "Unauthenticated arbitrary file read via WinBox",
        severity: "CRITICAL",
        cvss_score: 9.1,
    },
    CatalogEntry {
        keyword: "d-link",
        vendor: "D-Link",
        cve_id: "CVE-2022-37056",
        description: "Hard-coded credentials in multiple router models",
        severity: "HIGH",
        cvss_score: 8.8,
    },
    CatalogEntry {
        keyword: "netgear",
        vendor: "Netgear",
        cve_id: "CVE-2023-27357",
        description: "Stack-based buffer overflow in UPnP service",
        severity: "CRITICAL",
        cvss_score: 9.8,
    },
    CatalogEntry {
        keyword: "boa",
        vendor: "Boa",
        cve_id: "CVE-2017-9833",
        description: "Arbitrary file read in the Boa embedded web server",
        severity: "HIGH",
        cvss_score: 7.5,
    },
];

/// Offline catalogue keyed on vendor keyword
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCveCatalog;

impl StaticCveCatalog {
    pub fn new() -> Self {
        Self
    }

    pub fn len(&self) -> usize {
        CATALOG.len()
    }

    pub fn is_empty(&self) -> bool {
        CATALOG.is_empty()
    }
}

impl VulnerabilitySource for StaticCveCatalog {
    fn lookup(&self, _ip: IpAddr, firmware: &str) -> Vec<Vulnerability> {
        let firmware = firmware.trim().to_lowercase();
        if firmware.is_empty() || firmware == "unknown" {
            return Vec::new();
        }

        CATALOG
            .iter()
            .filter(|entry| keyword_matches(&firmware, entry.keyword))
            .map(|entry| Vulnerability {
                cve_id: entry.cve_id.to_string(),
                vendor: entry.vendor.to_string(),
                description: entry.description.to_string(),
                severity: entry.severity.to_string(),
                cvss_score: Some(entry.cvss_score),
            })
            .collect()
    }
}

/// Whole-word match so "hp" does not hit "php".
fn keyword_matches(haystack: &str, keyword: &str) -> bool {
    haystack
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .any(|word| word == keyword)
}
