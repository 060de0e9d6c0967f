//! Network security certificate
//!
//! Scores a device set out of 100 and maps the score to a letter grade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Device;

const STARTING_SCORE: i32 = 100;
const UNKNOWN_DEVICE_PENALTY: i32 = 5;
const EXCESSIVE_PORTS_PENALTY: i32 = 2;
const VULNERABILITY_PENALTY: i32 = 5;
/// A device with more open ports than this is flagged
const MAX_EXPECTED_OPEN_PORTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    F,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::F => "F",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a score to its grade. Thresholds are inclusive lower bounds.
pub fn grade_for(score: u8) -> Grade {
    match score {
        90..=u8::MAX => Grade::APlus,
        80..=89 => Grade::A,
        70..=79 => Grade::B,
        60..=69 => Grade::C,
        _ => Grade::F,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityCertificate {
    pub certificate_id: Uuid,
    pub score: u8,
    pub grade: Grade,
    pub issues: Vec<String>,
    pub device_count: usize,
    pub vuln_count: usize,
    pub issued_at: DateTime<Utc>,
}

/// Score `devices` in the order given.
///
/// Each unidentified device costs 5 points, each device with more than three open ports costs
/// 2, and each known vulnerability costs 5. The result never drops below zero.
pub fn score_devices(devices: &[Device], vuln_count: usize) -> SecurityCertificate {
    let mut score = STARTING_SCORE;
    let mut issues = Vec::new();

    for device in devices {
        if device.is_unknown() {
            score -= UNKNOWN_DEVICE_PENALTY;
            issues.push(format!("Unidentified device at {}", device.ip));
        }
        if device.open_ports.len() > MAX_EXPECTED_OPEN_PORTS {
            score -= EXCESSIVE_PORTS_PENALTY;
            issues.push(format!("Excessive open ports on {}", device.ip));
        }
    }

    if vuln_count > 0 {
        let penalty = i32::try_from(vuln_count)
            .unwrap_or(i32::MAX)
            .saturating_mul(VULNERABILITY_PENALTY);
        score = score.saturating_sub(penalty);
        issues.push(format!("{} known vulnerabilities reported", vuln_count));
    }

    let score = score.clamp(0, STARTING_SCORE) as u8;

    SecurityCertificate {
        certificate_id: Uuid::new_v4(),
        score,
        grade: grade_for(score),
        issues,
        device_count: devices.len(),
        vuln_count,
        issued_at: Utc::now(),
    }
}
