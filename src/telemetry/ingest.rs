//! Streaming queries over the IDS event log
//!
//! Every query makes one pass over the file, applying its filter line by line, so memory is
//! bounded by the number of matching records rather than by log size.

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::EngineError;
use crate::telemetry::eve::{parse_line, Alert, EveRecord, Flow};

/// A line that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedRecord {
    /// 1-based line number
    pub line: usize,
    pub reason: String,
}

impl From<MalformedRecord> for EngineError {
    fn from(record: MalformedRecord) -> Self {
        EngineError::MalformedLogRecord {
            line: record.line,
            reason: record.reason,
        }
    }
}

/// Records selected by one pass plus whatever was skipped as malformed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport<T> {
    pub records: Vec<T>,
    pub malformed: Vec<MalformedRecord>,
    pub lines_read: usize,
}

impl<T> Default for IngestReport<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            malformed: Vec::new(),
            lines_read: 0,
        }
    }
}

/// Reader for a Suricata EVE JSON log
#[derive(Debug, Clone)]
pub struct EveLogReader {
    path: PathBuf,
}

impl EveLogReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Alerts with `severity >= min_severity`, in log order.
    pub async fn alerts(&self, min_severity: i64) -> Vec<Alert> {
        self.alerts_report(min_severity).await.records
    }

    pub async fn alerts_report(&self, min_severity: i64) -> IngestReport<Alert> {
        self.scan(|record| match record {
            EveRecord::Alert(alert) if alert.severity >= min_severity => Some(alert),
            _ => None,
        })
        .await
    }

    /// Flows, optionally only those whose source is `src_ip`, in log order.
    pub async fn flows(&self, src_ip: Option<IpAddr>) -> Vec<Flow> {
        self.flows_report(src_ip).await.records
    }

    pub async fn flows_report(&self, src_ip: Option<IpAddr>) -> IngestReport<Flow> {
        self.scan(|record| match record {
            EveRecord::Flow(flow) if src_ip.is_none() || flow.src_ip == src_ip => Some(flow),
            _ => None,
        })
        .await
    }

    /// One pass over the log keeping the records `select` maps to `Some`.
    ///
    /// A missing or unreadable log yields an empty report. Malformed lines, including
    /// non-UTF-8 ones, are logged and collected; reading continues with the next line.
    pub async fn scan<T, F>(&self, mut select: F) -> IngestReport<T>
    where
        F: FnMut(EveRecord) -> Option<T>,
    {
        let mut report = IngestReport::default();

        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) => {
                let err = EngineError::LogUnavailable {
                    path: self.path.clone(),
                    source: e,
                };
                if matches!(&err, EngineError::LogUnavailable { source, .. } if source.kind() == ErrorKind::NotFound)
                {
                    crate::log_debug!("[INGEST] {}", err);
                } else {
                    crate::log_warn!("[INGEST] {}", err);
                }
                return report;
            }
        };

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    crate::log_warn!(
                        "[INGEST] Read of {} stopped after line {}: {}",
                        self.path.display(),
                        report.lines_read,
                        e
                    );
                    break;
                }
            }
            report.lines_read += 1;
            let line_no = report.lines_read;

            let parsed = match std::str::from_utf8(&buf) {
                Ok(line) => parse_line(line),
                Err(e) => Err(format!("invalid UTF-8: {}", e)),
            };

            match parsed {
                Ok(Some(record)) => {
                    if let Some(selected) = select(record) {
                        report.records.push(selected);
                    }
                }
                Ok(None) => {}
                Err(reason) => {
                    let malformed = MalformedRecord {
                        line: line_no,
                        reason,
                    };
                    crate::log_warn!(
                        "[INGEST] {} in {}",
                        EngineError::from(malformed.clone()),
                        self.path.display()
                    );
                    report.malformed.push(malformed);
                }
            }
        }

        report
    }
}
