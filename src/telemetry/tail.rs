//! Incremental follower for a growing IDS log
//!
//! Keeps a byte offset so each poll parses only what was appended since the last one. A file
//! that shrinks below the offset is treated as rotated and re-read from the start.

use std::io::{ErrorKind, SeekFrom};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::telemetry::eve::{parse_line, EveRecord};
use crate::telemetry::ingest::MalformedRecord;

/// Records and parse failures from one poll
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TailBatch {
    pub records: Vec<EveRecord>,
    pub malformed: Vec<MalformedRecord>,
}

#[derive(Debug)]
pub struct EveTail {
    path: PathBuf,
    offset: u64,
    /// Newline-terminated lines consumed so far, blank ones included, so malformed line
    /// numbers agree with [`crate::telemetry::EveLogReader`]
    line_no: usize,
    /// Bytes of a line whose newline has not been written yet
    partial: Vec<u8>,
}

impl EveTail {
    /// Follow `path` from its beginning.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            line_no: 0,
            partial: Vec::new(),
        }
    }

    /// Follow `path` from its current end, ignoring existing content.
    ///
    /// Existing lines are counted (not parsed) so later line numbers stay absolute.
    pub async fn from_end(path: impl Into<PathBuf>) -> Self {
        let mut tail = Self::new(path);
        let Ok(file) = File::open(&tail.path).await else {
            return tail;
        };

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    tail.offset += n as u64;
                    if buf.last() == Some(&b'\n') {
                        tail.line_no += 1;
                    }
                }
                Err(e) => {
                    crate::log_warn!(
                        "[INGEST] Could not skip existing content of {}: {}",
                        tail.path.display(),
                        e
                    );
                    break;
                }
            }
        }
        tail
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Parse everything appended since the previous poll.
    ///
    /// A missing file is an empty batch; the follower picks it up once it appears.
    pub async fn poll(&mut self) -> std::io::Result<TailBatch> {
        let mut file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(TailBatch::default()),
            Err(e) => return Err(e),
        };

        let len = file.metadata().await?.len();
        if len < self.offset {
            crate::log_stderr!(
                "[INGEST] {} shrank from {} to {} bytes, re-reading from start",
                self.path.display(),
                self.offset,
                len
            );
            self.offset = 0;
            self.line_no = 0;
            self.partial.clear();
        }
        if len == self.offset {
            return Ok(TailBatch::default());
        }

        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut appended = Vec::with_capacity((len - self.offset) as usize);
        let read = file.read_to_end(&mut appended).await?;
        self.offset += read as u64;
        self.partial.extend_from_slice(&appended);

        let mut batch = TailBatch::default();
        let complete_upto = match self.partial.iter().rposition(|b| *b == b'\n') {
            Some(pos) => pos + 1,
            None => return Ok(batch),
        };
        let complete: Vec<u8> = self.partial.drain(..complete_upto).collect();

        // drop the final newline so every segment is exactly one line
        for raw in complete[..complete.len() - 1].split(|b| *b == b'\n') {
            self.line_no += 1;
            if raw.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let parsed = match std::str::from_utf8(raw) {
                Ok(line) => parse_line(line),
                Err(e) => Err(format!("invalid UTF-8: {}", e)),
            };
            match parsed {
                Ok(Some(record)) => batch.records.push(record),
                Ok(None) => {}
                Err(reason) => {
                    crate::log_warn!(
                        "[INGEST] Skipping malformed line {} of {}: {}",
                        self.line_no,
                        self.path.display(),
                        reason
                    );
                    batch.malformed.push(MalformedRecord {
                        line: self.line_no,
                        reason,
                    });
                }
            }
        }

        Ok(batch)
    }

    /// Poll every `interval` and forward records until `cancel` fires or the receiver goes away.
    pub async fn follow(
        mut self,
        interval: Duration,
        sink: mpsc::Sender<EveRecord>,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let batch = match self.poll().await {
                Ok(batch) => batch,
                Err(e) => {
                    crate::log_warn!("[INGEST] Tail poll of {} failed: {}", self.path.display(), e);
                    continue;
                }
            };

            for record in batch.records {
                if sink.send(record).await.is_err() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};
    use tokio::io::AsyncWriteExt;

    const ALERT: &str = r#"{"event_type":"alert","alert":{"severity":3,"signature":"s"}}"#;
    const FLOW: &str = r#"{"event_type":"flow","flow":{"src_ip":"10.0.0.2"}}"#;

    fn unique_temp_log(prefix: &str) -> PathBuf {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("{}_{}.json", prefix, timestamp))
    }

    async fn append(path: &PathBuf, text: &str) {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .expect("log should open for append");
        file.write_all(text.as_bytes())
            .await
            .expect("append should succeed");
        file.flush().await.expect("flush should succeed");
    }

    #[tokio::test]
    async fn poll_returns_only_new_complete_lines() {
        let path = unique_temp_log("netcert_tail");
        let mut tail = EveTail::new(&path);

        assert!(tail.poll().await.expect("missing file is fine").records.is_empty());

        append(&path, &format!("{}\n{}", ALERT, &FLOW[..10])).await;
        let first = tail.poll().await.expect("poll should succeed");
        assert_eq!(first.records.len(), 1);

        append(&path, &format!("{}\n", &FLOW[10..])).await;
        let second = tail.poll().await.expect("poll should succeed");
        assert_eq!(second.records.len(), 1);
        assert!(matches!(second.records[0], EveRecord::Flow(_)));

        assert!(tail.poll().await.expect("poll should succeed").records.is_empty());
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn truncation_restarts_from_beginning() {
        let path = unique_temp_log("netcert_tail_rotate");
        append(&path, &format!("{}\n{}\n{}\n", ALERT, ALERT, ALERT)).await;

        let mut tail = EveTail::new(&path);
        assert_eq!(tail.poll().await.expect("poll").records.len(), 3);

        tokio::fs::write(&path, format!("{}\n", FLOW))
            .await
            .expect("rewrite should succeed");
        let batch = tail.poll().await.expect("poll after rotation");
        assert_eq!(batch.records.len(), 1);
        assert!(matches!(batch.records[0], EveRecord::Flow(_)));
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn malformed_appended_line_is_collected() {
        let path = unique_temp_log("netcert_tail_bad");
        append(&path, &format!("{}\nnot json\n{}\n", ALERT, FLOW)).await;

        let mut tail = EveTail::new(&path);
        let batch = tail.poll().await.expect("poll should succeed");
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.malformed.len(), 1);
        assert_eq!(batch.malformed[0].line, 2);
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn blank_lines_count_toward_line_numbers() {
        let path = unique_temp_log("netcert_tail_blank");
        append(&path, &format!("{}\n\nnot json\n", ALERT)).await;

        let mut tail = EveTail::new(&path);
        let batch = tail.poll().await.expect("poll should succeed");
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.malformed.len(), 1);
        assert_eq!(batch.malformed[0].line, 3);

        let reader = crate::telemetry::EveLogReader::new(&path);
        let report = reader.alerts_report(0).await;
        assert_eq!(report.malformed[0].line, batch.malformed[0].line);
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn from_end_keeps_absolute_line_numbers() {
        let path = unique_temp_log("netcert_tail_end_lines");
        append(&path, &format!("{}\n\n", ALERT)).await;

        let mut tail = EveTail::from_end(&path).await;
        append(&path, "not json\n").await;
        let batch = tail.poll().await.expect("poll should succeed");
        assert!(batch.records.is_empty());
        assert_eq!(batch.malformed.len(), 1);
        assert_eq!(batch.malformed[0].line, 3);
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn from_end_skips_existing_content() {
        let path = unique_temp_log("netcert_tail_end");
        append(&path, &format!("{}\n", ALERT)).await;

        let mut tail = EveTail::from_end(&path).await;
        assert!(tail.poll().await.expect("poll").records.is_empty());

        append(&path, &format!("{}\n", FLOW)).await;
        assert_eq!(tail.poll().await.expect("poll").records.len(), 1);
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn follow_forwards_until_cancelled() {
        let path = unique_temp_log("netcert_tail_follow");
        append(&path, &format!("{}\n", ALERT)).await;

        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(EveTail::new(&path).follow(
            Duration::from_millis(20),
            tx,
            cancel.clone(),
        ));

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("record should arrive")
            .expect("channel should be open");
        assert!(matches!(first, EveRecord::Alert(_)));

        cancel.cancel();
        handle.await.expect("follow task should stop cleanly");
        let _ = tokio::fs::remove_file(&path).await;
    }
}
