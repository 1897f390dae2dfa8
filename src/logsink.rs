//! Append-only text log bucketed by 15-minute slot.
//!
//! Lines are handed to a background writer task and appended to
//! `<log_dir>/<slot key>.log`. Recording never blocks the tick and write
//! errors are reported through `tracing` without retry.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::market::MarketSlotKey;

/// Fire-and-forget line sink.
pub trait LogSink: Send + Sync {
    /// Record `line` observed at `at`.
    fn record(&self, at: DateTime<Utc>, line: String);
}

/// Format one log line: millisecond UTC timestamp, then the message.
pub fn format_line(at: DateTime<Utc>, line: &str) -> String {
    format!("{} {}\n", at.format("%Y-%m-%dT%H:%M:%S%.3fZ"), line)
}

struct Entry {
    at: DateTime<Utc>,
    line: String,
}

/// Writes lines to per-slot files from a background task.
#[derive(Debug)]
pub struct FileLogSink {
    tx: mpsc::UnboundedSender<Entry>,
}

impl FileLogSink {
    /// Spawn the writer task. Dropping every sink handle ends the task once
    /// queued lines are flushed.
    pub fn spawn(log_dir: impl Into<PathBuf>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(log_dir.into(), rx));
        (Self { tx }, handle)
    }
}

impl LogSink for FileLogSink {
    fn record(&self, at: DateTime<Utc>, line: String) {
        if self.tx.send(Entry { at, line }).is_err() {
            warn!("Log writer stopped, dropping line");
        }
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry").field("at", &self.at).finish()
    }
}

async fn run_writer(log_dir: PathBuf, mut rx: mpsc::UnboundedReceiver<Entry>) {
    if let Err(e) = tokio::fs::create_dir_all(&log_dir).await {
        warn!(dir = %log_dir.display(), error = %e, "Failed to create log directory");
    }

    while let Some(entry) = rx.recv().await {
        let path = slot_path(&log_dir, entry.at);
        if let Err(e) = append(&path, &format_line(entry.at, &entry.line)).await {
            warn!(path = %path.display(), error = %e, "Failed to append log line");
        }
    }

    debug!("Log writer finished");
}

/// File a line observed at `at` belongs to.
pub fn slot_path(log_dir: &Path, at: DateTime<Utc>) -> PathBuf {
    log_dir.join(format!("{}.log", MarketSlotKey::from_time(at)))
}

async fn append(path: &Path, text: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(text.as_bytes()).await?;
    file.flush().await
}

/// In-memory sink.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines recorded so far, without timestamps.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl LogSink for MemoryLogSink {
    fn record(&self, _at: DateTime<Utc>, line: String) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, h, m, s).unwrap()
    }

    #[test]
    fn line_format_has_millisecond_timestamp() {
        let line = format_line(at(12, 0, 1), "hello");
        assert_eq!(line, "2025-01-01T12:00:01.000Z hello\n");
    }

    #[test]
    fn path_is_bucketed_by_slot() {
        let dir = Path::new("logs");
        assert_eq!(slot_path(dir, at(12, 14, 59)), dir.join("2025-01-01_12-00.log"));
        assert_eq!(slot_path(dir, at(12, 15, 0)), dir.join("2025-01-01_12-15.log"));
    }

    #[tokio::test]
    async fn file_sink_appends_to_slot_files() {
        let dir = std::env::temp_dir().join(format!("dva-logsink-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let (sink, handle) = FileLogSink::spawn(&dir);
        sink.record(at(12, 1, 0), "first".to_string());
        sink.record(at(12, 2, 0), "second".to_string());
        sink.record(at(12, 16, 0), "next slot".to_string());
        drop(sink);
        handle.await.unwrap();

        let first = std::fs::read_to_string(dir.join("2025-01-01_12-00.log")).unwrap();
        assert_eq!(first.lines().count(), 2);
        assert!(first.ends_with("second\n"));

        let next = std::fs::read_to_string(dir.join("2025-01-01_12-15.log")).unwrap();
        assert!(next.contains("next slot"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn memory_sink_collects_lines() {
        let sink = MemoryLogSink::new();
        sink.record(Utc::now(), "a".to_string());
        sink.record(Utc::now(), "b".to_string());
        assert_eq!(sink.lines(), vec!["a".to_string(), "b".to_string()]);
    }
}
