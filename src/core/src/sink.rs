//! Append-only log sinks, one per job category.
//!
//! Each sink is a plain text file under the configured log directory, named
//! `<category>_log.txt`. Lines are timestamp-prefixed and human-readable;
//! files are opened in append mode and never truncated. Rotation is an
//! external concern.

use chrono::Local;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::Result;

/// Timestamp prefix for regular sink lines.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Separator rule appended after report blocks.
const RULE: &str = "------------------------------------------------------------";

/// An append-only, timestamped log destination for one job category.
#[derive(Debug, Clone)]
pub struct LogSink {
    category: String,
    path: PathBuf,
}

impl LogSink {
    /// Create a sink for `category` under `log_dir`.
    pub fn new(log_dir: &Path, category: &str) -> Self {
        Self {
            category: category.to_string(),
            path: log_dir.join(format!("{}_log.txt", category)),
        }
    }

    /// The job category this sink belongs to.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// The file this sink appends to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        Ok(())
    }

    /// Append one informational event line.
    pub async fn info(&self, message: &str) -> Result<()> {
        let ts = Local::now().format(TIMESTAMP_FORMAT);
        self.write_line(&format!("{} - INFO - {}", ts, message)).await
    }

    /// Append one error event line.
    pub async fn error(&self, message: &str) -> Result<()> {
        let ts = Local::now().format(TIMESTAMP_FORMAT);
        self.write_line(&format!("{} - ERROR - {}", ts, message)).await
    }

    /// Append a line verbatim, for jobs with their own line format
    /// (the heartbeat's `DD/MM/YYYY-HH:MM:SS CRM is alive` liveness line).
    pub async fn raw(&self, line: &str) -> Result<()> {
        self.write_line(line).await
    }

    /// Append a horizontal rule, closing a report block.
    pub async fn rule(&self) -> Result<()> {
        self.write_line(RULE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_never_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::new(dir.path(), "test");

        sink.info("first run").await.unwrap();
        // Re-creating the sink must not lose prior lines
        let sink = LogSink::new(dir.path(), "test");
        sink.info("second run").await.unwrap();

        let contents = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("INFO - first run"));
        assert!(lines[1].contains("INFO - second run"));
    }

    #[tokio::test]
    async fn test_line_format() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::new(dir.path(), "format");
        sink.error("item 3 failed").await.unwrap();

        let contents = std::fs::read_to_string(sink.path()).unwrap();
        let line = contents.lines().next().unwrap();
        // "YYYY-MM-DD HH:MM:SS - ERROR - item 3 failed"
        assert_eq!(&line[4..5], "-");
        assert!(line.contains(" - ERROR - item 3 failed"));
    }

    #[tokio::test]
    async fn test_category_file_naming() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::new(dir.path(), "order_reminders");
        assert!(sink
            .path()
            .ends_with("order_reminders_log.txt"));
        assert_eq!(sink.category(), "order_reminders");
    }

    #[tokio::test]
    async fn test_raw_and_rule() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::new(dir.path(), "raw");
        sink.raw("25/08/2026-14:00:00 CRM is alive").await.unwrap();
        sink.rule().await.unwrap();

        let contents = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "25/08/2026-14:00:00 CRM is alive");
        assert!(lines[1].chars().all(|c| c == '-'));
    }
}
