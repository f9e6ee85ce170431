//! Markdown daily log: `<dir>/YYYY-MM-DD.md`, one file per UTC day.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recollect_core::error::StorageError;
use recollect_core::store::DailyLog;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// Appends entries to the current day's markdown file.
pub struct FileDailyLog {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileDailyLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path_for(&self, day: DateTime<Utc>) -> PathBuf {
        self.dir.join(format!("{}.md", day.format("%Y-%m-%d")))
    }

    async fn append_at(&self, text: &str, at: DateTime<Utc>) -> Result<(), StorageError> {
        let path = self.path_for(at);
        let io_err = |e: std::io::Error| StorageError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;
        let entry = format!("<!-- {} -->\n{}\n\n", at.to_rfc3339(), text.trim_end());
        file.write_all(entry.as_bytes()).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;

        debug!(path = %path.display(), chars = text.len(), "Daily log entry written");
        Ok(())
    }
}

#[async_trait]
impl DailyLog for FileDailyLog {
    async fn write_summary(&self, text: &str) -> Result<(), StorageError> {
        self.append_at(text, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn entries_append_to_daily_file() {
        let tmp = tempfile::tempdir().unwrap();
        let log = FileDailyLog::new(tmp.path().join("memory"));
        let day = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();

        log.append_at("## first", day).await.unwrap();
        log.append_at("## second\n", day).await.unwrap();

        let path = tmp.path().join("memory").join("2026-03-14.md");
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("## first\n\n"));
        assert!(content.find("## first").unwrap() < content.find("## second").unwrap());
        assert!(content.contains("2026-03-14T09:30:00+00:00"));
    }

    #[tokio::test]
    async fn different_days_use_different_files() {
        let tmp = tempfile::tempdir().unwrap();
        let log = FileDailyLog::new(tmp.path());
        let monday = Utc.with_ymd_and_hms(2026, 3, 16, 23, 59, 0).unwrap();
        let tuesday = Utc.with_ymd_and_hms(2026, 3, 17, 0, 1, 0).unwrap();
        log.append_at("a", monday).await.unwrap();
        log.append_at("b", tuesday).await.unwrap();
        assert!(tmp.path().join("2026-03-16.md").exists());
        assert!(tmp.path().join("2026-03-17.md").exists());
    }

    #[tokio::test]
    async fn write_summary_uses_today() {
        let tmp = tempfile::tempdir().unwrap();
        let log = FileDailyLog::new(tmp.path());
        log.write_summary("flush").await.unwrap();
        assert!(log.path_for(Utc::now()).exists());
    }
}
