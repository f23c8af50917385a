//! Raw record backups
//!
//! Every run saves its deduplicated records, keyed by the ingested day, so
//! that history can be reprocessed later (e.g. with a better classifier).
//! Backups are write-once: an existing backup for a day is never replaced.

use async_trait::async_trait;
use chrono::NaiveDate;
use sfl_common::{Error, Record, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Result of a backup write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    Written,
    AlreadyExists,
    Disabled,
}

#[async_trait]
pub trait BackupSink: Send + Sync {
    /// Store `records` for `day` unless a backup for that day already exists
    async fn write(&self, day: NaiveDate, records: &[Record]) -> Result<BackupOutcome>;

    /// Days with a backup, ascending
    async fn list_days(&self) -> Result<Vec<NaiveDate>>;

    async fn load(&self, day: NaiveDate) -> Result<Vec<Record>>;
}

/// Backups as JSON files under `<root>/backup/<YYYY-MM-DD>.json`
pub struct FsBackupSink {
    dir: PathBuf,
}

impl FsBackupSink {
    pub fn new(root: &Path) -> Self {
        Self {
            dir: root.join("backup"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, day: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.json", day.format("%Y-%m-%d")))
    }
}

#[async_trait]
impl BackupSink for FsBackupSink {
    async fn write(&self, day: NaiveDate, records: &[Record]) -> Result<BackupOutcome> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(day);
        let payload = serde_json::to_vec_pretty(records)?;

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "Backup already exists, leaving it untouched");
                return Ok(BackupOutcome::AlreadyExists);
            }
            Err(e) => return Err(e.into()),
        };

        file.write_all(&payload).await?;
        file.flush().await?;

        info!(path = %path.display(), records = records.len(), "Backed up records");
        Ok(BackupOutcome::Written)
    }

    async fn list_days(&self) -> Result<Vec<NaiveDate>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut days = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let day = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
            match day {
                Some(day) => days.push(day),
                None => debug!(path = %path.display(), "Skipping non-backup file"),
            }
        }

        days.sort_unstable();
        Ok(days)
    }

    async fn load(&self, day: NaiveDate) -> Result<Vec<Record>> {
        let path = self.path_for(day);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("No backup for {}", day)));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Sink used when backups are disabled or for dry runs
#[derive(Debug, Default)]
pub struct NoopBackupSink;

#[async_trait]
impl BackupSink for NoopBackupSink {
    async fn write(&self, _day: NaiveDate, _records: &[Record]) -> Result<BackupOutcome> {
        Ok(BackupOutcome::Disabled)
    }

    async fn list_days(&self) -> Result<Vec<NaiveDate>> {
        Ok(Vec::new())
    }

    async fn load(&self, day: NaiveDate) -> Result<Vec<Record>> {
        Err(Error::NotFound(format!("Backups disabled, no backup for {}", day)))
    }
}
