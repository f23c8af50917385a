//! Batch deduplication
//!
//! Removes records repeated across overlapping fetch pages and records that
//! fall before the target day. Single pass, input order preserved, first
//! occurrence wins.

use crate::model::Record;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::collections::HashSet;

/// Timestamp format used when building legacy identity keys
const LEGACY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How record identity is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKeyMode {
    /// `(text, created_at)` compared as a pair
    #[default]
    Structured,
    /// `text + "YYYY-MM-DD HH:MM:SS"` with no delimiter
    ///
    /// Reproduces the key strings of older runs. The timestamp suffix is fixed
    /// width, so in practice it keeps the same records as `Structured`.
    LegacyConcat,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IdentityKey {
    Structured(String, NaiveDateTime),
    Legacy(String),
}

impl IdentityKeyMode {
    fn key_for(&self, record: &Record) -> IdentityKey {
        match self {
            IdentityKeyMode::Structured => IdentityKey::Structured(record.text.clone(), record.created_at),
            IdentityKeyMode::LegacyConcat => IdentityKey::Legacy(format!(
                "{}{}",
                record.text,
                record.created_at.format(LEGACY_TIMESTAMP_FORMAT)
            )),
        }
    }
}

/// Counters describing one dedup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    pub input: usize,
    pub kept: usize,
    pub before_window: usize,
    pub duplicates: usize,
}

/// Stateless deduplicator; one `dedupe` call per ingestion batch
#[derive(Debug, Clone, Copy, Default)]
pub struct Deduplicator {
    mode: IdentityKeyMode,
}

impl Deduplicator {
    pub fn new(mode: IdentityKeyMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> IdentityKeyMode {
        self.mode
    }

    /// Drop records created before `day_start` and repeated identities
    pub fn dedupe(&self, records: Vec<Record>, day_start: NaiveDateTime) -> Vec<Record> {
        self.dedupe_with_stats(records, day_start).0
    }

    pub fn dedupe_with_stats(&self, records: Vec<Record>, day_start: NaiveDateTime) -> (Vec<Record>, DedupStats) {
        let mut stats = DedupStats {
            input: records.len(),
            ..Default::default()
        };
        let mut seen: HashSet<IdentityKey> = HashSet::with_capacity(records.len());
        let mut kept = Vec::with_capacity(records.len());

        for record in records {
            if record.created_at < day_start {
                stats.before_window += 1;
                continue;
            }
            if !seen.insert(self.mode.key_for(&record)) {
                stats.duplicates += 1;
                continue;
            }
            kept.push(record);
        }

        stats.kept = kept.len();
        tracing::debug!(
            input = stats.input,
            kept = stats.kept,
            before_window = stats.before_window,
            duplicates = stats.duplicates,
            "Deduplicated batch"
        );

        (kept, stats)
    }
}
