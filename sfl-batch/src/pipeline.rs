//! Daily ingestion pipeline
//!
//! ```text
//! fetch → dedupe → backup → classify → score → aggregate
//!       → hour writes → day rollup → day write
//!       → (month rollup → month write, when the schedule says so)
//! ```
//!
//! Any failure before the first store write aborts the run with nothing
//! written. Store writes are additive, so a run that fails part-way must not
//! be re-run for the same day without clearing that day's buckets first.

use crate::backup::{BackupOutcome, BackupSink};
use crate::classify::Classifier;
use crate::fetch::DayFetcher;
use crate::retry::{retry_store_write, RetryPolicy};
use crate::schedule::{month_day_bounds, SchedulePolicy};
use chrono::NaiveDate;
use futures::future::try_join_all;
use sfl_common::aggregate::aggregate;
use sfl_common::config::TomlConfig;
use sfl_common::dedup::{DedupStats, Deduplicator};
use sfl_common::rollup::{expected_children, rollup_day, rollup_month};
use sfl_common::scoring::ScoringEngine;
use sfl_common::time::day_start;
use sfl_common::{Bucket, ClassifiedRecord, PeriodLabel, Record, Result, SentimentCounts, TimeSeriesStore};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Outcome of classifying, scoring and storing one day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayOutcome {
    pub day: NaiveDate,
    pub records: usize,
    pub hour_buckets: usize,
    /// `None` when the day had no records (nothing written)
    pub day_counts: Option<SentimentCounts>,
}

/// Summary of one ingestion run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub dedup: DedupStats,
    /// `None` when the backup write failed
    pub backup: Option<BackupOutcome>,
    pub outcome: DayOutcome,
    pub month: Option<Bucket>,
}

/// Classify → score → aggregate → store, for records of one day
///
/// Shared by daily ingestion and historical reprocessing.
pub struct DayProcessor {
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn TimeSeriesStore>,
    scoring: ScoringEngine,
    retry: RetryPolicy,
}

impl DayProcessor {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn TimeSeriesStore>,
        scoring: ScoringEngine,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            classifier,
            store,
            scoring,
            retry,
        }
    }

    pub fn store(&self) -> &Arc<dyn TimeSeriesStore> {
        &self.store
    }

    /// Process already deduplicated records of `day`
    pub async fn process(&self, day: NaiveDate, records: Vec<Record>) -> Result<DayOutcome> {
        let record_count = records.len();
        if records.is_empty() {
            info!(day = %day, "No records, nothing to write");
            return Ok(DayOutcome {
                day,
                records: 0,
                hour_buckets: 0,
                day_counts: None,
            });
        }

        // Classifier sees the whole batch once
        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let labels = self.classifier.classify(&texts).await?;
        let classified = ClassifiedRecord::zip_labels(records, &labels)?;
        info!(classified = classified.len(), "Classified records");

        let scored = self.scoring.score_all(&classified);
        let hours = aggregate(&scored);

        // Validate the rollup before writing anything
        let day_bucket = rollup_day(&hours)?;
        info!(hour_buckets = hours.len(), "Aggregated hour buckets");

        try_join_all(hours.iter().map(|bucket| self.write(bucket))).await?;
        info!(written = hours.len(), "Wrote hour buckets");

        let day_counts = match day_bucket {
            Some(bucket) => {
                if hours.len() < expected_children(&bucket.period) {
                    debug!(
                        period = %bucket.period,
                        hours = hours.len(),
                        "Day rollup over a partial set of hours"
                    );
                }
                self.write(&bucket).await?;
                info!(period = %bucket.period, total = bucket.counts.total(), "Wrote day bucket");
                Some(bucket.counts)
            }
            None => None,
        };

        Ok(DayOutcome {
            day,
            records: record_count,
            hour_buckets: hours.len(),
            day_counts,
        })
    }

    /// Roll the stored day buckets of `month` up into a month bucket
    pub async fn rollup_month(&self, month: &PeriodLabel) -> Result<Option<Bucket>> {
        roll_up_month(self.store.as_ref(), &self.retry, month).await
    }

    async fn write(&self, bucket: &Bucket) -> Result<()> {
        write_bucket(self.store.as_ref(), &self.retry, bucket).await
    }
}

/// Sum the stored day buckets of `month` into a month bucket and store it
///
/// Returns `None` (and writes nothing) when the month has no day buckets.
pub async fn roll_up_month(
    store: &dyn TimeSeriesStore,
    retry: &RetryPolicy,
    month: &PeriodLabel,
) -> Result<Option<Bucket>> {
    let (first, last) = month_day_bounds(month)?;
    let days = store.query_range(&first, Some(&last)).await?;

    let bucket = match rollup_month(&days)? {
        Some(bucket) => bucket,
        None => {
            info!(month = %month, "No daily statistics, skipping month rollup");
            return Ok(None);
        }
    };

    if days.len() < expected_children(&bucket.period) {
        warn!(
            month = %month,
            days = days.len(),
            expected = expected_children(&bucket.period),
            "Month rollup over an incomplete set of days"
        );
    }

    write_bucket(store, retry, &bucket).await?;
    info!(period = %bucket.period, total = bucket.counts.total(), "Wrote month bucket");
    Ok(Some(bucket))
}

/// `put_merge` one bucket with store retry
pub async fn write_bucket(store: &dyn TimeSeriesStore, retry: &RetryPolicy, bucket: &Bucket) -> Result<()> {
    let operation = format!("put_merge {}", bucket.period);
    retry_store_write(&operation, retry, || store.put_merge(&bucket.period, &bucket.counts)).await
}

/// The daily batch job
pub struct IngestPipeline {
    fetcher: DayFetcher,
    backup: Arc<dyn BackupSink>,
    deduplicator: Deduplicator,
    schedule: SchedulePolicy,
    processor: DayProcessor,
}

impl IngestPipeline {
    pub fn new(
        fetcher: DayFetcher,
        backup: Arc<dyn BackupSink>,
        deduplicator: Deduplicator,
        schedule: SchedulePolicy,
        processor: DayProcessor,
    ) -> Self {
        Self {
            fetcher,
            backup,
            deduplicator,
            schedule,
            processor,
        }
    }

    /// Wire a pipeline from configuration and pre-built collaborators
    pub fn from_config(
        config: &TomlConfig,
        fetcher: DayFetcher,
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn TimeSeriesStore>,
        backup: Arc<dyn BackupSink>,
    ) -> Result<Self> {
        let processor = DayProcessor::new(
            classifier,
            store,
            ScoringEngine::new(config.scoring)?,
            RetryPolicy::from(&config.store_retry),
        );
        Ok(Self::new(
            fetcher,
            backup,
            Deduplicator::new(config.dedup.identity_key),
            SchedulePolicy::from_config(&config.schedule)?,
            processor,
        ))
    }

    pub fn schedule(&self) -> &SchedulePolicy {
        &self.schedule
    }

    pub fn processor(&self) -> &DayProcessor {
        &self.processor
    }

    /// Run the job as if started on `today`
    pub async fn run(&self, today: NaiveDate) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let day = self.schedule.target_day(today);
        let span = info_span!("ingest_run", %run_id, %day);

        self.run_inner(run_id, today, day).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, today: NaiveDate, day: NaiveDate) -> Result<RunReport> {
        info!(today = %today, "Starting ingestion run");

        let fetched = self.fetcher.fetch_day(day).await?;
        let (records, dedup) = self.deduplicator.dedupe_with_stats(fetched, day_start(day));
        let records = drop_after_day(records, day);
        info!(
            input = dedup.input,
            kept = records.len(),
            duplicates = dedup.duplicates,
            before_window = dedup.before_window,
            "Deduplicated records"
        );

        // Best effort: a failed backup never fails the run
        let backup = match self.backup.write(day, &records).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(error = %e, "Backup failed, continuing without backup");
                None
            }
        };

        let outcome = self.processor.process(day, records).await?;

        let month = if self.schedule.should_rollup_month(today) {
            self.processor.rollup_month(&self.schedule.month_to_roll_up(today)).await?
        } else {
            None
        };

        info!(
            records = outcome.records,
            hour_buckets = outcome.hour_buckets,
            month_rollup = month.is_some(),
            "Ingestion run complete"
        );

        Ok(RunReport {
            run_id,
            dedup,
            backup,
            outcome,
            month,
        })
    }
}

/// Discard records created after `day`
///
/// Window ends never pass 23:59 local, so these only appear when the source
/// ignores the window end.
fn drop_after_day(records: Vec<Record>, day: NaiveDate) -> Vec<Record> {
    let before = records.len();
    let kept: Vec<Record> = records.into_iter().filter(|r| r.created_at.date() <= day).collect();
    if kept.len() < before {
        warn!(dropped = before - kept.len(), "Dropped records created after the target day");
    }
    kept
}
