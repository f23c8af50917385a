//! Historical reprocessing
//!
//! Replays every backed-up day through classification, scoring and storage.
//! Backups hold already deduplicated records, so dedup is not repeated.
//! Store writes add to existing buckets: reprocess into an empty store.
//! A month is rolled up once its last day has been replayed.

use crate::backup::BackupSink;
use crate::pipeline::{DayOutcome, DayProcessor};
use crate::schedule::completes_month;
use chrono::NaiveDate;
use sfl_common::{Bucket, PeriodLabel, Result};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct ReprocessReport {
    pub days: Vec<DayOutcome>,
    pub months: Vec<Bucket>,
}

impl ReprocessReport {
    pub fn total_records(&self) -> usize {
        self.days.iter().map(|d| d.records).sum()
    }
}

pub struct Reprocessor {
    backup: Arc<dyn BackupSink>,
    processor: DayProcessor,
}

impl Reprocessor {
    pub fn new(backup: Arc<dyn BackupSink>, processor: DayProcessor) -> Self {
        Self { backup, processor }
    }

    /// Reprocess all backed-up days, optionally limited to `[from, to]`
    pub async fn run(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<ReprocessReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("reprocess_run", %run_id);

        async {
            let days: Vec<NaiveDate> = self
                .backup
                .list_days()
                .await?
                .into_iter()
                .filter(|d| from.map_or(true, |f| *d >= f) && to.map_or(true, |t| *d <= t))
                .collect();

            warn!(
                days = days.len(),
                "Reprocessing adds to existing buckets; the target store must not already hold these days"
            );

            let mut report = ReprocessReport::default();
            for day in days {
                if self
                    .processor
                    .store()
                    .query_exact(&PeriodLabel::for_day(day))
                    .await?
                    .is_some()
                {
                    warn!(day = %day, "Store already holds this day; counts will be doubled");
                }

                let records = self.backup.load(day).await?;
                let outcome = self.processor.process(day, records).await?;
                info!(day = %day, records = outcome.records, "Reprocessed day");
                report.days.push(outcome);

                if completes_month(day) {
                    if let Some(month) = self.processor.rollup_month(&PeriodLabel::for_month(day)).await? {
                        report.months.push(month);
                    }
                }
            }

            info!(
                days = report.days.len(),
                months = report.months.len(),
                records = report.total_records(),
                "Reprocessing complete"
            );
            Ok::<_, sfl_common::Error>(report)
        }
        .instrument(span)
        .await
    }
}
