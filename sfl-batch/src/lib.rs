//! # SFL Batch
//!
//! The daily ingestion job: fetch one day of tweets, deduplicate, back up,
//! classify, score, aggregate into hour buckets and roll them up into the
//! day (and, once a month, the month) bucket.
//!
//! Every external collaborator sits behind a trait ([`FetchSource`],
//! [`Classifier`], [`BackupSink`], [`sfl_common::TimeSeriesStore`]) and is
//! constructed once in `main`.

pub mod backup;
pub mod classify;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod reprocess;
pub mod retry;
pub mod schedule;

pub use backup::{BackupOutcome, BackupSink, FsBackupSink, NoopBackupSink};
pub use classify::{Classifier, HttpClassifier};
pub use error::{ClassifyError, FetchError};
pub use fetch::{DayFetcher, FetchSource, HttpFetchSource, RawTweet};
pub use pipeline::{DayOutcome, DayProcessor, IngestPipeline, RunReport};
pub use reprocess::{ReprocessReport, Reprocessor};
pub use retry::{retry_store_write, RetryPolicy};
pub use schedule::SchedulePolicy;
