//! # SFL Common Library
//!
//! Shared code for the SFL (Sentiment Flanders) services:
//! - Period labels and the bucket data model
//! - Text normalization and batch deduplication
//! - Engagement scoring, hourly aggregation and rollups
//! - The time-series store contract and its SQLite / in-memory implementations
//! - Configuration loading

pub mod aggregate;
pub mod config;
pub mod db;
pub mod dedup;
pub mod error;
pub mod model;
pub mod normalize;
pub mod period;
pub mod rollup;
pub mod scoring;
pub mod store;
pub mod time;

pub use error::{Error, Result};
pub use model::{Bucket, ClassifiedRecord, Record, Sentiment, SentimentCounts};
pub use period::{Granularity, PeriodLabel};
pub use store::TimeSeriesStore;
