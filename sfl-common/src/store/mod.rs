//! Time-series store contract
//!
//! The store persists one counter triple per `(granularity, period label)`
//! key. Writes are additive: `put_merge` sums the delta into whatever is
//! already stored, so disjoint batches can be written in any order.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use crate::model::{Bucket, SentimentCounts};
use crate::period::PeriodLabel;
use crate::{Error, Result};
use async_trait::async_trait;

#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Sum `delta` into the bucket at `period`, creating it if absent
    ///
    /// Atomic per key. Concurrent calls for the same key both land.
    async fn put_merge(&self, period: &PeriodLabel, delta: &SentimentCounts) -> Result<()>;

    /// Buckets of `from`'s granularity with `from <= label <= to`, ascending
    ///
    /// Open-ended when `to` is `None`.
    async fn query_range(&self, from: &PeriodLabel, to: Option<&PeriodLabel>) -> Result<Vec<Bucket>>;

    /// The bucket stored at exactly `period`
    async fn query_exact(&self, period: &PeriodLabel) -> Result<Option<Bucket>>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Check that a range query is well formed
pub(crate) fn validate_range(from: &PeriodLabel, to: Option<&PeriodLabel>) -> Result<()> {
    if let Some(to) = to {
        if to.granularity() != from.granularity() {
            return Err(Error::InvalidInput(format!(
                "Range bounds have different granularities: {} '{}' and {} '{}'",
                from.granularity(),
                from,
                to.granularity(),
                to
            )));
        }
        if from > to {
            return Err(Error::InvalidInput(format!(
                "Range start '{}' is after range end '{}'",
                from, to
            )));
        }
    }
    Ok(())
}
