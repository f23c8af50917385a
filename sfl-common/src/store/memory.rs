//! In-memory store for tests and dry runs

use super::{validate_range, TimeSeriesStore};
use crate::model::{Bucket, SentimentCounts};
use crate::period::PeriodLabel;
use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// `BTreeMap` keyed by period label
///
/// Labels order by granularity first, then chronologically, so a range scan
/// over one granularity is a plain map range.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    buckets: RwLock<BTreeMap<PeriodLabel, SentimentCounts>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored bucket, ordered by (granularity, label)
    pub async fn snapshot(&self) -> Vec<Bucket> {
        self.buckets
            .read()
            .await
            .iter()
            .map(|(period, counts)| Bucket::new(period.clone(), *counts))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.buckets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.buckets.read().await.is_empty()
    }
}

#[async_trait]
impl TimeSeriesStore for InMemoryStore {
    async fn put_merge(&self, period: &PeriodLabel, delta: &SentimentCounts) -> Result<()> {
        self.buckets
            .write()
            .await
            .entry(period.clone())
            .or_default()
            .try_merge(delta)
    }

    async fn query_range(&self, from: &PeriodLabel, to: Option<&PeriodLabel>) -> Result<Vec<Bucket>> {
        validate_range(from, to)?;
        let granularity = from.granularity();
        let map = self.buckets.read().await;

        let buckets = map
            .range(from.clone()..)
            .take_while(|(period, _)| {
                period.granularity() == granularity && to.map_or(true, |to| **period <= *to)
            })
            .map(|(period, counts)| Bucket::new(period.clone(), *counts))
            .collect();

        Ok(buckets)
    }

    async fn query_exact(&self, period: &PeriodLabel) -> Result<Option<Bucket>> {
        Ok(self
            .buckets
            .read()
            .await
            .get(period)
            .map(|counts| Bucket::new(period.clone(), *counts)))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
