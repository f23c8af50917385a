//! Hourly bucket aggregation
//!
//! Scored records are grouped by the hour they were created in and their
//! weights summed per sentiment class. Hours with no records produce no
//! bucket. Aggregation is a commutative monoid: aggregating disjoint batches
//! and merging the results with [`merge_buckets`] equals aggregating their
//! union, which is what makes additive store writes safe.

use crate::model::{Bucket, SentimentCounts};
use crate::period::PeriodLabel;
use crate::scoring::ScoredRecord;
use std::collections::BTreeMap;

/// Group scored records into hour buckets, ordered by period label
pub fn aggregate(scored: &[ScoredRecord]) -> Vec<Bucket> {
    let mut buckets: BTreeMap<PeriodLabel, SentimentCounts> = BTreeMap::new();

    for record in scored {
        buckets
            .entry(PeriodLabel::for_hour(record.created_at))
            .or_default()
            .add(record.sentiment, record.weight);
    }

    into_buckets(buckets)
}

/// Merge two bucket sets by summing counters that share a key
///
/// Keys present in only one side pass through unchanged. The result is
/// ordered by (granularity, period label).
pub fn merge_buckets(left: &[Bucket], right: &[Bucket]) -> Vec<Bucket> {
    let mut merged: BTreeMap<PeriodLabel, SentimentCounts> = BTreeMap::new();

    for bucket in left.iter().chain(right) {
        merged.entry(bucket.period.clone()).or_default().merge(&bucket.counts);
    }

    into_buckets(merged)
}

fn into_buckets(map: BTreeMap<PeriodLabel, SentimentCounts>) -> Vec<Bucket> {
    map.into_iter()
        .map(|(period, counts)| Bucket::new(period, counts))
        .collect()
}
