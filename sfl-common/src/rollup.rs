//! Hour → day → month rollups
//!
//! A rollup is the per-class sum of a complete set of finer buckets. The
//! caller supplies that set (it is read back from the store, which has no
//! notion of a closed period); a partial set under-counts rather than failing.

use crate::model::{Bucket, SentimentCounts};
use crate::period::{Granularity, PeriodLabel};
use crate::{Error, Result};
use chrono::{Datelike, NaiveDate};

/// Combine all hour buckets of one calendar day into a day bucket
///
/// Returns `None` for an empty input: no hours means no data for the day, not
/// a zero bucket.
pub fn rollup_day(hour_buckets: &[Bucket]) -> Result<Option<Bucket>> {
    rollup(hour_buckets, Granularity::Hour, Granularity::Day)
}

/// Combine all day buckets of one calendar month into a month bucket
pub fn rollup_month(day_buckets: &[Bucket]) -> Result<Option<Bucket>> {
    rollup(day_buckets, Granularity::Day, Granularity::Month)
}

fn rollup(buckets: &[Bucket], from: Granularity, to: Granularity) -> Result<Option<Bucket>> {
    let first = match buckets.first() {
        Some(first) => first,
        None => return Ok(None),
    };

    let target = first.period.truncate(to)?;
    let mut counts = SentimentCounts::default();

    for bucket in buckets {
        if bucket.granularity() != from {
            return Err(Error::InvalidInput(format!(
                "{} rollup expects {} buckets, got {} bucket '{}'",
                to,
                from,
                bucket.granularity(),
                bucket.period
            )));
        }
        let parent = bucket.period.truncate(to)?;
        if parent != target {
            return Err(Error::InvalidInput(format!(
                "Bucket '{}' does not belong to period '{}'",
                bucket.period, target
            )));
        }
        counts.try_merge(&bucket.counts)?;
    }

    let expected = expected_children(&target);
    tracing::debug!(
        period = %target,
        inputs = buckets.len(),
        expected,
        total = counts.total(),
        "Rolled up {} buckets",
        from
    );

    Ok(Some(Bucket::new(target, counts)))
}

/// Number of finer periods that make up a complete `period`
///
/// 24 for a day, 28–31 for a month, 1 for an hour.
pub fn expected_children(period: &PeriodLabel) -> usize {
    match period.granularity() {
        Granularity::Hour => 1,
        Granularity::Day => 24,
        Granularity::Month => days_in_month(period.start_date()) as usize,
    }
}

fn days_in_month(first_day: NaiveDate) -> u32 {
    let (year, month) = if first_day.month() == 12 {
        (first_day.year() + 1, 1)
    } else {
        (first_day.year(), first_day.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(granularity: Granularity, label: &str, p: u64, n: u64, g: u64) -> Bucket {
        Bucket::new(PeriodLabel::parse(granularity, label).unwrap(), SentimentCounts::new(p, n, g))
    }

    #[test]
    fn test_rollup_day_sums_hours() {
        let hours = vec![
            bucket(Granularity::Hour, "2024-01-10:08", 2, 0, 0),
            bucket(Granularity::Hour, "2024-01-10:09", 0, 0, 1),
        ];
        let day = rollup_day(&hours).unwrap().unwrap();
        assert_eq!(day.period.as_str(), "2024-01-10");
        assert_eq!(day.granularity(), Granularity::Day);
        assert_eq!(day.counts, SentimentCounts::new(2, 0, 1));
    }

    #[test]
    fn test_rollup_day_all_24_hours() {
        let hours: Vec<Bucket> = (0..24)
            .map(|h| bucket(Granularity::Hour, &format!("2024-03-01:{:02}", h), h, 1, 2))
            .collect();
        let day = rollup_day(&hours).unwrap().unwrap();
        assert_eq!(day.counts, SentimentCounts::new((0..24).sum(), 24, 48));
    }

    #[test]
    fn test_rollup_overflow_is_error() {
        let hours = vec![
            bucket(Granularity::Hour, "2024-01-10:08", u64::MAX, 0, 0),
            bucket(Granularity::Hour, "2024-01-10:09", 1, 0, 0),
        ];
        assert!(matches!(rollup_day(&hours), Err(crate::Error::InvalidInput(_))));
    }

    #[test]
    fn test_rollup_empty_is_none() {
        assert!(rollup_day(&[]).unwrap().is_none());
        assert!(rollup_month(&[]).unwrap().is_none());
    }

    #[test]
    fn test_rollup_month_any_length() {
        for (month, days) in [("2024-02", 29), ("2023-02", 28), ("2024-04", 30), ("2024-12", 31)] {
            let day_buckets: Vec<Bucket> = (1..=days)
                .map(|d| bucket(Granularity::Day, &format!("{}-{:02}", month, d), 1, 2, 3))
                .collect();
            let result = rollup_month(&day_buckets).unwrap().unwrap();
            assert_eq!(result.period.as_str(), month);
            assert_eq!(result.counts, SentimentCounts::new(days, 2 * days, 3 * days));
        }
    }

    #[test]
    fn test_rollup_rejects_wrong_granularity() {
        let mixed = vec![
            bucket(Granularity::Hour, "2024-01-10:08", 1, 0, 0),
            bucket(Granularity::Day, "2024-01-10", 1, 0, 0),
        ];
        assert!(matches!(rollup_day(&mixed), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_rollup_rejects_buckets_from_other_periods() {
        let hours = vec![
            bucket(Granularity::Hour, "2024-01-10:23", 1, 0, 0),
            bucket(Granularity::Hour, "2024-01-11:00", 1, 0, 0),
        ];
        assert!(matches!(rollup_day(&hours), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_rollup_composes() {
        // hours -> days -> month equals hours summed directly
        let mut days = Vec::new();
        let mut direct = SentimentCounts::default();
        for d in 1..=3 {
            let hours: Vec<Bucket> = (0..5)
                .map(|h| bucket(Granularity::Hour, &format!("2024-05-{:02}:{:02}", d, h), d, h, 1))
                .collect();
            for h in &hours {
                direct.merge(&h.counts);
            }
            days.push(rollup_day(&hours).unwrap().unwrap());
        }
        let month = rollup_month(&days).unwrap().unwrap();
        assert_eq!(month.counts, direct);
    }

    #[test]
    fn test_expected_children() {
        let feb = PeriodLabel::parse(Granularity::Month, "2024-02").unwrap();
        let dec = PeriodLabel::parse(Granularity::Month, "2023-12").unwrap();
        let day = PeriodLabel::parse(Granularity::Day, "2023-12-31").unwrap();
        assert_eq!(expected_children(&feb), 29);
        assert_eq!(expected_children(&dec), 31);
        assert_eq!(expected_children(&day), 24);
    }
}
