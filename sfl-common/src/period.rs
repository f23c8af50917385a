//! Period labels and granularities
//!
//! Label formats are part of the store's key space and must stay stable:
//! - hour  `YYYY-MM-DD:HH`
//! - day   `YYYY-MM-DD`
//! - month `YYYY-MM`
//!
//! Within one granularity, lexicographic order of labels equals chronological
//! order, which is what the store's range scans rely on.

use crate::{Error, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static RE_HOUR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}:[0-9]{2}$").unwrap());
static RE_DAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").unwrap());
static RE_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}$").unwrap());

/// Level in the rollup hierarchy
///
/// Ordered finest to coarsest, so `Granularity::Hour < Granularity::Month`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
    Month,
}

impl Granularity {
    /// Partition key used by the impressions store
    pub fn statistic_id(&self) -> &'static str {
        match self {
            Granularity::Hour => "sentiment_impressions_hourly",
            Granularity::Day => "sentiment_impressions_daily",
            Granularity::Month => "sentiment_impressions_monthly",
        }
    }

    /// Inverse of [`Granularity::statistic_id`]
    pub fn from_statistic_id(id: &str) -> Result<Self> {
        match id {
            "sentiment_impressions_hourly" => Ok(Granularity::Hour),
            "sentiment_impressions_daily" => Ok(Granularity::Day),
            "sentiment_impressions_monthly" => Ok(Granularity::Month),
            other => Err(Error::InvalidInput(format!("Unknown statistic id: {}", other))),
        }
    }

    /// Human-readable label format, used in error messages
    pub fn label_format(&self) -> &'static str {
        match self {
            Granularity::Hour => "YYYY-MM-DD:HH",
            Granularity::Day => "YYYY-MM-DD",
            Granularity::Month => "YYYY-MM",
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            Granularity::Hour => &RE_HOUR,
            Granularity::Day => &RE_DAY,
            Granularity::Month => &RE_MONTH,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Granularity::Hour => "hourly",
            Granularity::Day => "daily",
            Granularity::Month => "monthly",
        };
        f.write_str(name)
    }
}

/// Validated period label tied to its granularity
///
/// Construct through [`PeriodLabel::parse`], [`PeriodLabel::detect`] or the
/// `for_*` formatters; the inner string is always well-formed and names a
/// real calendar period.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodLabel {
    granularity: Granularity,
    label: String,
}

impl PeriodLabel {
    /// Parse a label that must have the given granularity
    pub fn parse(granularity: Granularity, s: &str) -> Result<Self> {
        if !granularity.pattern().is_match(s) {
            return Err(Error::InvalidPeriod(format!(
                "'{}' must be in {} format",
                s,
                granularity.label_format()
            )));
        }

        // Format matched; now reject impossible calendar values (2024-02-30, hour 24, month 13)
        let valid = match granularity {
            Granularity::Hour => {
                let date_ok = NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d").is_ok();
                let hour_ok = s[11..13].parse::<u32>().map(|h| h < 24).unwrap_or(false);
                date_ok && hour_ok
            }
            Granularity::Day => NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
            Granularity::Month => NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d").is_ok(),
        };

        if !valid {
            return Err(Error::InvalidPeriod(format!("'{}' is not a valid calendar {}", s, granularity_noun(granularity))));
        }

        Ok(Self {
            granularity,
            label: s.to_string(),
        })
    }

    /// Infer the granularity from the label's format
    pub fn detect(s: &str) -> Result<Self> {
        for granularity in [Granularity::Hour, Granularity::Day, Granularity::Month] {
            if granularity.pattern().is_match(s) {
                return Self::parse(granularity, s);
            }
        }
        Err(Error::InvalidPeriod(format!(
            "'{}' must be either YYYY-MM-DD:HH, YYYY-MM-DD, or YYYY-MM",
            s
        )))
    }

    /// Hour label for a local timestamp (minutes and seconds are dropped)
    pub fn for_hour(ts: NaiveDateTime) -> Self {
        Self {
            granularity: Granularity::Hour,
            label: format!("{}:{:02}", ts.date().format("%Y-%m-%d"), ts.hour()),
        }
    }

    pub fn for_day(date: NaiveDate) -> Self {
        Self {
            granularity: Granularity::Day,
            label: date.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn for_month(date: NaiveDate) -> Self {
        Self {
            granularity: Granularity::Month,
            label: format!("{:04}-{:02}", date.year(), date.month()),
        }
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn as_str(&self) -> &str {
        &self.label
    }

    /// Truncate to a coarser (or equal) granularity
    ///
    /// `2024-01-10:08` → `2024-01-10` → `2024-01`
    pub fn truncate(&self, to: Granularity) -> Result<Self> {
        if to < self.granularity {
            return Err(Error::InvalidInput(format!(
                "Cannot truncate {} label '{}' to finer granularity {}",
                self.granularity, self.label, to
            )));
        }
        let len = match to {
            Granularity::Hour => 13,
            Granularity::Day => 10,
            Granularity::Month => 7,
        };
        Ok(Self {
            granularity: to,
            label: self.label[..len].to_string(),
        })
    }

    /// First calendar day covered by this period
    pub fn start_date(&self) -> NaiveDate {
        let day = match self.granularity {
            Granularity::Month => format!("{}-01", self.label),
            _ => self.label[..10].to_string(),
        };
        // Labels are validated on construction
        NaiveDate::parse_from_str(&day, "%Y-%m-%d").unwrap_or(NaiveDate::MIN)
    }
}

fn granularity_noun(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Hour => "hour",
        Granularity::Day => "day",
        Granularity::Month => "month",
    }
}

impl fmt::Display for PeriodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl AsRef<str> for PeriodLabel {
    fn as_ref(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_for_hour_formats_label() {
        let label = PeriodLabel::for_hour(ts("2024-01-10 08:15:00"));
        assert_eq!(label.as_str(), "2024-01-10:08");
        assert_eq!(label.granularity(), Granularity::Hour);
    }

    #[test]
    fn test_for_day_and_month() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(PeriodLabel::for_day(date).as_str(), "2024-03-05");
        assert_eq!(PeriodLabel::for_month(date).as_str(), "2024-03");
    }

    #[test]
    fn test_parse_rejects_wrong_format() {
        assert!(PeriodLabel::parse(Granularity::Day, "2024-01-10:08").is_err());
        assert!(PeriodLabel::parse(Granularity::Hour, "2024-01-10").is_err());
        assert!(PeriodLabel::parse(Granularity::Month, "2024-1").is_err());
        assert!(PeriodLabel::parse(Granularity::Day, "").is_err());
    }

    #[test]
    fn test_parse_rejects_impossible_calendar_values() {
        assert!(PeriodLabel::parse(Granularity::Day, "2024-02-30").is_err());
        assert!(PeriodLabel::parse(Granularity::Hour, "2024-01-10:24").is_err());
        assert!(PeriodLabel::parse(Granularity::Month, "2024-13").is_err());
        assert!(PeriodLabel::parse(Granularity::Day, "2024-02-29").is_ok());
    }

    #[test]
    fn test_detect_granularity() {
        assert_eq!(PeriodLabel::detect("2024-01-10:23").unwrap().granularity(), Granularity::Hour);
        assert_eq!(PeriodLabel::detect("2024-01-10").unwrap().granularity(), Granularity::Day);
        assert_eq!(PeriodLabel::detect("2024-01").unwrap().granularity(), Granularity::Month);
        assert!(matches!(PeriodLabel::detect("yesterday"), Err(Error::InvalidPeriod(_))));
    }

    #[test]
    fn test_truncate_chain() {
        let hour = PeriodLabel::parse(Granularity::Hour, "2024-01-10:08").unwrap();
        let day = hour.truncate(Granularity::Day).unwrap();
        assert_eq!(day.as_str(), "2024-01-10");
        let month = day.truncate(Granularity::Month).unwrap();
        assert_eq!(month.as_str(), "2024-01");
        assert!(month.truncate(Granularity::Day).is_err());
    }

    #[test]
    fn test_lexicographic_order_is_chronological() {
        let a = PeriodLabel::parse(Granularity::Hour, "2024-01-10:09").unwrap();
        let b = PeriodLabel::parse(Granularity::Hour, "2024-01-10:10").unwrap();
        let c = PeriodLabel::parse(Granularity::Hour, "2024-01-11:00").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_statistic_id_round_trip() {
        for g in [Granularity::Hour, Granularity::Day, Granularity::Month] {
            assert_eq!(Granularity::from_statistic_id(g.statistic_id()).unwrap(), g);
        }
        assert!(Granularity::from_statistic_id("sentiment_impressions_weekly").is_err());
    }

    #[test]
    fn test_start_date() {
        let month = PeriodLabel::parse(Granularity::Month, "2024-02").unwrap();
        assert_eq!(month.start_date(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        let hour = PeriodLabel::parse(Granularity::Hour, "2024-02-09:13").unwrap();
        assert_eq!(hour.start_date(), NaiveDate::from_ymd_opt(2024, 2, 9).unwrap());
    }
}
