//! Local time handling
//!
//! All period labels are in local time. The local zone is a fixed UTC offset
//! (CET by default); daylight saving is not applied.

use crate::{Error, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};

/// Fixed-offset local clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    offset: FixedOffset,
}

impl LocalTime {
    pub fn from_offset_minutes(minutes: i32) -> Result<Self> {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| Error::Config(format!("UTC offset out of range: {} minutes", minutes)))?;
        Ok(Self { offset })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// UTC instant to local wall-clock time, truncated to the second
    pub fn to_local(&self, utc: DateTime<Utc>) -> NaiveDateTime {
        let local = utc.with_timezone(&self.offset).naive_local();
        local.with_nanosecond(0).unwrap_or(local)
    }

    /// Local wall-clock time to the UTC instant
    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        Utc.from_utc_datetime(&(local - Duration::seconds(i64::from(self.offset.local_minus_utc()))))
    }

    /// Current local date
    pub fn today(&self) -> NaiveDate {
        self.to_local(Utc::now()).date()
    }
}

/// Midnight at the start of `date`
pub fn day_start(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}
