//! Run scheduling policy
//!
//! A run on date `today` ingests `today - day_delay`, the most recent day
//! the upstream source considers complete. The monthly rollup runs on the
//! day whose ingestion completes a month: when the ingested day is the last
//! day of its month (with the default delay of 2, that is the 2nd).

use chrono::{Datelike, Duration, NaiveDate};
use sfl_common::config::ScheduleConfig;
use sfl_common::{Error, PeriodLabel, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePolicy {
    day_delay: u32,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self { day_delay: 2 }
    }
}

impl SchedulePolicy {
    pub fn new(day_delay: u32) -> Result<Self> {
        if day_delay == 0 {
            return Err(Error::Config("day_delay must be at least 1".to_string()));
        }
        Ok(Self { day_delay })
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        Self::new(config.day_delay)
    }

    pub fn day_delay(&self) -> u32 {
        self.day_delay
    }

    /// Day ingested by a run on `today`
    pub fn target_day(&self, today: NaiveDate) -> NaiveDate {
        today - Duration::days(i64::from(self.day_delay))
    }

    /// Run date whose target day is `day`
    pub fn run_date_for(&self, day: NaiveDate) -> NaiveDate {
        day + Duration::days(i64::from(self.day_delay))
    }

    /// Whether a run on `today` should also roll up a month
    pub fn should_rollup_month(&self, today: NaiveDate) -> bool {
        completes_month(self.target_day(today))
    }

    /// Month rolled up by a run on `today`
    pub fn month_to_roll_up(&self, today: NaiveDate) -> PeriodLabel {
        PeriodLabel::for_month(self.target_day(today))
    }
}

/// Whether `date` is the last day of its month
pub fn completes_month(date: NaiveDate) -> bool {
    date.succ_opt().map_or(true, |next| next.day() == 1)
}

/// First and last day labels of `month`
pub fn month_day_bounds(month: &PeriodLabel) -> Result<(PeriodLabel, PeriodLabel)> {
    let first = month.start_date();
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    let last = next_month
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| Error::InvalidPeriod(format!("No last day for month '{}'", month)))?;
    Ok((PeriodLabel::for_day(first), PeriodLabel::for_day(last)))
}
