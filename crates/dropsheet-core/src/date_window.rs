use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::error::{PipelineError, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Calendar arithmetic anchored on an explicit reference date.
///
/// The pipeline never reads the wall clock below this point: the binary resolves
/// "today" once (in the configured timezone) and every query parameter is derived
/// from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    today: NaiveDate,
}

impl DateWindow {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Current calendar date in `tz` at instant `now`.
    pub fn today_in(tz: Tz, now: DateTime<Utc>) -> Self {
        Self::new(now.with_timezone(&tz).date_naive())
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn date_days_ago(&self, days: u32) -> Result<NaiveDate> {
        self.today
            .checked_sub_days(Days::new(u64::from(days)))
            .ok_or_else(|| {
                PipelineError::Range(format!(
                    "{days} days before {} is not a representable date",
                    self.today
                ))
            })
    }

    /// `today - days` formatted as `YYYY-MM-DD`.
    pub fn days_ago(&self, days: u32) -> Result<String> {
        self.date_days_ago(days).map(format_date)
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Every calendar day from `start` to `end`, both included. Empty when `start > end`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}
