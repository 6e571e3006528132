//! Calendar helpers
//!
//! Calendar-aware month arithmetic and conversions between `NaiveDate` and
//! Arrow's `Date32` representation (days since the Unix epoch).

use chrono::{Datelike, Duration, Month, NaiveDate};

/// Days from 0001-01-01 (CE) to 1970-01-01
pub const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Number of days in the given month (1-12) of the given year, 0 if the
/// month is out of range
#[must_use]
pub fn days_in_month(year: i32, month: u32) -> u32 {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .and_then(|m| m.num_days(year))
        .map_or(0, u32::from)
}

/// Number of days in the month containing `date`
#[must_use]
pub fn days_in_month_of(date: NaiveDate) -> u32 {
    days_in_month(date.year(), date.month())
}

/// First day of the month containing `date`
#[must_use]
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

/// Last day of the month containing `date`
#[must_use]
pub fn month_end(date: NaiveDate) -> NaiveDate {
    date + Duration::days(i64::from(days_in_month_of(date) - date.day()))
}

/// Convert a date to Arrow `Date32` days
#[must_use]
pub fn to_date32(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Convert Arrow `Date32` days to a date
#[must_use]
pub fn from_date32(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}
