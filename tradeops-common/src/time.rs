//! Pacific reference-time helpers
//!
//! All ledger dates are interpreted in the business home timezone,
//! America/Los_Angeles. DST transitions come from the tz database, so
//! "today" near midnight UTC can differ from the UTC calendar date.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::America::Los_Angeles;

/// Convert a UTC instant to its Pacific calendar date
pub fn to_pacific_date(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&Los_Angeles).date_naive()
}

/// Current calendar date in the Pacific timezone
pub fn pacific_today() -> NaiveDate {
    to_pacific_date(Utc::now())
}

/// Monday of the ISO week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Number of calendar days in the inclusive range `[start, end]`
pub fn day_span(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}
