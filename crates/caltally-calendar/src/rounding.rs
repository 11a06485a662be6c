//! Rounding wall-clock timestamps to minute boundaries.
//!
//! Rounding works on the calendar fields exactly as given. No timezone
//! conversion happens here; callers normalize before calling.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use thiserror::Error;

/// Interval used for default event times.
pub const DEFAULT_INTERVAL_MINUTES: i64 = 15;

const MIN_INTERVAL: i64 = 1;
const MAX_INTERVAL: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundingError {
    #[error("{0}")]
    InvalidArgument(String),
}

/// Round `timestamp` to the nearest `interval_minutes` boundary.
///
/// Seconds and sub-seconds are dropped. Ties round up, so 17:23 with a
/// 15 minute interval becomes 17:30 and 23:59 becomes 00:00 on the next day,
/// carrying into the month and year as needed.
///
/// # Errors
///
/// Returns [`RoundingError::InvalidArgument`] when `interval_minutes` is
/// outside `1..=60`.
pub fn round_to_nearest_interval(
    timestamp: NaiveDateTime,
    interval_minutes: i64,
) -> Result<NaiveDateTime, RoundingError> {
    if interval_minutes <= 0 || interval_minutes > MAX_INTERVAL {
        return Err(RoundingError::InvalidArgument(format!(
            "interval minutes must be between {} and {}",
            MIN_INTERVAL, MAX_INTERVAL
        )));
    }

    let mut year = timestamp.year();
    let mut month = timestamp.month();
    let mut day = timestamp.day();
    let mut hour = timestamp.hour();
    let minute = i64::from(timestamp.minute());

    // round(minute / interval) with ties going up, in integers
    let mut nearest = (2 * minute + interval_minutes) / (2 * interval_minutes) * interval_minutes;

    if nearest >= 60 {
        nearest = 0;
        hour += 1;
        if hour >= 24 {
            hour = 0;
            day += 1;
            if day > days_in_month(year, month) {
                day = 1;
                month += 1;
                if month > 12 {
                    month = 1;
                    year += 1;
                }
            }
        }
    }

    // nearest is within 0..60 here
    let minute = nearest as u32;

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .ok_or_else(|| {
            RoundingError::InvalidArgument(format!(
                "{} cannot be rounded past the supported calendar range",
                timestamp
            ))
        })
}

/// Round the current local wall-clock time.
///
/// # Errors
///
/// Same as [`round_to_nearest_interval`].
pub fn round_now(interval_minutes: i64) -> Result<NaiveDateTime, RoundingError> {
    round_to_nearest_interval(Local::now().naive_local(), interval_minutes)
}

/// Number of days in `month` (1-based) of `year`.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        _ => 28,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
