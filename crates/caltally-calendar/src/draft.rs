//! New-event drafts and the date-time formats used for editing.

use chrono::{Duration, NaiveDateTime};

use crate::error::CalendarError;
use crate::rounding::round_to_nearest_interval;
use crate::types::{NewEventRequest, RequestEventTime};

const INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";
const REQUEST_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DISPLAY_FORMAT: &str = "%a %d.%m.%Y %H:%M";

const ACCEPTED_INPUT_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// An event being composed before it is sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub summary: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub time_zone: String,
}

impl EventDraft {
    /// A draft ending at `now` rounded to `interval_minutes` and lasting
    /// `duration_hours`.
    ///
    /// # Errors
    ///
    /// Fails on an interval outside `1..=60`, a negative or non-finite
    /// duration, or one reaching past the representable date range.
    pub fn with_defaults(
        now: NaiveDateTime,
        interval_minutes: i64,
        duration_hours: f64,
        time_zone: &str,
    ) -> Result<Self, CalendarError> {
        if !duration_hours.is_finite() || duration_hours < 0.0 {
            return Err(CalendarError::InvalidEvent(format!(
                "duration must be a non-negative number of hours, got {}",
                duration_hours
            )));
        }

        let end = round_to_nearest_interval(now, interval_minutes)?;
        let millis = (duration_hours * 3_600_000.0).round() as i64;
        let start = Duration::try_milliseconds(millis)
            .and_then(|duration| end.checked_sub_signed(duration))
            .ok_or_else(|| {
                CalendarError::InvalidEvent(format!(
                    "duration out of range: {} hours",
                    duration_hours
                ))
            })?;

        Ok(Self {
            summary: String::new(),
            description: String::new(),
            start,
            end,
            time_zone: time_zone.to_string(),
        })
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn duration_hours(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 3_600_000.0
    }

    /// Check the draft can be submitted to `calendar_id`.
    ///
    /// # Errors
    ///
    /// [`CalendarError::InvalidEvent`] naming the first problem found.
    pub fn validate(&self, calendar_id: &str) -> Result<(), CalendarError> {
        if calendar_id.trim().is_empty() {
            return Err(CalendarError::InvalidEvent(
                "Select a calendar first".to_string(),
            ));
        }
        if self.summary.trim().is_empty() {
            return Err(CalendarError::InvalidEvent(
                "Summary is required".to_string(),
            ));
        }
        if self.end < self.start {
            return Err(CalendarError::InvalidEvent(
                "End must not be before start".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_request(&self) -> NewEventRequest {
        let description = if self.description.is_empty() {
            None
        } else {
            Some(self.description.clone())
        };

        NewEventRequest {
            summary: self.summary.trim().to_string(),
            description,
            start: RequestEventTime {
                date_time: self.start.format(REQUEST_FORMAT).to_string(),
                time_zone: self.time_zone.clone(),
            },
            end: RequestEventTime {
                date_time: self.end.format(REQUEST_FORMAT).to_string(),
                time_zone: self.time_zone.clone(),
            },
        }
    }
}

/// `YYYY-MM-DDTHH:MM`, no timezone suffix.
pub fn format_for_input(timestamp: NaiveDateTime) -> String {
    timestamp.format(INPUT_FORMAT).to_string()
}

/// Parse a local date-time typed by the user.
///
/// # Errors
///
/// [`CalendarError::InvalidEvent`] when no accepted format matches.
pub fn parse_input(input: &str) -> Result<NaiveDateTime, CalendarError> {
    let input = input.trim();
    ACCEPTED_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .ok_or_else(|| {
            CalendarError::InvalidEvent(format!(
                "invalid date-time '{}', use YYYY-MM-DDTHH:MM",
                input
            ))
        })
}

/// Listing format, e.g. `Fri 04.10.2024 18:00`.
pub fn format_event_time(timestamp: NaiveDateTime) -> String {
    timestamp.format(DISPLAY_FORMAT).to_string()
}
