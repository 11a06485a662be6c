//! Calendar types and the backend's wire shapes.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CalendarError;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Calendar event as used locally.
///
/// Duration is never stored; [`Event::duration_hours`] derives it from
/// `start` and `end` on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub calendar_id: String,
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
    pub html_link: Option<String>,
}

/// Event time - can be a specific datetime or an all-day date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventTime {
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
}

impl EventTime {
    /// Absolute instant. All-day dates start at midnight UTC.
    pub fn as_datetime(&self) -> DateTime<Utc> {
        match self {
            EventTime::DateTime(dt) => dt.with_timezone(&Utc),
            EventTime::Date(d) => d.and_time(NaiveTime::MIN).and_utc(),
        }
    }

    /// Wall-clock time in the offset the event was stored with.
    pub fn naive_local(&self) -> NaiveDateTime {
        match self {
            EventTime::DateTime(dt) => dt.naive_local(),
            EventTime::Date(d) => d.and_time(NaiveTime::MIN),
        }
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }
}

impl Event {
    /// Convert a backend event into a local Event.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::InvalidEvent`] when the start time is
    /// missing or cannot be parsed. A missing end collapses to the start.
    pub fn from_api(api: ApiEvent, calendar_id: &str) -> Result<Self, CalendarError> {
        let start = api
            .start
            .as_ref()
            .and_then(parse_event_time)
            .ok_or_else(|| {
                CalendarError::InvalidEvent(format!("event {} has no valid start", api.id))
            })?;

        let end = api
            .end
            .as_ref()
            .and_then(parse_event_time)
            .unwrap_or_else(|| start.clone());

        Ok(Self {
            id: api.id,
            calendar_id: calendar_id.to_string(),
            summary: api.summary.unwrap_or_default(),
            description: api.description,
            location: api.location,
            start,
            end,
            html_link: api.html_link,
        })
    }

    /// Elapsed hours between start and end. Negative if end precedes start.
    pub fn duration_hours(&self) -> f64 {
        let elapsed = self.end.as_datetime() - self.start.as_datetime();
        elapsed.num_milliseconds() as f64 / MILLIS_PER_HOUR
    }

    /// Whether the event starts after `now`.
    pub fn is_future(&self, now: DateTime<Utc>) -> bool {
        self.start.as_datetime() > now
    }
}

/// Calendar metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub id: String,
    pub summary: String,
    pub description: Option<String>,
    pub time_zone: Option<String>,
    pub background_color: Option<String>,
    pub is_primary: bool,
    pub access_role: AccessRole,
}

/// Calendar access role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AccessRole {
    Owner,
    Writer,
    #[default]
    Reader,
    FreeBusyReader,
}

impl AccessRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessRole::Owner => "owner",
            AccessRole::Writer => "writer",
            AccessRole::Reader => "reader",
            AccessRole::FreeBusyReader => "freeBusyReader",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "owner" => AccessRole::Owner,
            "writer" => AccessRole::Writer,
            "freeBusyReader" => AccessRole::FreeBusyReader,
            _ => AccessRole::Reader,
        }
    }

    /// Whether events in the calendar can be created or changed.
    pub fn can_write(&self) -> bool {
        matches!(self, AccessRole::Owner | AccessRole::Writer)
    }
}

// Request bodies

/// Start or end of a new event, as the backend expects it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEventTime {
    /// Naive local date-time, `YYYY-MM-DDTHH:MM:SS`
    pub date_time: String,
    pub time_zone: String,
}

/// Body of `POST /events/{calendarId}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEventRequest {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: RequestEventTime,
    pub end: RequestEventTime,
}

/// Body of `PUT /events/{calendarId}/{eventId}`. The backend only applies the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateEventRequest {
    pub summary: String,
}

// API Response Types

/// Event as returned by the backend.
///
/// The backend also adds `formatted_start`, `formatted_end` and `duration`;
/// those are ignored and recomputed locally.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    pub id: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<ApiEventTime>,
    pub end: Option<ApiEventTime>,
    pub html_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEventTime {
    pub date_time: Option<String>,
    pub date: Option<String>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCalendar {
    pub id: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub time_zone: Option<String>,
    pub background_color: Option<String>,
    #[serde(default)]
    pub primary: bool,
    pub access_role: Option<String>,
}

impl From<ApiCalendar> for Calendar {
    fn from(api: ApiCalendar) -> Self {
        Self {
            id: api.id,
            summary: api.summary.unwrap_or_default(),
            description: api.description,
            time_zone: api.time_zone,
            background_color: api.background_color,
            is_primary: api.primary,
            access_role: api
                .access_role
                .as_deref()
                .map(AccessRole::parse)
                .unwrap_or_default(),
        }
    }
}

// Offset-less dateTime values are read as UTC.
fn parse_event_time(api: &ApiEventTime) -> Option<EventTime> {
    let timed = api.date_time.as_deref().and_then(|raw| {
        let parsed = DateTime::parse_from_rfc3339(raw).ok().or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc().fixed_offset())
        });
        if parsed.is_none() {
            tracing::debug!("Unparseable event dateTime: {}", raw);
        }
        parsed.map(EventTime::DateTime)
    });

    timed.or_else(|| {
        api.date
            .as_deref()
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
            .map(EventTime::Date)
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_event_from_api() {
        let json = r#"{
            "id": "7kq2m1",
            "summary": "Climbing",
            "description": "Bouldering with Aino",
            "location": "Kiipeilyareena",
            "start": {"dateTime": "2024-10-04T18:00:00+03:00", "timeZone": "Europe/Helsinki"},
            "end": {"dateTime": "2024-10-04T19:30:00+03:00", "timeZone": "Europe/Helsinki"},
            "htmlLink": "https://www.google.com/calendar/event?eid=7kq2m1",
            "formatted_start": "Fri 04.10.2024 18:00",
            "duration": 99.0
        }"#;

        let api_event: ApiEvent = serde_json::from_str(json).unwrap();
        let event = Event::from_api(api_event, "primary").unwrap();

        assert_eq!(event.id, "7kq2m1");
        assert_eq!(event.calendar_id, "primary");
        assert_eq!(event.summary, "Climbing");
        assert_eq!(event.location.as_deref(), Some("Kiipeilyareena"));
        // Backend-supplied duration is ignored
        assert_eq!(event.duration_hours(), 1.5);
        assert_eq!(
            event.start.naive_local().format("%H:%M").to_string(),
            "18:00"
        );
    }

    #[test]
    fn test_all_day_event_spans_whole_days() {
        let api_event: ApiEvent = serde_json::from_str(
            r#"{"id": "juhannus", "summary": "Midsummer", "start": {"date": "2024-06-21"}, "end": {"date": "2024-06-22"}}"#,
        )
        .unwrap();
        let event = Event::from_api(api_event, "primary").unwrap();

        assert!(event.start.is_all_day());
        assert_eq!(event.duration_hours(), 24.0);
    }

    #[test]
    fn test_missing_start_is_rejected() {
        let api_event: ApiEvent =
            serde_json::from_str(r#"{"id": "broken", "summary": "No times"}"#).unwrap();
        let result = Event::from_api(api_event, "primary");
        assert!(matches!(result, Err(CalendarError::InvalidEvent(_))));
    }

    #[test]
    fn test_missing_end_gives_zero_duration() {
        let api_event: ApiEvent = serde_json::from_str(
            r#"{"id": "e1", "start": {"dateTime": "2024-02-01T10:00:00Z"}}"#,
        )
        .unwrap();
        let event = Event::from_api(api_event, "primary").unwrap();
        assert_eq!(event.summary, "");
        assert_eq!(event.duration_hours(), 0.0);
    }

    #[test]
    fn test_naive_datetime_read_as_utc() {
        let api_event: ApiEvent = serde_json::from_str(
            r#"{"id": "e1", "start": {"dateTime": "2024-02-01T10:00:00"}, "end": {"dateTime": "2024-02-01T10:45:00"}}"#,
        )
        .unwrap();
        let event = Event::from_api(api_event, "primary").unwrap();
        assert_eq!(event.duration_hours(), 0.75);
    }

    #[test]
    fn test_negative_duration() {
        let api_event: ApiEvent = serde_json::from_str(
            r#"{"id": "e1", "start": {"dateTime": "2024-02-01T12:00:00Z"}, "end": {"dateTime": "2024-02-01T11:00:00Z"}}"#,
        )
        .unwrap();
        let event = Event::from_api(api_event, "primary").unwrap();
        assert_eq!(event.duration_hours(), -1.0);
    }

    #[test]
    fn test_is_future() {
        let api_event: ApiEvent = serde_json::from_str(
            r#"{"id": "e1", "start": {"dateTime": "2024-02-01T12:00:00Z"}, "end": {"dateTime": "2024-02-01T13:00:00Z"}}"#,
        )
        .unwrap();
        let event = Event::from_api(api_event, "primary").unwrap();

        let before = DateTime::parse_from_rfc3339("2024-02-01T11:59:59Z")
            .unwrap()
            .with_timezone(&Utc);
        let at = DateTime::parse_from_rfc3339("2024-02-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(event.is_future(before));
        assert!(!event.is_future(at));
    }

    #[test]
    fn test_calendars_from_api() {
        let calendars: Vec<ApiCalendar> = serde_json::from_str(
            r#"[
                {"id": "me@example.com", "summary": "Personal", "timeZone": "Europe/Helsinki", "primary": true, "accessRole": "owner"},
                {"id": "fi.finnish#holiday@group.v.calendar.google.com", "summary": "Holidays in Finland", "accessRole": "reader"},
                {"id": "odd"}
            ]"#,
        )
        .unwrap();
        let calendars: Vec<Calendar> = calendars.into_iter().map(Calendar::from).collect();

        assert!(calendars[0].is_primary);
        assert!(calendars[0].access_role.can_write());
        assert!(!calendars[1].is_primary);
        assert!(!calendars[1].access_role.can_write());
        assert_eq!(calendars[2].summary, "");
        assert_eq!(calendars[2].access_role, AccessRole::Reader);
    }

    #[test]
    fn test_new_event_request_serialization() {
        let req = NewEventRequest {
            summary: "Gym".to_string(),
            description: None,
            start: RequestEventTime {
                date_time: "2024-10-04T17:00:00".to_string(),
                time_zone: "Europe/Helsinki".to_string(),
            },
            end: RequestEventTime {
                date_time: "2024-10-04T18:00:00".to_string(),
                time_zone: "Europe/Helsinki".to_string(),
            },
        };

        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["start"]["dateTime"], "2024-10-04T17:00:00");
        assert_eq!(value["end"]["timeZone"], "Europe/Helsinki");
        assert!(value.get("description").is_none());
    }
}
