//! Text and JSON rendering for command results.

use std::io::{self, Write};

use caltally_calendar::{format_event_time, Calendar, Event, EventGroup, EventStats};
use caltally_core::{Notification, NotificationKind};
use serde::Serialize;

/// Write `value` as pretty JSON followed by a newline.
pub fn write_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}

pub fn write_calendars<W: Write>(out: &mut W, calendars: &[Calendar]) -> io::Result<()> {
    if calendars.is_empty() {
        return writeln!(out, "No calendars.");
    }
    writeln!(out, "ID\tSUMMARY\tACCESS")?;
    for calendar in calendars {
        let marker = if calendar.is_primary { " *" } else { "" };
        writeln!(
            out,
            "{}\t{}{}\t{}",
            calendar.id,
            calendar.summary,
            marker,
            calendar.access_role.as_str()
        )?;
    }
    Ok(())
}

/// Event rows followed by the stats line.
pub fn write_events<W: Write>(out: &mut W, events: &[&Event], stats: &EventStats) -> io::Result<()> {
    writeln!(
        out,
        "Events: {}  Types: {}  Hours: {:.2}  Future: {}",
        stats.events, stats.types, stats.hours, stats.future
    )?;
    if events.is_empty() {
        return writeln!(out, "No events found.");
    }
    writeln!(out, "START\tEND\tHOURS\tSUMMARY\tID")?;
    for event in events {
        writeln!(
            out,
            "{}\t{}\t{:.2}\t{}\t{}",
            format_event_time(event.start.naive_local()),
            format_event_time(event.end.naive_local()),
            event.duration_hours(),
            event.summary,
            event.id
        )?;
    }
    Ok(())
}

pub fn write_groups<W: Write>(out: &mut W, groups: &[EventGroup]) -> io::Result<()> {
    if groups.is_empty() {
        return writeln!(out, "No events found.");
    }
    writeln!(out, "SUMMARY\tCOUNT\tHOURS")?;
    for group in groups {
        writeln!(out, "{}\t{}\t{:.2}", group.key, group.count, group.total_hours)?;
    }
    Ok(())
}

pub fn write_counts<W: Write>(out: &mut W, counts: &[(String, usize)]) -> io::Result<()> {
    for (summary, count) in counts {
        writeln!(out, "{}\t{}", count, summary)?;
    }
    Ok(())
}

pub fn write_summaries<W: Write>(out: &mut W, summaries: &[String]) -> io::Result<()> {
    for summary in summaries {
        writeln!(out, "{}", summary)?;
    }
    Ok(())
}

pub fn write_notification<W: Write>(out: &mut W, notification: &Notification) -> io::Result<()> {
    let prefix = match notification.kind {
        NotificationKind::Success => "ok",
        NotificationKind::Error => "error",
        NotificationKind::Default => "info",
    };
    writeln!(out, "[{}] {}", prefix, notification.message)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use caltally_calendar::{AccessRole, EventTime};
    use chrono::{DateTime, FixedOffset};

    fn rendered(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn at(s: &str) -> EventTime {
        EventTime::DateTime(DateTime::<FixedOffset>::parse_from_rfc3339(s).unwrap())
    }

    #[test]
    fn test_write_groups() {
        let groups = vec![
            EventGroup {
                key: "Gym".to_string(),
                count: 2,
                total_hours: 2.5,
                first_event_id: "e1".to_string(),
            },
            EventGroup {
                key: "Reading".to_string(),
                count: 1,
                total_hours: 0.33,
                first_event_id: "e2".to_string(),
            },
        ];

        let text = rendered(|out| write_groups(out, &groups));
        assert_eq!(text, "SUMMARY\tCOUNT\tHOURS\nGym\t2\t2.50\nReading\t1\t0.33\n");
    }

    #[test]
    fn test_write_events_uses_event_offset() {
        let event = Event {
            id: "e1".to_string(),
            calendar_id: "primary".to_string(),
            summary: "Gym".to_string(),
            description: None,
            location: None,
            start: at("2024-10-04T17:00:00+03:00"),
            end: at("2024-10-04T18:30:00+03:00"),
            html_link: None,
        };
        let stats = EventStats {
            events: 1,
            types: 1,
            hours: 1.5,
            future: 0,
        };

        let text = rendered(|out| write_events(out, &[&event], &stats));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Events: 1  Types: 1  Hours: 1.50  Future: 0");
        assert_eq!(
            lines[2],
            "Fri 04.10.2024 17:00\tFri 04.10.2024 18:30\t1.50\tGym\te1"
        );
    }

    #[test]
    fn test_write_calendars_marks_primary() {
        let calendars = vec![Calendar {
            id: "primary".to_string(),
            summary: "Personal".to_string(),
            description: None,
            time_zone: None,
            background_color: None,
            is_primary: true,
            access_role: AccessRole::Owner,
        }];

        let text = rendered(|out| write_calendars(out, &calendars));
        assert!(text.contains("primary\tPersonal *\towner"));
    }

    #[test]
    fn test_write_json_groups() {
        let groups = vec![EventGroup {
            key: "Gym".to_string(),
            count: 1,
            total_hours: 1.0,
            first_event_id: "e1".to_string(),
        }];
        let text = rendered(|out| write_json(out, &groups));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["key"], "Gym");
        assert_eq!(value[0]["total_hours"], 1.0);
    }

    #[test]
    fn test_write_notification() {
        let notification = Notification {
            message: "Event created successfully".to_string(),
            kind: NotificationKind::Success,
        };
        let text = rendered(|out| write_notification(out, &notification));
        assert_eq!(text, "[ok] Event created successfully\n");
    }
}
