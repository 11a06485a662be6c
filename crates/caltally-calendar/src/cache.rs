//! SQLite-backed offline cache for calendars, fetched events and the form draft.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::types::{AccessRole, Calendar, Event, EventTime};

/// Summary and description typed into the new-event form but not yet sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormDraft {
    pub summary: String,
    pub description: String,
}

impl FormDraft {
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.description.is_empty()
    }
}

/// SQLite cache for calendar data.
pub struct CalendarCache {
    conn: Connection,
}

impl CalendarCache {
    /// Open (or create) the cache at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let cache = Self { conn };
        cache.init_schema()?;
        Ok(cache)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.init_schema()?;
        Ok(cache)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS calendars (
                id TEXT PRIMARY KEY,
                position INTEGER NOT NULL,
                summary TEXT NOT NULL,
                description TEXT,
                time_zone TEXT,
                background_color TEXT,
                is_primary INTEGER NOT NULL,
                access_role TEXT NOT NULL,
                cached_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS events (
                id TEXT NOT NULL,
                calendar_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                summary TEXT NOT NULL,
                description TEXT,
                location TEXT,
                start_at TEXT NOT NULL,
                end_at TEXT NOT NULL,
                all_day INTEGER NOT NULL,
                html_link TEXT,
                cached_at INTEGER NOT NULL,
                PRIMARY KEY (id, calendar_id)
            );

            CREATE TABLE IF NOT EXISTS form_draft (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                summary TEXT NOT NULL,
                description TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_calendar ON events(calendar_id, position);
            "#,
        )?;
        Ok(())
    }

    /// Replace the cached calendar list.
    pub fn store_calendars(&mut self, calendars: &[Calendar]) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM calendars", [])?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO calendars
                (id, position, summary, description, time_zone, background_color, is_primary, access_role, cached_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )?;
            for (position, calendar) in calendars.iter().enumerate() {
                stmt.execute(params![
                    calendar.id,
                    position as i64,
                    calendar.summary,
                    calendar.description,
                    calendar.time_zone,
                    calendar.background_color,
                    calendar.is_primary as i32,
                    calendar.access_role.as_str(),
                    now,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!("Cached {} calendars", calendars.len());
        Ok(())
    }

    /// List cached calendars in the order they were stored.
    pub fn list_calendars(&self) -> Result<Vec<Calendar>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, summary, description, time_zone, background_color, is_primary, access_role FROM calendars ORDER BY position",
        )?;

        let rows = stmt.query_map([], |row| {
            let role: String = row.get(6)?;
            Ok(Calendar {
                id: row.get(0)?,
                summary: row.get(1)?,
                description: row.get(2)?,
                time_zone: row.get(3)?,
                background_color: row.get(4)?,
                is_primary: row.get::<_, i32>(5)? != 0,
                access_role: AccessRole::parse(&role),
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Failed to read calendars: {}", e))
    }

    /// Replace everything cached for `calendar_id` with `events`, keeping their order.
    pub fn store_events(&mut self, calendar_id: &str, events: &[Event]) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM events WHERE calendar_id = ?1",
            params![calendar_id],
        )?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO events
                (id, calendar_id, position, summary, description, location, start_at, end_at, all_day, html_link, cached_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )?;
            for (position, event) in events.iter().enumerate() {
                stmt.execute(params![
                    event.id,
                    calendar_id,
                    position as i64,
                    event.summary,
                    event.description,
                    event.location,
                    encode_time(&event.start),
                    encode_time(&event.end),
                    event.start.is_all_day() as i32,
                    event.html_link,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!("Cached {} events for {}", events.len(), calendar_id);
        Ok(())
    }

    /// Cached events for `calendar_id`, in the order they were fetched.
    pub fn list_events(&self, calendar_id: &str) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, calendar_id, summary, description, location, start_at, end_at, html_link
            FROM events
            WHERE calendar_id = ?1
            ORDER BY position ASC
            "#,
        )?;

        let rows = stmt.query_map(params![calendar_id], Self::row_to_event)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Failed to read events: {}", e))
    }

    /// When events for `calendar_id` were last stored, if ever.
    pub fn events_cached_at(&self, calendar_id: &str) -> Result<Option<DateTime<Utc>>> {
        let millis: Option<i64> = self.conn.query_row(
            "SELECT MAX(cached_at) FROM events WHERE calendar_id = ?1",
            params![calendar_id],
            |row| row.get(0),
        )?;
        Ok(millis.and_then(DateTime::from_timestamp_millis))
    }

    /// Replace a single cached event, appending it if it is new.
    pub fn upsert_event(&self, event: &Event) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        self.conn.execute(
            r#"
            INSERT INTO events
            (id, calendar_id, position, summary, description, location, start_at, end_at, all_day, html_link, cached_at)
            VALUES (?1, ?2,
                (SELECT COALESCE(MIN(position), 0) - 1 FROM events WHERE calendar_id = ?2),
                ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id, calendar_id) DO UPDATE SET
                summary = excluded.summary,
                description = excluded.description,
                location = excluded.location,
                start_at = excluded.start_at,
                end_at = excluded.end_at,
                all_day = excluded.all_day,
                html_link = excluded.html_link,
                cached_at = excluded.cached_at
            "#,
            params![
                event.id,
                event.calendar_id,
                event.summary,
                event.description,
                event.location,
                encode_time(&event.start),
                encode_time(&event.end),
                event.start.is_all_day() as i32,
                event.html_link,
                now,
            ],
        )?;
        Ok(())
    }

    /// Delete an event from the cache.
    pub fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM events WHERE id = ?1 AND calendar_id = ?2",
            params![event_id, calendar_id],
        )?;
        Ok(())
    }

    /// Persist the form draft. An empty draft removes the stored one.
    pub fn save_draft(&self, draft: &FormDraft) -> Result<()> {
        if draft.is_empty() {
            return self.clear_draft();
        }
        self.conn.execute(
            "INSERT OR REPLACE INTO form_draft (id, summary, description) VALUES (1, ?1, ?2)",
            params![draft.summary, draft.description],
        )?;
        Ok(())
    }

    pub fn load_draft(&self) -> Result<Option<FormDraft>> {
        let draft = self
            .conn
            .query_row(
                "SELECT summary, description FROM form_draft WHERE id = 1",
                [],
                |row| {
                    Ok(FormDraft {
                        summary: row.get(0)?,
                        description: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(draft)
    }

    pub fn clear_draft(&self) -> Result<()> {
        self.conn.execute("DELETE FROM form_draft", [])?;
        Ok(())
    }

    /// Clear all cached data.
    pub fn clear(&self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM events; DELETE FROM calendars; DELETE FROM form_draft;")?;
        Ok(())
    }

    fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<Event> {
        let start: String = row.get(5)?;
        let end: String = row.get(6)?;

        let start = decode_time(&start).map_err(|e| conversion_error(5, e))?;
        let end = decode_time(&end).map_err(|e| conversion_error(6, e))?;

        Ok(Event {
            id: row.get(0)?,
            calendar_id: row.get(1)?,
            summary: row.get(2)?,
            description: row.get(3)?,
            location: row.get(4)?,
            start,
            end,
            html_link: row.get(7)?,
        })
    }
}

// Timed events keep their offset as RFC 3339; all-day events are a bare date.
fn encode_time(time: &EventTime) -> String {
    match time {
        EventTime::DateTime(dt) => dt.to_rfc3339(),
        EventTime::Date(d) => d.format("%Y-%m-%d").to_string(),
    }
}

fn decode_time(text: &str) -> Result<EventTime, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(text) {
        Ok(dt) => Ok(EventTime::DateTime(dt)),
        Err(_) => NaiveDate::parse_from_str(text, "%Y-%m-%d").map(EventTime::Date),
    }
}

fn conversion_error(column: usize, e: chrono::ParseError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
}
