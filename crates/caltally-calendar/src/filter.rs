//! Filtering and summary statistics for event lists.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::round_hours;
use crate::types::Event;

/// Summary text filter plus the future-events toggle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Case-insensitive substring of the summary; empty matches everything
    pub query: String,
    /// Keep events starting after `now`
    pub include_future: bool,
}

impl EventFilter {
    pub fn new(query: impl Into<String>, include_future: bool) -> Self {
        Self {
            query: query.into(),
            include_future,
        }
    }

    /// `now` is the time the events were fetched.
    pub fn matches(&self, event: &Event, now: DateTime<Utc>) -> bool {
        let matches_query = self.query.is_empty()
            || event
                .summary
                .to_lowercase()
                .contains(&self.query.to_lowercase());
        matches_query && (self.include_future || !event.is_future(now))
    }

    pub fn apply<'a>(&self, events: &'a [Event], now: DateTime<Utc>) -> Vec<&'a Event> {
        events.iter().filter(|e| self.matches(e, now)).collect()
    }
}

/// Order events by start, earliest first.
pub fn sort_by_start(events: &mut [&Event]) {
    events.sort_by_key(|e| e.start.as_datetime());
}

/// Header figures for an event listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventStats {
    /// Events passing the filter
    pub events: usize,
    /// Distinct summaries among them
    pub types: usize,
    /// Their total hours, rounded to 2 decimals
    pub hours: f64,
    /// Future events in the unfiltered list
    pub future: usize,
}

impl EventStats {
    pub fn collect(filtered: &[&Event], all: &[Event], now: DateTime<Utc>) -> Self {
        let types: HashSet<&str> = filtered.iter().map(|e| e.summary.as_str()).collect();
        let hours: f64 = filtered.iter().map(|e| e.duration_hours()).sum();

        Self {
            events: filtered.len(),
            types: types.len(),
            hours: round_hours(hours),
            future: all.iter().filter(|e| e.is_future(now)).count(),
        }
    }
}
