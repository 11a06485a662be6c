//! Grouping events by summary.
//!
//! Everything here is pure: callers filter first and pass the remaining
//! events in.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::types::Event;

/// Summary used for events that have none.
pub const UNTITLED_SUMMARY: &str = "Untitled Event";

/// How many summaries the popular/recent lists return by default.
pub const DEFAULT_SUMMARY_LIMIT: usize = 10;

/// Events sharing one summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventGroup {
    /// Summary of the first event seen with this key
    pub key: String,
    pub count: usize,
    /// Sum of member durations, rounded to 2 decimals
    pub total_hours: f64,
    /// Id of the first event seen with this key
    pub first_event_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupColumn {
    Summary,
    Count,
    #[default]
    Hours,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupSort {
    pub column: GroupColumn,
    pub ascending: bool,
}

impl Default for GroupSort {
    fn default() -> Self {
        Self {
            column: GroupColumn::Hours,
            ascending: false,
        }
    }
}

/// Round hours to 2 decimals, halves going up.
pub fn round_hours(hours: f64) -> f64 {
    let rounded = (hours * 100.0).round() / 100.0;
    // Avoid -0.0 sorting below 0.0
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

struct Accumulator<'a> {
    key: &'a str,
    first_event_id: &'a str,
    count: usize,
    hours: f64,
}

/// Group events by exact summary, most total hours first.
///
/// Groups with equal totals keep the order in which their summary first
/// appeared. Empty input gives an empty result.
pub fn aggregate_by_summary<'a, I>(events: I) -> Vec<EventGroup>
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut accumulators: Vec<Accumulator<'a>> = Vec::new();

    for event in events {
        let hours = event.duration_hours();
        match index.get(event.summary.as_str()) {
            Some(&i) => {
                let acc = &mut accumulators[i];
                acc.count += 1;
                acc.hours += hours;
            }
            None => {
                index.insert(event.summary.as_str(), accumulators.len());
                accumulators.push(Accumulator {
                    key: &event.summary,
                    first_event_id: &event.id,
                    count: 1,
                    hours,
                });
            }
        }
    }

    let mut groups: Vec<EventGroup> = accumulators
        .into_iter()
        .map(|acc| EventGroup {
            key: acc.key.to_string(),
            count: acc.count,
            total_hours: round_hours(acc.hours),
            first_event_id: acc.first_event_id.to_string(),
        })
        .collect();

    // sort_by is stable
    groups.sort_by(|a, b| b.total_hours.total_cmp(&a.total_hours));

    tracing::debug!("Aggregated events into {} groups", groups.len());
    groups
}

/// Re-sort groups by a table column.
pub fn sort_groups(groups: &mut [EventGroup], sort: GroupSort) {
    groups.sort_by(|a, b| {
        let ordering = match sort.column {
            GroupColumn::Summary => compare_summaries(&a.key, &b.key),
            GroupColumn::Count => a.count.cmp(&b.count),
            GroupColumn::Hours => a.total_hours.total_cmp(&b.total_hours),
        };
        if sort.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    });
}

fn compare_summaries(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn summary_or_untitled(event: &Event) -> &str {
    if event.summary.is_empty() {
        UNTITLED_SUMMARY
    } else {
        &event.summary
    }
}

/// The `limit` most frequent summaries with their counts.
///
/// Ties keep first-occurrence order.
pub fn most_common_summaries<'a, I>(events: I, limit: usize) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut counts: Vec<(&'a str, usize)> = Vec::new();

    for event in events {
        let summary = summary_or_untitled(event);
        match index.get(summary) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(summary, counts.len());
                counts.push((summary, 1));
            }
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(limit)
        .map(|(summary, count)| (summary.to_string(), count))
        .collect()
}

/// Up to `limit` distinct summaries, most recently started first.
pub fn recent_unique_summaries<'a, I>(events: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut by_recency: Vec<&Event> = events.into_iter().collect();
    by_recency.sort_by(|a, b| b.start.as_datetime().cmp(&a.start.as_datetime()));

    let mut summaries: Vec<String> = Vec::new();
    for event in by_recency {
        if summaries.len() == limit {
            break;
        }
        let summary = summary_or_untitled(event);
        if !summaries.iter().any(|s| s == summary) {
            summaries.push(summary.to_string());
        }
    }
    summaries
}
