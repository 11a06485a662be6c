//! Calendar event tallying for Caltally.
//!
//! Provides interval rounding, per-summary aggregation, event filtering,
//! draft construction, the backend proxy client and an offline cache.

pub mod aggregate;
pub mod cache;
pub mod client;
pub mod draft;
pub mod error;
pub mod filter;
pub mod retry;
pub mod rounding;
pub mod types;

pub use aggregate::{
    aggregate_by_summary, most_common_summaries, recent_unique_summaries, sort_groups,
    EventGroup, GroupColumn, GroupSort,
};
pub use cache::{CalendarCache, FormDraft};
pub use client::{BackendClient, EventRange};
pub use draft::{format_event_time, format_for_input, parse_input, EventDraft};
pub use error::CalendarError;
pub use filter::{sort_by_start, EventFilter, EventStats};
pub use retry::RetryConfig;
pub use rounding::{round_now, round_to_nearest_interval, RoundingError, DEFAULT_INTERVAL_MINUTES};
pub use types::{
    AccessRole, Calendar, Event, EventTime, NewEventRequest, RequestEventTime,
    UpdateEventRequest,
};
