//! CLI argument parsing for Caltally

use caltally_calendar::aggregate::DEFAULT_SUMMARY_LIMIT;
use caltally_calendar::{GroupColumn, DEFAULT_INTERVAL_MINUTES};
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Order of the event listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventOrder {
    /// As returned by the backend (newest first)
    Newest,
    /// Earliest start first
    Start,
}

/// Column of the unique-events table to sort by
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortColumn {
    Summary,
    Count,
    Hours,
}

impl From<SortColumn> for GroupColumn {
    fn from(column: SortColumn) -> Self {
        match column {
            SortColumn::Summary => GroupColumn::Summary,
            SortColumn::Count => GroupColumn::Count,
            SortColumn::Hours => GroupColumn::Hours,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "caltally")]
#[command(version)]
#[command(about = "Browse, tally and edit calendar events through a calendar backend", long_about = None)]
pub struct Cli {
    /// Backend base URL (overrides the configured one)
    #[arg(long = "api-url", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Print JSON instead of text tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List calendars
    Calendars {
        /// Read from the local cache instead of the backend
        #[arg(long)]
        offline: bool,
    },

    /// List events of a calendar with summary statistics
    Events(EventsArgs),

    /// Tally events by summary: count and total hours per summary
    Types(TypesArgs),

    /// Most common (or most recent) event summaries
    Popular {
        calendar: String,

        /// Number of summaries to show
        #[arg(short = 'n', long, default_value_t = DEFAULT_SUMMARY_LIMIT)]
        limit: usize,

        /// Most recently used summaries instead of most common
        #[arg(long)]
        recent: bool,
    },

    /// Create an event ending now (rounded) and lasting --hours
    Add(AddArgs),

    /// Change the summary of an event
    Rename {
        calendar: String,
        event: String,
        summary: String,
    },

    /// Delete an event
    Delete { calendar: String, event: String },

    /// Round a timestamp (default: now) to the nearest interval
    Round {
        /// Local date-time, YYYY-MM-DDTHH:MM
        timestamp: Option<String>,

        /// Interval in minutes (1-60)
        #[arg(short, long, default_value_t = DEFAULT_INTERVAL_MINUTES, allow_negative_numbers = true)]
        interval: i64,
    },
}

#[derive(Args, Debug)]
pub struct EventsArgs {
    pub calendar: String,

    /// Only events whose summary contains this text (case-insensitive)
    #[arg(short, long, default_value = "")]
    pub filter: String,

    /// Include events that have not started yet
    #[arg(long)]
    pub future: bool,

    /// Listing order
    #[arg(long, value_enum, default_value = "newest")]
    pub sort: EventOrder,

    /// Range start (UTC), YYYY-MM-DD or YYYY-MM-DDTHH:MM
    #[arg(long, value_name = "WHEN", requires = "to")]
    pub from: Option<String>,

    /// Range end (UTC), YYYY-MM-DD or YYYY-MM-DDTHH:MM
    #[arg(long, value_name = "WHEN", requires = "from")]
    pub to: Option<String>,

    /// Read from the local cache instead of the backend
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub offline: bool,
}

#[derive(Args, Debug)]
pub struct TypesArgs {
    pub calendar: String,

    /// Only events whose summary contains this text (case-insensitive)
    #[arg(short, long, default_value = "")]
    pub filter: String,

    /// Include events that have not started yet
    #[arg(long)]
    pub future: bool,

    /// Column to sort by
    #[arg(long, value_enum, default_value = "hours")]
    pub sort: SortColumn,

    /// Sort ascending instead of descending
    #[arg(long)]
    pub asc: bool,

    /// Read from the local cache instead of the backend
    #[arg(long)]
    pub offline: bool,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    pub calendar: String,

    /// Event summary (falls back to the saved draft)
    #[arg(short, long)]
    pub summary: Option<String>,

    /// Event description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Duration in hours (default from config)
    #[arg(long)]
    pub hours: Option<f64>,

    /// Rounding interval in minutes (default from config)
    #[arg(short, long, allow_negative_numbers = true)]
    pub interval: Option<i64>,

    /// End time instead of now, YYYY-MM-DDTHH:MM (still rounded)
    #[arg(long, value_name = "WHEN")]
    pub end: Option<String>,
}
