//! Subcommand execution.

use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use caltally_calendar::{
    aggregate_by_summary, format_for_input, most_common_summaries, parse_input,
    recent_unique_summaries, round_to_nearest_interval, sort_by_start, sort_groups,
    BackendClient, CalendarCache, CalendarError, Event, EventDraft, EventFilter, EventRange,
    EventStats, FormDraft, GroupSort, UpdateEventRequest,
};
use caltally_core::{AppError, Config, Notifier};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::cli::{AddArgs, Command, EventOrder, EventsArgs, TypesArgs};
use crate::output;

#[derive(Serialize)]
struct EventListing<'a> {
    stats: &'a EventStats,
    events: &'a [&'a Event],
}

#[derive(Serialize)]
struct SummaryCount {
    summary: String,
    count: usize,
}

#[derive(Serialize)]
struct Rounded {
    input: String,
    interval_minutes: i64,
    rounded: String,
}

/// Everything a command needs: config, backend client, cache and notifier.
pub struct App {
    config: Config,
    client: BackendClient,
    cache: Option<CalendarCache>,
    notifier: Notifier,
    json: bool,
}

impl App {
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built. A cache that cannot be
    /// opened is logged and skipped.
    pub fn new(config: Config, json: bool) -> Result<Self> {
        let client = BackendClient::new(
            &config.backend.api_url,
            Duration::from_secs(config.backend.timeout_secs),
        )?;

        let cache = if config.cache.enabled {
            match open_cache(&config) {
                Ok(cache) => Some(cache),
                Err(e) => {
                    tracing::warn!("Local cache unavailable: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        let notifier = Notifier::new(Duration::from_millis(config.notifications.dismiss_after_ms));

        Ok(Self {
            config,
            client,
            cache,
            notifier,
            json,
        })
    }

    /// Run `command`, reporting failures through the notifier.
    pub async fn execute(mut self, command: Command) -> ExitCode {
        match self.dispatch(command).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                tracing::debug!("Command failed: {:?}", err);
                self.notifier.error(user_message(err));
                if let Some(notification) = self.notifier.current() {
                    if let Err(e) = output::write_notification(&mut io::stderr().lock(), &notification) {
                        tracing::debug!("Failed to write notification: {}", e);
                    }
                }
                ExitCode::FAILURE
            }
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Calendars { offline } => self.calendars(offline).await,
            Command::Events(args) => self.events(args).await,
            Command::Types(args) => self.types(args).await,
            Command::Popular {
                calendar,
                limit,
                recent,
            } => self.popular(&calendar, limit, recent).await,
            Command::Add(args) => self.add(args).await,
            Command::Rename {
                calendar,
                event,
                summary,
            } => self.rename(&calendar, &event, &summary).await,
            Command::Delete { calendar, event } => self.delete(&calendar, &event).await,
            Command::Round {
                timestamp,
                interval,
            } => self.round(timestamp.as_deref(), interval),
        }
    }

    async fn calendars(&mut self, offline: bool) -> Result<()> {
        let calendars = if offline {
            self.cache()?.list_calendars()?
        } else {
            let calendars = self.client.list_calendars().await?;
            if let Some(cache) = self.cache.as_mut() {
                log_cache_failure(cache.store_calendars(&calendars));
            }
            calendars
        };

        self.emit(&calendars, |out| output::write_calendars(out, &calendars))
    }

    async fn events(&mut self, args: EventsArgs) -> Result<()> {
        let range = match (&args.from, &args.to) {
            (Some(from), Some(to)) => Some(EventRange::new(
                parse_range_bound(from, false)?,
                parse_range_bound(to, true)?,
            )?),
            _ => None,
        };

        let (events, fetched_at) = self.load_events(&args.calendar, range, args.offline).await?;

        let filter = EventFilter::new(args.filter, args.future);
        let mut filtered = filter.apply(&events, fetched_at);
        if args.sort == EventOrder::Start {
            sort_by_start(&mut filtered);
        }
        let stats = EventStats::collect(&filtered, &events, fetched_at);

        let listing = EventListing {
            stats: &stats,
            events: &filtered,
        };
        self.emit(&listing, |out| output::write_events(out, &filtered, &stats))
    }

    async fn types(&mut self, args: TypesArgs) -> Result<()> {
        let (events, fetched_at) = self.load_events(&args.calendar, None, args.offline).await?;

        let filter = EventFilter::new(args.filter, args.future);
        let filtered = filter.apply(&events, fetched_at);

        let mut groups = aggregate_by_summary(filtered.iter().copied());
        sort_groups(
            &mut groups,
            GroupSort {
                column: args.sort.into(),
                ascending: args.asc,
            },
        );

        self.emit(&groups, |out| output::write_groups(out, &groups))
    }

    async fn popular(&mut self, calendar_id: &str, limit: usize, recent: bool) -> Result<()> {
        let (events, _) = self.load_events(calendar_id, None, false).await?;

        if recent {
            let summaries = recent_unique_summaries(&events, limit);
            self.emit(&summaries, |out| output::write_summaries(out, &summaries))
        } else {
            let counts = most_common_summaries(&events, limit);
            let rows: Vec<SummaryCount> = counts
                .iter()
                .map(|(summary, count)| SummaryCount {
                    summary: summary.clone(),
                    count: *count,
                })
                .collect();
            self.emit(&rows, |out| output::write_counts(out, &counts))
        }
    }

    async fn add(&mut self, args: AddArgs) -> Result<()> {
        let saved = match self.cache.as_ref() {
            Some(cache) => cache.load_draft()?.unwrap_or_default(),
            None => FormDraft::default(),
        };
        let form = FormDraft {
            summary: args.summary.clone().unwrap_or(saved.summary),
            description: args.description.clone().unwrap_or(saved.description),
        };

        let event = match self.create_from_form(&args, &form).await {
            Ok(event) => event,
            Err(e) => {
                // Keep what was typed for the next attempt
                if let Some(cache) = self.cache.as_ref() {
                    log_cache_failure(cache.save_draft(&form));
                }
                return Err(e.into());
            }
        };

        if let Some(cache) = self.cache.as_ref() {
            log_cache_failure(cache.clear_draft());
            log_cache_failure(cache.upsert_event(&event));
        }

        self.notifier.success("Event created successfully");
        self.emit_with_notification(&event)
    }

    async fn create_from_form(
        &self,
        args: &AddArgs,
        form: &FormDraft,
    ) -> Result<Event, CalendarError> {
        let reference = match args.end.as_deref() {
            Some(end) => parse_input(end)?,
            None => Local::now().naive_local(),
        };
        let interval = args
            .interval
            .unwrap_or(self.config.events.round_interval_minutes);
        let hours = args
            .hours
            .unwrap_or(self.config.events.default_duration_hours);

        let draft = EventDraft::with_defaults(reference, interval, hours, &self.config.events.time_zone)?
            .with_summary(form.summary.clone())
            .with_description(form.description.clone());
        draft.validate(&args.calendar)?;

        self.client
            .create_event(&args.calendar, &draft.to_request())
            .await
    }

    async fn rename(&mut self, calendar_id: &str, event_id: &str, summary: &str) -> Result<()> {
        if summary.trim().is_empty() {
            return Err(CalendarError::InvalidEvent("Summary is required".to_string()).into());
        }

        let request = UpdateEventRequest {
            summary: summary.trim().to_string(),
        };
        let event = self
            .client
            .update_event(calendar_id, event_id, &request)
            .await?;

        if let Some(cache) = self.cache.as_ref() {
            log_cache_failure(cache.upsert_event(&event));
        }

        self.notifier.success("Event updated successfully");
        self.emit_with_notification(&event)
    }

    async fn delete(&mut self, calendar_id: &str, event_id: &str) -> Result<()> {
        self.client.delete_event(calendar_id, event_id).await?;

        if let Some(cache) = self.cache.as_ref() {
            log_cache_failure(cache.delete_event(calendar_id, event_id));
        }

        self.notifier.success("Event deleted successfully");
        match self.notifier.current() {
            Some(notification) => self.emit(&notification, |out| {
                output::write_notification(out, &notification)
            }),
            None => Ok(()),
        }
    }

    fn round(&self, timestamp: Option<&str>, interval: i64) -> Result<()> {
        let (input, rounded) = match timestamp {
            Some(text) => {
                let input = parse_input(text)?;
                (
                    input,
                    round_to_nearest_interval(input, interval).map_err(CalendarError::from)?,
                )
            }
            None => {
                let now = Local::now().naive_local();
                (
                    now,
                    round_to_nearest_interval(now, interval).map_err(CalendarError::from)?,
                )
            }
        };

        let result = Rounded {
            input: input.format("%Y-%m-%dT%H:%M:%S").to_string(),
            interval_minutes: interval,
            rounded: format_for_input(rounded),
        };
        self.emit(&result, |out| writeln!(out, "{}", result.rounded))
    }

    /// Events for a calendar plus the instant they count as fetched at.
    async fn load_events(
        &mut self,
        calendar_id: &str,
        range: Option<EventRange>,
        offline: bool,
    ) -> Result<(Vec<Event>, DateTime<Utc>)> {
        if offline {
            let cache = self.cache()?;
            let events = cache.list_events(calendar_id)?;
            let cached_at = cache
                .events_cached_at(calendar_id)?
                .unwrap_or_else(Utc::now);
            tracing::info!(
                "Using {} cached events for {} from {}",
                events.len(),
                calendar_id,
                cached_at
            );
            return Ok((events, cached_at));
        }

        let events = self.client.list_events(calendar_id, range).await?;
        let fetched_at = Utc::now();

        // A ranged fetch is partial, so it must not replace the cached listing
        if range.is_none() {
            if let Some(cache) = self.cache.as_mut() {
                log_cache_failure(cache.store_events(calendar_id, &events));
            }
        }

        Ok((events, fetched_at))
    }

    fn cache(&self) -> Result<&CalendarCache> {
        match self.cache.as_ref() {
            Some(cache) => Ok(cache),
            None => bail!("The local cache is disabled or unavailable"),
        }
    }

    fn emit<T: Serialize + ?Sized>(
        &self,
        value: &T,
        text: impl FnOnce(&mut io::StdoutLock<'static>) -> io::Result<()>,
    ) -> Result<()> {
        let mut out = io::stdout().lock();
        if self.json {
            output::write_json(&mut out, value)?;
        } else {
            text(&mut out)?;
        }
        out.flush()?;
        Ok(())
    }

    fn emit_with_notification(&self, event: &Event) -> Result<()> {
        let notification = self.notifier.current();
        self.emit(event, |out| {
            if let Some(notification) = &notification {
                output::write_notification(out, notification)?;
            }
            writeln!(
                out,
                "{}\t{}\t{:.2}h\t{}",
                event.id,
                caltally_calendar::format_event_time(event.start.naive_local()),
                event.duration_hours(),
                event.summary
            )
        })
    }
}

fn open_cache(config: &Config) -> Result<CalendarCache> {
    std::fs::create_dir_all(&config.config_dir).context("Failed to create cache directory")?;
    CalendarCache::new(config.cache_path())
}

fn log_cache_failure(result: Result<()>) {
    if let Err(e) = result {
        tracing::warn!("Failed to update local cache: {:#}", e);
    }
}

/// `YYYY-MM-DD` covers the whole day; anything else goes through [`parse_input`].
fn parse_range_bound(text: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
        let time = if end_of_day {
            NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
        } else {
            NaiveTime::MIN
        };
        return Ok(date.and_time(time).and_utc());
    }
    Ok(parse_input(text)?.and_utc())
}

/// Message for the terminal. Calendar errors carry their own; anything
/// else is classified by its root type.
pub fn user_message(err: anyhow::Error) -> String {
    match err.downcast::<CalendarError>() {
        Ok(CalendarError::Transport(e)) => AppError::Network(e.into()).user_message(),
        Ok(e) => e.user_message(),
        Err(err) => AppError::classify(err).user_message(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use caltally_calendar::RoundingError;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app_in(dir: &tempfile::TempDir, api_url: &str) -> App {
        let mut config = Config {
            config_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        config.backend.api_url = api_url.to_string();
        App::new(config, false).unwrap()
    }

    fn add_args(summary: Option<&str>) -> AddArgs {
        AddArgs {
            calendar: "primary".to_string(),
            summary: summary.map(str::to_string),
            description: None,
            hours: Some(1.0),
            interval: Some(15),
            end: Some("2024-10-04T17:53".to_string()),
        }
    }

    fn saved_draft(app: &App) -> Option<FormDraft> {
        app.cache.as_ref().unwrap().load_draft().unwrap()
    }

    #[test]
    fn test_parse_range_bound_dates_cover_whole_day() {
        let start = parse_range_bound("2024-10-01", false).unwrap();
        let end = parse_range_bound("2024-10-31", true).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-10-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-10-31T23:59:59+00:00");
    }

    #[test]
    fn test_parse_range_bound_datetime() {
        let bound = parse_range_bound("2024-10-01T08:30", true).unwrap();
        assert_eq!(bound.to_rfc3339(), "2024-10-01T08:30:00+00:00");
        assert!(parse_range_bound("yesterday", false).is_err());
    }

    #[test]
    fn test_user_message_for_calendar_errors() {
        let err = anyhow::Error::new(CalendarError::InvalidEvent(
            "Select a calendar first".to_string(),
        ));
        assert_eq!(user_message(err), "Invalid event: Select a calendar first");

        let err = anyhow::Error::new(CalendarError::from(RoundingError::InvalidArgument(
            "interval minutes must be between 1 and 60".to_string(),
        )));
        assert!(user_message(err).contains("between 1 and 60"));
    }

    #[test]
    fn test_user_message_for_other_errors() {
        let err = anyhow::anyhow!("The local cache is disabled or unavailable");
        assert_eq!(
            user_message(err),
            "The local cache is disabled or unavailable"
        );
    }

    #[tokio::test]
    async fn test_round_command_validates_interval() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            config_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let app = App::new(config, true).unwrap();

        assert!(app.round(Some("2024-10-04T17:53"), 15).is_ok());
        let err = app.round(Some("2024-10-04T17:53"), 0).unwrap_err();
        assert!(err.downcast_ref::<CalendarError>().is_some());
    }

    #[tokio::test]
    async fn test_offline_without_cache_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config {
            config_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        config.cache.enabled = false;
        let mut app = App::new(config, false).unwrap();

        let result = app.load_events("primary", None, true).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_round_command_without_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(&dir, "http://localhost:5000/api");
        assert!(app.round(None, 15).is_ok());
    }

    #[tokio::test]
    async fn test_add_keeps_draft_on_bad_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(&dir, "http://localhost:5000/api");

        let mut args = add_args(Some("Gym"));
        args.interval = Some(0);
        assert!(app.add(args).await.is_err());

        let draft = saved_draft(&app).unwrap();
        assert_eq!(draft.summary, "Gym");
    }

    #[tokio::test]
    async fn test_add_keeps_draft_on_bad_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(&dir, "http://localhost:5000/api");

        let mut args = add_args(Some("Gym"));
        args.description = Some("Legs".to_string());
        args.end = Some("tomorrow-ish".to_string());
        let err = app.add(args).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CalendarError>(),
            Some(CalendarError::InvalidEvent(_))
        ));

        let draft = saved_draft(&app).unwrap();
        assert_eq!(draft.summary, "Gym");
        assert_eq!(draft.description, "Legs");
    }

    #[tokio::test]
    async fn test_add_keeps_draft_when_backend_rejects() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/events/primary"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "@error": {"@message": "Bad Request", "@messages": ["Invalid event"]}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(&dir, &format!("{}/api", mock_server.uri()));

        assert!(app.add(add_args(Some("Gym"))).await.is_err());
        assert_eq!(saved_draft(&app).unwrap().summary, "Gym");
    }

    #[tokio::test]
    async fn test_add_uses_saved_draft_and_clears_it_on_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/events/primary"))
            .and(body_partial_json(serde_json::json!({
                "summary": "Gym",
                "description": "Legs",
                "end": {"dateTime": "2024-10-04T18:00:00"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "new1",
                "summary": "Gym",
                "description": "Legs",
                "start": {"dateTime": "2024-10-04T17:00:00+03:00"},
                "end": {"dateTime": "2024-10-04T18:00:00+03:00"}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(&dir, &format!("{}/api", mock_server.uri()));
        app.cache
            .as_ref()
            .unwrap()
            .save_draft(&FormDraft {
                summary: "Gym".to_string(),
                description: "Legs".to_string(),
            })
            .unwrap();

        app.add(add_args(None)).await.unwrap();

        assert_eq!(saved_draft(&app), None);
        let cached = app.cache.as_ref().unwrap().list_events("primary").unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, "new1");
    }
}
