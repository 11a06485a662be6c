//! Client for the calendar backend proxy.
//!
//! The backend exposes calendars and events under one base URL (normally
//! ending in `/api`) and reports failures as Mason error documents.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use tracing::instrument;

use crate::error::CalendarError;
use crate::retry::{with_retry, RetryConfig};
use crate::types::*;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000/api";

/// Time window for listing events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl EventRange {
    /// # Errors
    ///
    /// [`CalendarError::InvalidEvent`] if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, CalendarError> {
        if start > end {
            return Err(CalendarError::InvalidEvent(
                "Start date is after the end date".to_string(),
            ));
        }
        Ok(Self { start, end })
    }
}

#[derive(Debug, Deserialize)]
struct MasonErrorBody {
    #[serde(rename = "@error")]
    error: MasonError,
}

#[derive(Debug, Deserialize)]
struct MasonError {
    #[serde(rename = "@message")]
    message: String,
    #[serde(rename = "@messages", default)]
    messages: Vec<String>,
}

pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
}

impl BackendClient {
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CalendarError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryConfig::default(),
        })
    }

    /// Replace the retry policy used for reads.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/events/{}",
            self.base_url,
            urlencoding::encode(calendar_id)
        )
    }

    fn event_url(&self, calendar_id: &str, event_id: &str) -> String {
        format!(
            "{}/{}",
            self.events_url(calendar_id),
            urlencoding::encode(event_id)
        )
    }

    /// List all calendars.
    #[instrument(skip(self), level = "info")]
    pub async fn list_calendars(&self) -> Result<Vec<Calendar>, CalendarError> {
        let url = format!("{}/calendars", self.base_url);

        let response = with_retry(self.retry.clone(), || self.client.get(&url).send()).await?;

        let calendars: Vec<ApiCalendar> =
            self.handle_response(response, CalendarError::CalendarNotFound).await?;
        tracing::info!("Found {} calendars", calendars.len());
        Ok(calendars.into_iter().map(Calendar::from).collect())
    }

    /// List events from a calendar, newest first as the backend returns them.
    ///
    /// Events without a usable start time are skipped.
    #[instrument(skip(self), level = "info")]
    pub async fn list_events(
        &self,
        calendar_id: &str,
        range: Option<EventRange>,
    ) -> Result<Vec<Event>, CalendarError> {
        let mut url = self.events_url(calendar_id);

        if let Some(range) = range {
            url.push_str(&format!(
                "?start_date={}&end_date={}",
                urlencoding::encode(&range.start.to_rfc3339_opts(SecondsFormat::Secs, true)),
                urlencoding::encode(&range.end.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ));
        }

        let response = with_retry(self.retry.clone(), || self.client.get(&url).send()).await?;

        let api_events: Vec<ApiEvent> = self
            .handle_response(response, CalendarError::CalendarNotFound)
            .await?;

        let total = api_events.len();
        let events: Vec<Event> = api_events
            .into_iter()
            .filter_map(|api| match Event::from_api(api, calendar_id) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!("Skipping event: {}", e);
                    None
                }
            })
            .collect();

        tracing::info!("Fetched {} of {} events from {}", events.len(), total, calendar_id);
        Ok(events)
    }

    /// Get a single event.
    #[instrument(skip(self), level = "info")]
    pub async fn get_event(
        &self,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<Event, CalendarError> {
        let url = self.event_url(calendar_id, event_id);

        let response = with_retry(self.retry.clone(), || self.client.get(&url).send()).await?;

        let api_event: ApiEvent = self
            .handle_response(response, CalendarError::EventNotFound)
            .await?;
        Event::from_api(api_event, calendar_id)
    }

    /// Create a new event.
    #[instrument(skip(self), level = "info")]
    pub async fn create_event(
        &self,
        calendar_id: &str,
        request: &NewEventRequest,
    ) -> Result<Event, CalendarError> {
        let url = self.events_url(calendar_id);

        let response = self.client.post(&url).json(request).send().await?;

        let api_event: ApiEvent = self
            .handle_response(response, CalendarError::CalendarNotFound)
            .await?;
        let event = Event::from_api(api_event, calendar_id)?;
        tracing::info!("Event created successfully: {}", event.id);
        Ok(event)
    }

    /// Update an existing event's summary.
    #[instrument(skip(self), level = "info")]
    pub async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        request: &UpdateEventRequest,
    ) -> Result<Event, CalendarError> {
        let url = self.event_url(calendar_id, event_id);

        let response = self.client.put(&url).json(request).send().await?;

        let api_event: ApiEvent = self
            .handle_response(response, CalendarError::EventNotFound)
            .await?;
        Event::from_api(api_event, calendar_id)
    }

    /// Delete an event.
    #[instrument(skip(self), level = "info")]
    pub async fn delete_event(
        &self,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<(), CalendarError> {
        let url = self.event_url(calendar_id, event_id);

        let response = self.client.delete(&url).send().await?;

        if response.status().is_success() {
            tracing::info!("Event with ID {} deleted successfully", event_id);
            Ok(())
        } else {
            Err(Self::error_for(response, CalendarError::EventNotFound).await)
        }
    }

    /// Helper to handle API responses and errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
        not_found: fn(String) -> CalendarError,
    ) -> Result<T, CalendarError> {
        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| CalendarError::Decode(e.to_string()))
        } else {
            Err(Self::error_for(response, not_found).await)
        }
    }

    async fn error_for(
        response: reqwest::Response,
        not_found: fn(String) -> CalendarError,
    ) -> CalendarError {
        let status = response.status();
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        let text = response.text().await.unwrap_or_default();
        let detail = describe_error_body(&text);

        match status.as_u16() {
            400 | 415 => CalendarError::InvalidEvent(detail),
            404 => not_found(detail),
            409 => CalendarError::Conflict,
            429 => CalendarError::RateLimited { retry_after },
            code => CalendarError::Backend {
                status: code,
                message: detail,
            },
        }
    }
}

/// Pull title and first message out of a Mason error body, or return the text as is.
fn describe_error_body(text: &str) -> String {
    match serde_json::from_str::<MasonErrorBody>(text) {
        Ok(body) => match body.error.messages.first() {
            Some(message) => format!("{}: {}", body.error.message, message),
            None => body.error.message,
        },
        Err(_) => text.to_string(),
    }
}
