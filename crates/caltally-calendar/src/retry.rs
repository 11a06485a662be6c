//! Backoff for idempotent backend reads.
//!
//! Only GET requests go through here. A transient outcome (timeout, refused
//! connection, 5xx, 408, 429) is repeated with doubling delays; anything else
//! is handed straight back to the caller.

use std::future::Future;
use std::time::Duration;

use reqwest::{Response, StatusCode};

/// How often and how patiently to repeat a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Extra attempts after the first one
    pub max_retries: u32,
    /// Wait before the first retry; doubles for each one after
    pub initial_delay: Duration,
    /// Upper bound for any single wait
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3, 100, 5_000)
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }

    /// Wait before retry `n` (0 is the first retry).
    pub fn backoff(&self, n: u32) -> Duration {
        let doubled = self
            .initial_delay
            .checked_mul(2u32.saturating_pow(n))
            .unwrap_or(self.max_delay);
        doubled.min(self.max_delay)
    }
}

/// Whether a response status is worth asking for again.
pub fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

/// Whether a transport failure is worth asking for again.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    if error.is_timeout() || error.is_connect() {
        return true;
    }
    if error.is_request() || error.is_builder() {
        return false;
    }
    error.status().is_some_and(is_transient_status)
}

fn is_transient(outcome: &Result<Response, reqwest::Error>) -> bool {
    match outcome {
        Ok(response) => is_transient_status(response.status()),
        Err(e) => is_transient_error(e),
    }
}

/// Send a request built by `send`, repeating transient failures.
///
/// When retries run out the last outcome is returned unchanged, so a
/// persistent 5xx still reaches the caller as a response.
///
/// ```ignore
/// let response = with_retry(RetryConfig::default(), || client.get(&url).send()).await?;
/// ```
pub async fn with_retry<F, Fut>(
    config: RetryConfig,
    send: F,
) -> Result<Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let mut outcome = send().await;

    for retry in 0..config.max_retries {
        if !is_transient(&outcome) {
            break;
        }

        let wait = config.backoff(retry);
        match &outcome {
            Ok(response) => tracing::warn!(
                status = %response.status(),
                "Transient status, retry {}/{} in {:?}",
                retry + 1,
                config.max_retries,
                wait
            ),
            Err(e) => tracing::warn!(
                error = %e,
                "Transient failure, retry {}/{} in {:?}",
                retry + 1,
                config.max_retries,
                wait
            ),
        }

        tokio::time::sleep(wait).await;
        outcome = send().await;
    }

    if is_transient(&outcome) && config.max_retries > 0 {
        tracing::error!("Giving up after {} attempts", config.max_retries + 1);
    }
    outcome
}
