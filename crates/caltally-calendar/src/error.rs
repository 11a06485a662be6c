//! Errors raised by the calendar layer.

use thiserror::Error;

use crate::rounding::RoundingError;

#[derive(Error, Debug)]
pub enum CalendarError {
    /// Rejected by the rounder before any computation
    #[error(transparent)]
    InvalidArgument(#[from] RoundingError),

    /// Draft, input or payload the backend (or we) refuse to accept
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("event not found: {0}")]
    EventNotFound(String),

    #[error("calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("event changed on the server")]
    Conflict,

    #[error("rate limited by backend, retry in {retry_after}s")]
    RateLimited { retry_after: u64 },

    /// Any other non-success status, with the backend's own description
    #[error("backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("unreadable backend response: {0}")]
    Decode(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl CalendarError {
    /// Message for the terminal.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidArgument(e) => e.to_string(),
            Self::InvalidEvent(reason) => format!("Invalid event: {}", reason),
            Self::EventNotFound(_) => "Event not found".to_string(),
            Self::CalendarNotFound(_) => "Calendar not found".to_string(),
            Self::Conflict => "The event was changed elsewhere. Fetch it again first.".to_string(),
            Self::RateLimited { retry_after } => {
                format!("The backend is busy. Try again in {} seconds.", retry_after)
            }
            Self::Backend { status, message } if *status >= 500 => {
                format!("The calendar backend failed ({}): {}", status, message)
            }
            Self::Backend { message, .. } => format!("Request rejected: {}", message),
            Self::Decode(_) => "The backend sent a response that could not be read".to_string(),
            Self::Transport(_) => {
                "Could not reach the calendar backend. Is it running?".to_string()
            }
        }
    }

    /// HTTP status behind the error, when the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::EventNotFound(_) | Self::CalendarNotFound(_) => Some(404),
            Self::Conflict => Some(409),
            Self::RateLimited { .. } => Some(429),
            Self::Backend { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether repeating the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Transport(_) => true,
            Self::Backend { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
