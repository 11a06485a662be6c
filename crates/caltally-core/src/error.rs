//! Application-level error taxonomy.
//!
//! Lower layers return their own errors (or `anyhow`); the binary sorts them
//! into [`AppError`] once, at the edge, to pick a terminal message.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("network: {0}")]
    Network(#[from] NetworkError),

    #[error("cache: {0}")]
    Cache(#[from] CacheError),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(anyhow::Error),
}

impl AppError {
    /// Sort an opaque error into a variant by its root type.
    pub fn classify(err: anyhow::Error) -> Self {
        let err = match err.downcast::<ConfigError>() {
            Ok(e) => return e.into(),
            Err(err) => err,
        };
        let err = match err.downcast::<rusqlite::Error>() {
            Ok(e) => return CacheError::from(e).into(),
            Err(err) => err,
        };
        let err = match err.downcast::<reqwest::Error>() {
            Ok(e) => return NetworkError::from(e).into(),
            Err(err) => err,
        };
        match err.downcast::<std::io::Error>() {
            Ok(e) => e.into(),
            Err(err) => AppError::Other(err),
        }
    }

    /// Message for the terminal.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(e) => e.user_message().to_string(),
            AppError::Cache(e) => e.user_message().to_string(),
            AppError::Config(e) => e.to_string(),
            AppError::Io(e) => format!("File operation failed: {}", e),
            AppError::Other(e) => format!("{:#}", e),
        }
    }
}

/// Talking to the calendar backend.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::Unreachable(_) => "Unable to reach the calendar backend. Is it running?",
            NetworkError::Timeout => "The calendar backend did not answer in time.",
            NetworkError::Status { status, .. } if *status >= 500 => {
                "The calendar backend is having trouble. Try again later."
            }
            NetworkError::Status { .. } => "The calendar backend rejected the request.",
            NetworkError::Malformed(_) => "The calendar backend sent something unreadable.",
        }
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return NetworkError::Timeout;
        }
        if let Some(status) = e.status() {
            return NetworkError::Status {
                status: status.as_u16(),
                message: e.to_string(),
            };
        }
        if e.is_decode() || e.is_body() {
            return NetworkError::Malformed(e.to_string());
        }
        NetworkError::Unreachable(e.to_string())
    }
}

/// The local SQLite cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cannot open cache: {0}")]
    Open(String),

    #[error("cache query failed: {0}")]
    Query(String),

    #[error("cache file is corrupt: {0}")]
    Corrupt(String),
}

impl CacheError {
    pub fn user_message(&self) -> &'static str {
        match self {
            CacheError::Open(_) => "The local event cache could not be opened.",
            CacheError::Query(_) => "Reading or writing the local event cache failed.",
            CacheError::Corrupt(_) => "The local event cache is damaged. Delete it to rebuild.",
        }
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match &e {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::CannotOpen | ErrorCode::PermissionDenied => {
                    CacheError::Open(e.to_string())
                }
                ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase => {
                    CacheError::Corrupt(e.to_string())
                }
                _ => CacheError::Query(e.to_string()),
            },
            _ => CacheError::Query(e.to_string()),
        }
    }
}

/// Loading or validating `config.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config directory available on this platform")]
    NoConfigDir,

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("cannot parse {path}: {message}")]
    Malformed { path: String, message: String },
}
