use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Environment variable that overrides `backend.api_url`.
pub const BACKEND_URL_ENV: &str = "CALTALLY_BACKEND_URL";

/// One problem found in a config field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Dotted TOML path, e.g. `backend.api_url`
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors make a config unusable; warnings are only logged.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigIssue>,
    pub warnings: Vec<ConfigIssue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(ConfigIssue {
            field,
            message: message.into(),
        });
    }

    fn warn(&mut self, field: &'static str, message: impl Into<String>) {
        self.warnings.push(ConfigIssue {
            field,
            message: message.into(),
        });
    }

    /// All errors on one line, `; `-separated.
    pub fn error_summary(&self) -> String {
        let parts: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        parts.join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Default tracing filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Calendar backend proxy
    pub backend: BackendConfig,

    /// Defaults for new events
    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Local event cache
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend API, including the `/api` prefix
    pub api_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Granularity used when rounding default event times
    #[serde(default = "default_round_interval")]
    pub round_interval_minutes: i64,

    /// Length of a new event when none is given
    #[serde(default = "default_duration_hours")]
    pub default_duration_hours: f64,

    /// IANA zone name sent along with new events
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            round_interval_minutes: default_round_interval(),
            default_duration_hours: default_duration_hours(),
            time_zone: default_time_zone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// How long a notification stays visible
    #[serde(default = "default_dismiss_after_ms")]
    pub dismiss_after_ms: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            dismiss_after_ms: default_dismiss_after_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// SQLite file name, relative to the config directory
    #[serde(default = "default_cache_file")]
    pub file_name: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            file_name: default_cache_file(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_round_interval() -> i64 {
    15
}

fn default_duration_hours() -> f64 {
    1.0
}

fn default_time_zone() -> String {
    "Europe/Helsinki".to_string()
}

fn default_dismiss_after_ms() -> u64 {
    5000
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_file() -> String {
    "caltally.db".to_string()
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("caltally");

        Self {
            config_dir,
            log_level: default_log_level(),
            backend: BackendConfig {
                api_url: "http://localhost:5000/api".to_string(),
                timeout_secs: default_timeout_secs(),
            },
            events: EventsConfig::default(),
            notifications: NotificationsConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from an explicit path, writing defaults there if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).map_err(|e| ConfigError::Malformed {
            path: config_path.display().to_string(),
            message: e.message().to_string(),
        })?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                tracing::debug!("Backend URL overridden from {}", BACKEND_URL_ENV);
                self.backend.api_url = url;
            }
        }
    }

    /// Check field ranges and the backend URL.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if let Err(message) = check_backend_url(&self.backend.api_url) {
            result.error("backend.api_url", message);
        }
        if self.backend.timeout_secs == 0 {
            result.error("backend.timeout_secs", "must be at least 1 second");
        }

        let interval = self.events.round_interval_minutes;
        if !(1..=60).contains(&interval) {
            result.error(
                "events.round_interval_minutes",
                format!("must be between 1 and 60, got {}", interval),
            );
        }

        match self.events.default_duration_hours {
            h if !h.is_finite() || h <= 0.0 => {
                result.error("events.default_duration_hours", "must be a positive number")
            }
            h if h > 24.0 => result.warn(
                "events.default_duration_hours",
                format!("{} hours is longer than a day", h),
            ),
            _ => {}
        }

        if self.events.time_zone.trim().is_empty() {
            result.error("events.time_zone", "must name a time zone");
        }

        if self.notifications.dismiss_after_ms == 0 {
            result.warn(
                "notifications.dismiss_after_ms",
                "0 hides notifications as soon as they appear",
            );
        }

        if self.cache.enabled && self.cache.file_name.trim().is_empty() {
            result.error("cache.file_name", "must not be empty while the cache is enabled");
        }

        result
    }

    /// Path of the SQLite cache file
    pub fn cache_path(&self) -> PathBuf {
        self.config_dir.join(&self.cache.file_name)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("caltally");

        Ok(config_dir.join("config.toml"))
    }
}

/// The backend must be an absolute http(s) URL with a host.
fn check_backend_url(raw: &str) -> std::result::Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("not a URL ({})", e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("scheme must be http or https, got {}", url.scheme()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err("missing host".to_string());
    }
    if url.port() == Some(0) {
        return Err("port 0 is not usable".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.backend.api_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "backend.api_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.backend.api_url = "ftp://localhost:5000/api".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_interval_out_of_range() {
        let mut config = Config::default();
        config.events.round_interval_minutes = 0;
        assert!(!config.validate().is_valid());

        config.events.round_interval_minutes = 61;
        assert!(!config.validate().is_valid());

        config.events.round_interval_minutes = 60;
        assert!(config.validate().is_valid());
    }

    #[test]
    fn test_long_duration_is_warning() {
        let mut config = Config::default();
        config.events.default_duration_hours = 36.0;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.field == "events.default_duration_hours"));
    }

    #[test]
    fn test_non_positive_duration() {
        let mut config = Config::default();
        config.events.default_duration_hours = 0.0;
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_error_summary_joins_all_errors() {
        let mut config = Config::default();
        config.backend.timeout_secs = 0;
        config.events.time_zone = " ".to_string();

        let summary = config.validate().error_summary();
        assert_eq!(
            summary,
            "backend.timeout_secs: must be at least 1 second; events.time_zone: must name a time zone"
        );
    }

    #[test]
    fn test_zero_dismissal_is_warning() {
        let mut config = Config::default();
        config.notifications.dismiss_after_ms = 0;
        let result = config.validate();
        assert!(result.is_valid());
        assert_eq!(result.warnings[0].field, "notifications.dismiss_after_ms");
    }

    #[test]
    fn test_load_from_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.events.round_interval_minutes, 15);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.backend.api_url, config.backend.api_url);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
config_dir = "/tmp/caltally"

[backend]
api_url = "https://calendar.example.com/api"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(config.events.time_zone, "Europe/Helsinki");
        assert_eq!(config.notifications.dismiss_after_ms, 5000);
        assert!(config.cache.enabled);
        assert_eq!(config.cache_path(), PathBuf::from("/tmp/caltally/caltally.db"));
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[backend\napi_url = 3").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        match err.downcast_ref::<ConfigError>() {
            Some(ConfigError::Malformed { path: reported, .. }) => {
                assert!(reported.ends_with("config.toml"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
