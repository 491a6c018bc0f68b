//! Downloader configuration.
//!
//! Every field has a default, so an empty TOML file (or none at all) gives
//! the stock behavior: Gate.io v4, history from 2020-01-01, 5 attempts with
//! 30 s between them, 100 ms between windows, 24 h merge freshness.

use crate::data::gateio::GATEIO_BASE_URL;
use crate::data::retry::RetryPolicy;
use crate::data::window::MAX_PAGE_RECORDS;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Retry settings for transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per window, including the first.
    pub max_attempts: u32,
    /// Seconds to wait between attempts.
    pub delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            delay_secs: policy.delay.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Base directory; data lands in `{destination_dir}/gateio_data`.
    pub destination_dir: PathBuf,

    /// REST API base URL.
    pub base_url: String,

    /// First day fetched when no start date is given (UTC midnight).
    pub history_start: NaiveDate,

    pub request_timeout_secs: u64,

    /// Pause after each fetched window.
    pub throttle_ms: u64,

    /// Combined files younger than this many hours are not rebuilt.
    pub merge_max_age_hours: u64,

    /// Candlesticks per request window (exchange cap is 2000).
    pub page_limit: u32,

    pub retry: RetryConfig,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            destination_dir: PathBuf::from("."),
            base_url: GATEIO_BASE_URL.to_string(),
            history_start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            request_timeout_secs: 30,
            throttle_ms: 100,
            merge_max_age_hours: 24,
            page_limit: MAX_PAGE_RECORDS,
            retry: RetryConfig::default(),
        }
    }
}

impl DownloaderConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_limit == 0 || self.page_limit > MAX_PAGE_RECORDS {
            return Err(ConfigError::Invalid(format!(
                "page_limit must be between 1 and {MAX_PAGE_RECORDS}, got {}",
                self.page_limit
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".into()));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            delay: Duration::from_secs(self.retry.delay_secs),
        }
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn merge_max_age(&self) -> Duration {
        Duration::from_secs(self.merge_max_age_hours.saturating_mul(60 * 60))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn history_start_utc(&self) -> DateTime<Utc> {
        self.history_start.and_time(chrono::NaiveTime::MIN).and_utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_exchange_behavior() {
        let config = DownloaderConfig::default();
        assert_eq!(config.base_url, "https://api.gateio.ws/api/v4");
        assert_eq!(config.page_limit, 2000);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.throttle(), Duration::from_millis(100));
        assert_eq!(config.merge_max_age(), Duration::from_secs(86_400));
        assert_eq!(config.history_start_utc().timestamp(), 1_577_836_800);
    }

    #[test]
    fn empty_toml_is_default() {
        let config = DownloaderConfig::from_toml("").unwrap();
        assert_eq!(config, DownloaderConfig::default());
    }

    #[test]
    fn partial_toml_overrides() {
        let config = DownloaderConfig::from_toml(
            r#"
destination_dir = "/srv/market"
history_start = "2023-06-01"
throttle_ms = 250

[retry]
delay_secs = 5
"#,
        )
        .unwrap();
        assert_eq!(config.destination_dir, PathBuf::from("/srv/market"));
        assert_eq!(config.history_start, NaiveDate::from_ymd_opt(2023, 6, 1).unwrap());
        assert_eq!(config.throttle_ms, 250);
        assert_eq!(config.retry.delay_secs, 5);
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn rejects_page_limit_above_exchange_cap() {
        let err = DownloaderConfig::from_toml("page_limit = 5000").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = DownloaderConfig::from_toml("throttle_ms = \"fast\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn toml_roundtrip() {
        let config = DownloaderConfig::default();
        let parsed = DownloaderConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = DownloaderConfig::from_file(Path::new("/nonexistent/gatebulk.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn huge_merge_age_saturates() {
        let config = DownloaderConfig::from_toml(&format!("merge_max_age_hours = {}", i64::MAX))
            .unwrap();
        assert_eq!(config.merge_max_age(), Duration::from_secs(u64::MAX));
    }
}
