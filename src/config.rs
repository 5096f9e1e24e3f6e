//! Configuration module for RSSGrid.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{Result, RssGridError};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "rssgrid.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/rssgrid.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Feed refresh configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Interval between refresh batches in seconds.
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// Cache lifetime used when the server sends neither Expires nor max-age.
    #[serde(default = "default_cache_ttl")]
    pub default_cache_ttl_secs: u64,
    /// Number of feeds refreshed concurrently within a batch.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// User-Agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Allow fetching from loopback and private network addresses.
    #[serde(default)]
    pub allow_private_hosts: bool,
}

fn default_update_interval() -> u64 {
    1800 // 30 minutes
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_cache_ttl() -> u64 {
    crate::feed::DEFAULT_CACHE_TTL_SECS
}

fn default_max_concurrent_fetches() -> usize {
    1
}

fn default_user_agent() -> String {
    "RSSGrid/1.0".to_string()
}

impl FeedConfig {
    /// Interval between refresh batches.
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    /// Total request timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Connection timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Cache lifetime used when a response carries no freshness headers.
    pub fn default_cache_ttl(&self) -> chrono::Duration {
        i64::try_from(self.default_cache_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(|| chrono::Duration::seconds(crate::feed::DEFAULT_CACHE_TTL_SECS as i64))
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval(),
            fetch_timeout_secs: default_fetch_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
            default_cache_ttl_secs: default_cache_ttl(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            user_agent: default_user_agent(),
            allow_private_hosts: false,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Feed refresh configuration.
    #[serde(default)]
    pub feeds: FeedConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(RssGridError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RssGridError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `RSSGRID_DB_PATH`: database file path
    /// - `RSSGRID_LOG_LEVEL`: log level
    /// - `RSSGRID_UPDATE_INTERVAL_SECS`: refresh interval in seconds
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("RSSGRID_DB_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
        if let Ok(level) = std::env::var("RSSGRID_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
        if let Ok(interval) = std::env::var("RSSGRID_UPDATE_INTERVAL_SECS") {
            match interval.parse() {
                Ok(secs) => self.feeds.update_interval_secs = secs,
                Err(_) => tracing::warn!(
                    value = %interval,
                    "ignoring invalid RSSGRID_UPDATE_INTERVAL_SECS"
                ),
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let feeds = &self.feeds;
        if feeds.update_interval_secs == 0 {
            return Err(RssGridError::Config(
                "feeds.update_interval_secs must be greater than 0".to_string(),
            ));
        }
        if feeds.fetch_timeout_secs == 0 {
            return Err(RssGridError::Config(
                "feeds.fetch_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if feeds.max_concurrent_fetches == 0 {
            return Err(RssGridError::Config(
                "feeds.max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        if feeds.max_feed_size_bytes == 0 {
            return Err(RssGridError::Config(
                "feeds.max_feed_size_bytes must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, "rssgrid.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/rssgrid.log");
        assert_eq!(config.feeds.update_interval_secs, 1800);
        assert_eq!(config.feeds.fetch_timeout_secs, 30);
        assert_eq!(config.feeds.connect_timeout_secs, 10);
        assert_eq!(config.feeds.max_redirects, 5);
        assert_eq!(config.feeds.max_feed_size_bytes, 5 * 1024 * 1024);
        assert_eq!(config.feeds.default_cache_ttl_secs, 3600);
        assert_eq!(config.feeds.max_concurrent_fetches, 1);
        assert_eq!(config.feeds.user_agent, "RSSGrid/1.0");
        assert!(!config.feeds.allow_private_hosts);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.database.path, "rssgrid.db");
        assert_eq!(config.feeds.update_interval(), Duration::from_secs(1800));
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[database]
path = "/var/lib/rssgrid/feeds.db"

[feeds]
update_interval_secs = 600
max_concurrent_fetches = 4
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.database.path, "/var/lib/rssgrid/feeds.db");
        assert_eq!(config.feeds.update_interval_secs, 600);
        assert_eq!(config.feeds.max_concurrent_fetches, 4);
        // Unspecified values keep their defaults
        assert_eq!(config.feeds.fetch_timeout_secs, 30);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = Config::parse("[feeds\nupdate_interval_secs = ");
        assert!(matches!(result, Err(RssGridError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.feeds.update_interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("update_interval_secs"));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.feeds.max_concurrent_fetches = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_cache_ttl() {
        let mut feeds = FeedConfig::default();
        assert_eq!(feeds.default_cache_ttl(), chrono::Duration::hours(1));

        feeds.default_cache_ttl_secs = 300;
        assert_eq!(feeds.default_cache_ttl(), chrono::Duration::minutes(5));

        // Out of range falls back to one hour
        feeds.default_cache_ttl_secs = u64::MAX;
        assert_eq!(feeds.default_cache_ttl(), chrono::Duration::hours(1));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/rssgrid/config.toml");
        assert!(matches!(result, Err(RssGridError::Io(_))));
    }
}
