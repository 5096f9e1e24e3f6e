//! Error types for RSSGrid.

use thiserror::Error;

/// Common error type for RSSGrid.
#[derive(Error, Debug)]
pub enum RssGridError {
    /// The feed could not be retrieved.
    ///
    /// Covers transport failures, timeouts, unexpected HTTP status codes,
    /// oversized bodies and blocked hosts.
    #[error("failed to fetch {url}: {reason}")]
    Fetch {
        /// URL of the feed that failed.
        url: String,
        /// Underlying cause.
        reason: String,
    },

    /// The feed document could not be parsed.
    #[error("failed to parse feed: {0}")]
    Parse(String),

    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),
}

impl RssGridError {
    /// Build a fetch error for the given feed URL.
    pub fn fetch(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        RssGridError::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<sqlx::Error> for RssGridError {
    fn from(e: sqlx::Error) -> Self {
        RssGridError::Database(e.to_string())
    }
}

/// Result type alias for RSSGrid operations.
pub type Result<T> = std::result::Result<T, RssGridError>;
