//! Error types for configuration and settings.
//!
//! Admission decisions never produce errors: a denial is an ordinary
//! [`Decision`](crate::Decision). Errors only arise while building a
//! [`RateLimitConfig`](crate::RateLimitConfig) or loading
//! [`LimiterSettings`](crate::LimiterSettings).

use thiserror::Error;

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, RateLimitError>;

/// Main error type for the crate.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Settings document could not be parsed.
    #[error("Settings parse error: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid per-identifier rate limit configuration.
    #[error("Invalid rate limit config: {0}")]
    InvalidConfig(String),

    /// Missing required configuration.
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Invalid limiter-wide settings.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}
