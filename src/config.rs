//! Per-identifier rate limit configuration.
//!
//! A `RateLimitConfig` defines the steady-state quota for one identifier:
//! how many requests are admitted per sliding window, how many extra burst
//! credits are available, and which priority class scales the quota.
//!
//! # Examples
//!
//! ```
//! use callgate::{Priority, RateLimitConfig};
//! use std::time::Duration;
//!
//! // 60 requests per minute
//! let config = RateLimitConfig::per_minute(60);
//!
//! // 60 per minute, 10 burst credits, high priority
//! let config = RateLimitConfig::per_minute(60)
//!     .with_burst(10)
//!     .with_priority(Priority::High);
//!
//! // Custom: 50 requests per 30 seconds
//! let config = RateLimitConfig::new(50, Duration::from_secs(30));
//! assert_eq!(config.refill_interval(), Duration::from_millis(600));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Priority class of an identifier.
///
/// Scales the effective limit: `High` by 1.2, `Low` by 0.8.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Cost-heavy operations, quota scaled down.
    Low,
    /// Unscaled.
    #[default]
    Normal,
    /// Provider calls and realtime traffic, quota scaled up.
    High,
}

impl Priority {
    /// Quota multiplier as an exact `(numerator, denominator)` ratio.
    pub fn scale(self) -> (u64, u64) {
        match self {
            Self::Low => (4, 5),
            Self::Normal => (1, 1),
            Self::High => (6, 5),
        }
    }
}

/// Rate limit configuration for a single identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ConfigRepr", into = "ConfigRepr")]
pub struct RateLimitConfig {
    max_requests: u32,
    time_window: Duration,
    burst_allowance: Option<u32>,
    priority: Priority,
}

impl RateLimitConfig {
    /// Create a new config with the given steady-state quota and window.
    ///
    /// # Panics
    ///
    /// Panics if `max_requests` is 0 or `time_window` is zero.
    pub fn new(max_requests: u32, time_window: Duration) -> Self {
        assert!(max_requests > 0, "max_requests must be greater than 0");
        assert!(!time_window.is_zero(), "time_window must be non-zero");

        Self {
            max_requests,
            time_window,
            burst_allowance: None,
            priority: Priority::Normal,
        }
    }

    /// Try to create a new config, returning an error if invalid.
    pub fn try_new(max_requests: u32, time_window: Duration) -> Result<Self> {
        validate(max_requests, time_window)?;
        Ok(Self::new(max_requests, time_window))
    }

    /// `n` requests per second.
    pub fn per_second(n: u32) -> Self {
        Self::new(n, Duration::from_secs(1))
    }

    /// `n` requests per minute.
    pub fn per_minute(n: u32) -> Self {
        Self::new(n, Duration::from_secs(60))
    }

    /// `n` requests per hour.
    pub fn per_hour(n: u32) -> Self {
        Self::new(n, Duration::from_secs(3600))
    }

    /// Set the burst allowance. Zero disables burst gating.
    pub fn with_burst(mut self, burst: u32) -> Self {
        self.burst_allowance = Some(burst);
        self
    }

    /// Set the priority class.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Steady-state quota per window.
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Sliding window length.
    pub fn time_window(&self) -> Duration {
        self.time_window
    }

    /// Configured burst allowance, if any.
    pub fn burst_allowance(&self) -> Option<u32> {
        self.burst_allowance
    }

    /// Upper bound for burst tokens (`0` when no allowance is configured).
    pub fn burst_capacity(&self) -> u32 {
        self.burst_allowance.unwrap_or(0)
    }

    /// Whether burst gating applies: an allowance greater than zero is configured.
    pub fn has_burst(&self) -> bool {
        self.burst_allowance.is_some_and(|burst| burst > 0)
    }

    /// Priority class.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Interval at which one burst token trickles back in: `time_window / max_requests`.
    pub fn refill_interval(&self) -> Duration {
        self.time_window / self.max_requests
    }

    /// The conservative config applied to unregistered identifiers.
    pub fn fallback() -> Self {
        Self::per_minute(30)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::fallback()
    }
}

fn validate(max_requests: u32, time_window: Duration) -> Result<()> {
    if max_requests == 0 {
        return Err(ConfigError::InvalidConfig("max_requests must be greater than 0".into()).into());
    }
    if time_window.is_zero() {
        return Err(ConfigError::InvalidConfig("time_window must be non-zero".into()).into());
    }
    Ok(())
}

/// Serialized form: the window is carried as whole milliseconds.
#[derive(Serialize, Deserialize)]
struct ConfigRepr {
    max_requests: u32,
    time_window_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    burst_allowance: Option<u32>,
    #[serde(default)]
    priority: Priority,
}

impl TryFrom<ConfigRepr> for RateLimitConfig {
    type Error = ConfigError;

    fn try_from(repr: ConfigRepr) -> std::result::Result<Self, Self::Error> {
        if repr.max_requests == 0 {
            return Err(ConfigError::InvalidConfig("max_requests must be greater than 0".into()));
        }
        if repr.time_window_ms == 0 {
            return Err(ConfigError::InvalidConfig("time_window_ms must be non-zero".into()));
        }
        Ok(Self {
            max_requests: repr.max_requests,
            time_window: Duration::from_millis(repr.time_window_ms),
            burst_allowance: repr.burst_allowance,
            priority: repr.priority,
        })
    }
}

impl From<RateLimitConfig> for ConfigRepr {
    fn from(config: RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            time_window_ms: config.time_window.as_millis() as u64,
            burst_allowance: config.burst_allowance,
            priority: config.priority,
        }
    }
}

/// Builder for creating configs with validation.
#[derive(Debug, Default)]
pub struct RateLimitConfigBuilder {
    max_requests: Option<u32>,
    time_window: Option<Duration>,
    burst_allowance: Option<u32>,
    priority: Option<Priority>,
}

impl RateLimitConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the steady-state quota.
    pub fn max_requests(mut self, n: u32) -> Self {
        self.max_requests = Some(n);
        self
    }

    /// Set the window length.
    pub fn time_window(mut self, window: Duration) -> Self {
        self.time_window = Some(window);
        self
    }

    /// Set the burst allowance.
    pub fn burst_allowance(mut self, n: u32) -> Self {
        self.burst_allowance = Some(n);
        self
    }

    /// Set the priority class.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Build the config, returning an error if invalid.
    pub fn build(self) -> Result<RateLimitConfig> {
        let max_requests = self
            .max_requests
            .ok_or_else(|| ConfigError::MissingRequired("max_requests".into()))?;
        let time_window = self
            .time_window
            .ok_or_else(|| ConfigError::MissingRequired("time_window".into()))?;

        let mut config = RateLimitConfig::try_new(max_requests, time_window)?;
        config.burst_allowance = self.burst_allowance;
        config.priority = self.priority.unwrap_or_default();

        Ok(config)
    }
}
