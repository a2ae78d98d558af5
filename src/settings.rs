//! Limiter-wide settings.
//!
//! Every field has a default, so an empty JSON object is a valid settings
//! document.
//!
//! ```
//! use callgate::LimiterSettings;
//!
//! let settings = LimiterSettings::from_json(r#"{
//!     "global_limit": 500,
//!     "identifiers": {
//!         "search": { "max_requests": 30, "time_window_ms": 60000, "priority": "low" }
//!     }
//! }"#).unwrap();
//!
//! assert_eq!(settings.global_limit, 500);
//! assert_eq!(settings.global_window_ms, 60_000);
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::{BackoffPolicy, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX};
use crate::config::RateLimitConfig;
use crate::error::{ConfigError, Result};
use crate::global::{DEFAULT_GLOBAL_LIMIT, DEFAULT_GLOBAL_WINDOW};
use crate::registry::ConfigRegistry;
use crate::sweeper::{DEFAULT_MAX_IDLE, DEFAULT_SWEEP_INTERVAL, SweepConfig};

/// Settings for a [`RateLimiter`](crate::RateLimiter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterSettings {
    /// Aggregate ceiling across all identifiers.
    pub global_limit: u32,
    /// Window of the aggregate ceiling.
    pub global_window_ms: u64,
    /// Backoff unit.
    pub backoff_base_ms: u64,
    /// Backoff cap.
    pub backoff_max_ms: u64,
    /// How often the background sweeper runs.
    pub sweep_interval_ms: u64,
    /// Idle time after which an entry may be reclaimed.
    pub max_idle_ms: u64,
    /// Whether to install the default provider classes before `identifiers`.
    pub install_defaults: bool,
    /// Config for unregistered identifiers.
    pub fallback: RateLimitConfig,
    /// Additional or overriding per-identifier configs.
    pub identifiers: HashMap<String, RateLimitConfig>,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            global_limit: DEFAULT_GLOBAL_LIMIT,
            global_window_ms: DEFAULT_GLOBAL_WINDOW.as_millis() as u64,
            backoff_base_ms: DEFAULT_BACKOFF_BASE.as_millis() as u64,
            backoff_max_ms: DEFAULT_BACKOFF_MAX.as_millis() as u64,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL.as_millis() as u64,
            max_idle_ms: DEFAULT_MAX_IDLE.as_millis() as u64,
            install_defaults: true,
            fallback: RateLimitConfig::fallback(),
            identifiers: HashMap::new(),
        }
    }
}

impl LimiterSettings {
    /// Parse and validate a JSON settings document.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that would disable or break admission control.
    pub fn validate(&self) -> Result<()> {
        if self.global_limit == 0 {
            return invalid("global_limit must be greater than 0");
        }
        if self.global_window_ms == 0 {
            return invalid("global_window_ms must be non-zero");
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return invalid("backoff_base_ms must not exceed backoff_max_ms");
        }
        if self.sweep_interval_ms == 0 {
            return invalid("sweep_interval_ms must be non-zero");
        }
        if self.max_idle_ms == 0 {
            return invalid("max_idle_ms must be non-zero");
        }
        Ok(())
    }

    /// Window of the aggregate ceiling.
    pub fn global_window(&self) -> Duration {
        Duration::from_millis(self.global_window_ms)
    }

    /// Backoff escalation parameters.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }

    /// Sweeper parameters.
    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig {
            interval: Duration::from_millis(self.sweep_interval_ms),
            max_idle: Duration::from_millis(self.max_idle_ms),
        }
    }

    /// Build the config registry these settings describe.
    pub fn build_registry(&self) -> ConfigRegistry {
        let registry = ConfigRegistry::with_fallback(self.fallback);
        if self.install_defaults {
            registry.install_defaults();
        }
        for (identifier, config) in &self.identifiers {
            registry.register(identifier.clone(), *config);
        }
        registry
    }
}

fn invalid(msg: &str) -> Result<()> {
    Err(ConfigError::InvalidSettings(msg.into()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Priority;
    use crate::error::RateLimitError;

    #[test]
    fn test_empty_document_gives_defaults() {
        let settings = LimiterSettings::from_json("{}").unwrap();
        assert_eq!(settings, LimiterSettings::default());
        assert_eq!(settings.global_limit, 1000);
        assert_eq!(settings.global_window(), Duration::from_secs(60));
        assert_eq!(settings.backoff_policy(), BackoffPolicy::default());
        assert_eq!(settings.sweep_config().interval, Duration::from_secs(300));
        assert_eq!(settings.sweep_config().max_idle, Duration::from_secs(3600));
    }

    #[test]
    fn test_identifiers_override_defaults() {
        let settings = LimiterSettings::from_json(
            r#"{
                "identifiers": {
                    "openai": { "max_requests": 5, "time_window_ms": 1000 },
                    "search": { "max_requests": 30, "time_window_ms": 60000, "priority": "low" }
                }
            }"#,
        )
        .unwrap();

        let registry = settings.build_registry();
        assert_eq!(registry.get("openai"), Some(RateLimitConfig::per_second(5)));
        assert_eq!(registry.get("search").unwrap().priority(), Priority::Low);
        assert!(registry.contains("anthropic"));
    }

    #[test]
    fn test_without_defaults() {
        let settings = LimiterSettings::from_json(
            r#"{ "install_defaults": false, "fallback": { "max_requests": 2, "time_window_ms": 1000 } }"#,
        )
        .unwrap();

        let registry = settings.build_registry();
        assert!(registry.is_empty());
        assert_eq!(registry.resolve("openai"), RateLimitConfig::per_second(2));
    }

    #[test]
    fn test_validation_failures() {
        for json in [
            r#"{ "global_limit": 0 }"#,
            r#"{ "global_window_ms": 0 }"#,
            r#"{ "backoff_base_ms": 10, "backoff_max_ms": 5 }"#,
            r#"{ "sweep_interval_ms": 0 }"#,
            r#"{ "max_idle_ms": 0 }"#,
        ] {
            let err = LimiterSettings::from_json(json).unwrap_err();
            assert!(
                matches!(err, RateLimitError::Config(ConfigError::InvalidSettings(_))),
                "{} should be rejected as invalid settings",
                json
            );
        }
    }

    #[test]
    fn test_malformed_json() {
        let err = LimiterSettings::from_json(r#"{ "global_limit": "many" }"#).unwrap_err();
        assert!(matches!(err, RateLimitError::Settings(_)));

        let err = LimiterSettings::from_json(
            r#"{ "identifiers": { "x": { "max_requests": 0, "time_window_ms": 1000 } } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, RateLimitError::Settings(_)));
    }
}
