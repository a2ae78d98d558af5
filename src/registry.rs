//! Registry of per-identifier configurations.
//!
//! The `ConfigRegistry` maps an identifier (a provider name or operation
//! class) to its [`RateLimitConfig`]. Identifiers can be registered at any
//! time; unknown identifiers resolve to a conservative fallback rather than
//! failing, so a configuration gap never takes down the caller.
//!
//! # Example
//!
//! ```
//! use callgate::{ConfigRegistry, RateLimitConfig};
//!
//! let registry = ConfigRegistry::with_defaults();
//! registry.register("search", RateLimitConfig::per_minute(30));
//!
//! assert!(registry.get("openai").is_some());
//! assert_eq!(registry.resolve("unknown").max_requests(), 30);
//! ```

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

use crate::config::{Priority, RateLimitConfig};

/// Identifiers installed by [`ConfigRegistry::with_defaults`].
pub mod defaults {
    /// OpenAI chat/completions.
    pub const OPENAI: &str = "openai";
    /// Anthropic messages.
    pub const ANTHROPIC: &str = "anthropic";
    /// Google Gemini.
    pub const GEMINI: &str = "gemini";
    /// Per-caller hourly budget across all features.
    pub const GLOBAL: &str = "global";
    /// Cost-heavy operations (report generation, large exports).
    pub const EXPENSIVE: &str = "expensive";
    /// Latency-sensitive realtime channels.
    pub const REALTIME: &str = "realtime";
}

fn default_configs() -> [(&'static str, RateLimitConfig); 6] {
    let minute = Duration::from_secs(60);
    [
        (
            defaults::OPENAI,
            RateLimitConfig::new(60, minute).with_burst(10).with_priority(Priority::High),
        ),
        (
            defaults::ANTHROPIC,
            RateLimitConfig::new(50, minute).with_burst(5).with_priority(Priority::High),
        ),
        (
            defaults::GEMINI,
            RateLimitConfig::new(60, minute).with_burst(10).with_priority(Priority::High),
        ),
        (defaults::GLOBAL, RateLimitConfig::per_hour(1000).with_burst(50)),
        (
            defaults::EXPENSIVE,
            RateLimitConfig::new(10, minute).with_priority(Priority::Low),
        ),
        (
            defaults::REALTIME,
            RateLimitConfig::new(100, minute).with_burst(20).with_priority(Priority::High),
        ),
    ]
}

/// Thread-safe identifier → config map with a fallback.
#[derive(Debug)]
pub struct ConfigRegistry {
    configs: RwLock<HashMap<String, RateLimitConfig>>,
    fallback: RateLimitConfig,
}

impl Default for ConfigRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ConfigRegistry {
    /// Create an empty registry with the standard fallback.
    pub fn empty() -> Self {
        Self::with_fallback(RateLimitConfig::fallback())
    }

    /// Create an empty registry with a custom fallback.
    pub fn with_fallback(fallback: RateLimitConfig) -> Self {
        Self {
            configs: RwLock::new(HashMap::new()),
            fallback,
        }
    }

    /// Create a registry pre-populated with the default provider classes.
    pub fn with_defaults() -> Self {
        let registry = Self::empty();
        registry.install_defaults();
        registry
    }

    /// Register the default provider classes, overwriting any existing entries
    /// with the same identifiers.
    pub fn install_defaults(&self) {
        let mut configs = self.configs.write();
        for (identifier, config) in default_configs() {
            configs.insert(identifier.to_string(), config);
        }
    }

    /// Insert or overwrite the config for `identifier`.
    pub fn register(&self, identifier: impl Into<String>, config: RateLimitConfig) {
        let identifier = identifier.into();
        debug!(
            identifier = %identifier,
            max_requests = config.max_requests(),
            window_ms = config.time_window().as_millis() as u64,
            "Registered rate limit config"
        );
        self.configs.write().insert(identifier, config);
    }

    /// Config registered for `identifier`, if any.
    pub fn get(&self, identifier: &str) -> Option<RateLimitConfig> {
        self.configs.read().get(identifier).copied()
    }

    /// Config for `identifier`, or the fallback when unregistered.
    pub fn resolve(&self, identifier: &str) -> RateLimitConfig {
        self.get(identifier).unwrap_or_else(|| {
            debug!(identifier = %identifier, "No config registered, using fallback");
            self.fallback
        })
    }

    /// The config applied to unregistered identifiers.
    pub fn fallback(&self) -> RateLimitConfig {
        self.fallback
    }

    /// Whether `identifier` has a registered config.
    pub fn contains(&self, identifier: &str) -> bool {
        self.configs.read().contains_key(identifier)
    }

    /// Number of registered identifiers.
    pub fn len(&self) -> usize {
        self.configs.read().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.configs.read().is_empty()
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> Vec<String> {
        let mut identifiers: Vec<_> = self.configs.read().keys().cloned().collect();
        identifiers.sort();
        identifiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_all_classes() {
        let registry = ConfigRegistry::with_defaults();
        assert_eq!(
            registry.identifiers(),
            vec!["anthropic", "expensive", "gemini", "global", "openai", "realtime"]
        );

        let openai = registry.get(defaults::OPENAI).unwrap();
        assert_eq!(openai.priority(), Priority::High);
        assert_eq!(openai.time_window(), Duration::from_secs(60));

        let expensive = registry.get(defaults::EXPENSIVE).unwrap();
        assert_eq!(expensive.priority(), Priority::Low);
        assert_eq!(expensive.burst_allowance(), None);

        let global = registry.get(defaults::GLOBAL).unwrap();
        assert_eq!(global.time_window(), Duration::from_secs(3600));
    }

    #[test]
    fn test_register_overwrites() {
        let registry = ConfigRegistry::with_defaults();
        registry.register(defaults::OPENAI, RateLimitConfig::per_second(1));
        assert_eq!(registry.get(defaults::OPENAI), Some(RateLimitConfig::per_second(1)));
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn test_unknown_falls_back() {
        let registry = ConfigRegistry::empty();
        assert!(registry.is_empty());
        assert_eq!(registry.get("missing"), None);
        assert_eq!(registry.resolve("missing"), RateLimitConfig::fallback());
        assert!(!registry.contains("missing"));
    }

    #[test]
    fn test_custom_fallback() {
        let registry = ConfigRegistry::with_fallback(RateLimitConfig::per_second(2));
        assert_eq!(registry.resolve("anything").max_requests(), 2);
    }
}
