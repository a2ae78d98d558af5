//! The admission-control facade.
//!
//! A `RateLimiter` owns the config registry, the per-key state store, the
//! global guard and the backoff policy. It is constructed once and shared by
//! reference (typically `Arc<RateLimiter>`) across every call site that talks
//! to a rate-limited provider.
//!
//! # Example
//!
//! ```
//! use callgate::{RateLimitConfig, RateLimiter};
//!
//! let limiter = RateLimiter::new();
//! limiter.register_config("search", RateLimitConfig::per_minute(2));
//!
//! assert!(limiter.is_allowed("search", Some("user-1")));
//! assert!(limiter.is_allowed("search", Some("user-1")));
//! assert!(!limiter.is_allowed("search", Some("user-1")));
//!
//! // Other callers have their own window.
//! assert!(limiter.is_allowed("search", Some("user-2")));
//! ```

use std::time::Instant;

use dashmap::DashMap;
use tracing::{debug, trace, warn};

use crate::backoff::BackoffPolicy;
use crate::clock::{Clock, SystemClock};
use crate::config::RateLimitConfig;
use crate::decision::{Decision, DenyReason};
use crate::global::GlobalGuard;
use crate::key::RateLimitKey;
use crate::policy::effective_limit;
use crate::registry::ConfigRegistry;
use crate::settings::LimiterSettings;
use crate::state::RateLimitState;
use crate::status::RateLimitStatus;
use crate::sweeper::{SweepConfig, SweepReport};

/// Admission control for outbound calls.
///
/// # Thread Safety
///
/// - Per-key state lives in a [`DashMap`], so a check only locks the shard
///   holding its key; checks for keys in other shards run in parallel
/// - The global guard is a short `parking_lot` critical section taken before
///   the key's shard lock, never while holding it
/// - No operation blocks on I/O or sleeps
pub struct RateLimiter<C: Clock = SystemClock> {
    registry: ConfigRegistry,
    states: DashMap<RateLimitKey, RateLimitState>,
    global: GlobalGuard,
    backoff: BackoffPolicy,
    sweep: SweepConfig,
    clock: C,
}

impl<C: Clock> std::fmt::Debug for RateLimiter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("identifiers", &self.registry.len())
            .field("tracked_keys", &self.states.len())
            .field("global", &self.global)
            .field("backoff", &self.backoff)
            .field("sweep", &self.sweep)
            .finish()
    }
}

impl RateLimiter<SystemClock> {
    /// Create a limiter with the default provider classes and settings.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for RateLimiter<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Create a limiter with default settings and a custom clock.
    pub fn with_clock(clock: C) -> Self {
        Self::from_settings(&LimiterSettings::default(), clock)
    }

    /// Create a limiter from validated settings.
    pub fn from_settings(settings: &LimiterSettings, clock: C) -> Self {
        Self::with_registry(settings.build_registry(), settings, clock)
    }

    /// Create a limiter around an existing registry; the registry part of
    /// `settings` is ignored.
    pub fn with_registry(registry: ConfigRegistry, settings: &LimiterSettings, clock: C) -> Self {
        let now = clock.now();
        Self {
            registry,
            states: DashMap::new(),
            global: GlobalGuard::new(settings.global_limit, settings.global_window(), now),
            backoff: settings.backoff_policy(),
            sweep: settings.sweep_config(),
            clock,
        }
    }

    /// Whether a call for `identifier` (and optionally `caller_id`) may
    /// proceed now. An allowed call is recorded against the quota.
    pub fn is_allowed(&self, identifier: &str, caller_id: Option<&str>) -> bool {
        self.check(identifier, caller_id).is_allowed()
    }

    /// Like [`is_allowed`](Self::is_allowed), but reports why a call was
    /// denied and how long to wait.
    ///
    /// Checks run in order: global ceiling, backoff, sliding-window quota,
    /// burst pacing. The first failing check decides the outcome.
    pub fn check(&self, identifier: &str, caller_id: Option<&str>) -> Decision {
        let config = self.registry.resolve(identifier);
        let now = self.clock.now();

        // System-protection valve: no per-key state is touched or penalized.
        if let Err(retry_after) = self.global.check(now) {
            warn!(
                identifier = %identifier,
                limit = self.global.limit(),
                retry_after_ms = retry_after.as_millis() as u64,
                "Global admission ceiling reached"
            );
            return Decision::denied(DenyReason::GlobalCeiling, retry_after);
        }

        let mut entry = self
            .states
            .entry(RateLimitKey::new(identifier, caller_id))
            .or_insert_with(|| RateLimitState::new(&config, now));

        let decision = evaluate(&config, &self.backoff, entry.value_mut(), now);

        match decision {
            Decision::Allowed => trace!(key = %entry.key(), "Request allowed"),
            Decision::Denied { reason, retry_after } => debug!(
                key = %entry.key(),
                reason = %reason,
                violations = entry.value().consecutive_violations,
                retry_after_ms = retry_after.as_millis() as u64,
                "Request denied"
            ),
        }

        decision
    }

    /// Remaining quota, reset time, burst credit and backoff state for a key.
    ///
    /// Observation only: the stored state is never modified, so calling this
    /// any number of times does not change the outcome of later checks.
    pub fn status(&self, identifier: &str, caller_id: Option<&str>) -> RateLimitStatus {
        let config = self.registry.resolve(identifier);
        let now = self.clock.now();

        let snapshot = self
            .states
            .get(&RateLimitKey::new(identifier, caller_id))
            .map(|entry| entry.value().clone());

        let Some(mut state) = snapshot else {
            let limit = effective_limit(&config, 0);
            return RateLimitStatus {
                remaining: limit,
                reset_time: now,
                burst_tokens: config.burst_capacity(),
                in_backoff: false,
                limit,
                consecutive_violations: 0,
            };
        };

        state.refill(&config, now);
        state.prune(config.time_window(), now);

        let limit = effective_limit(&config, state.consecutive_violations);
        let in_backoff = state.in_backoff(now);
        let reset_time = match (in_backoff, state.backoff_until, state.requests.front()) {
            (true, Some(until), _) => until,
            (_, _, Some(&oldest)) => oldest + config.time_window(),
            _ => now,
        };

        RateLimitStatus {
            remaining: limit.saturating_sub(state.requests.len() as u32),
            reset_time,
            burst_tokens: state.burst_tokens,
            in_backoff,
            limit,
            consecutive_violations: state.consecutive_violations,
        }
    }

    /// Forget everything about a key, restoring it to a fresh, unthrottled
    /// condition.
    pub fn reset(&self, identifier: &str, caller_id: Option<&str>) {
        let key = RateLimitKey::new(identifier, caller_id);
        if self.states.remove(&key).is_some() {
            debug!(key = %key, "Rate limit state reset");
        }
    }

    /// Forget every key and the global window.
    pub fn reset_all(&self) {
        self.states.clear();
        self.global.clear();
        debug!("All rate limit state reset");
    }

    /// Insert or overwrite the config for `identifier`.
    ///
    /// Existing state for the identifier is kept; the new config applies
    /// from the next check.
    pub fn register_config(&self, identifier: impl Into<String>, config: RateLimitConfig) {
        self.registry.register(identifier, config);
    }

    /// Remove idle entries and compact the global window.
    ///
    /// An entry is removed when none of its requests is within
    /// `max_idle` of now and it is not serving a backoff. Shards are
    /// locked one at a time, so admission checks on other shards are never
    /// blocked by a sweep.
    pub fn sweep(&self) -> SweepReport {
        let now = self.clock.now();
        let max_idle = self.sweep.max_idle;

        let mut removed = 0;
        self.states.retain(|_, state| {
            let keep = !state.is_reclaimable(max_idle, now);
            if !keep {
                removed += 1;
            }
            keep
        });
        self.global.compact(now);

        let report = SweepReport {
            removed,
            retained: self.states.len(),
        };
        if report.removed > 0 {
            debug!(removed = report.removed, retained = report.retained, "Swept idle rate limit entries");
        }
        report
    }

    /// Copy of the stored state for a key, if any.
    pub fn snapshot(&self, identifier: &str, caller_id: Option<&str>) -> Option<RateLimitState> {
        self.states
            .get(&RateLimitKey::new(identifier, caller_id))
            .map(|entry| entry.value().clone())
    }

    /// Number of keys currently holding state.
    pub fn tracked_keys(&self) -> usize {
        self.states.len()
    }

    /// The config registry.
    pub fn registry(&self) -> &ConfigRegistry {
        &self.registry
    }

    /// The global guard.
    pub fn global(&self) -> &GlobalGuard {
        &self.global
    }

    /// Sweeper parameters.
    pub fn sweep_config(&self) -> SweepConfig {
        self.sweep
    }

    /// The clock driving this limiter.
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

/// Per-key admission: backoff, refill, prune, quota, burst pacing, admit.
fn evaluate(
    config: &RateLimitConfig,
    backoff: &BackoffPolicy,
    state: &mut RateLimitState,
    now: Instant,
) -> Decision {
    if let Some(until) = state.backoff_until.filter(|&until| until > now) {
        return Decision::denied(DenyReason::Backoff, until - now);
    }

    state.refill(config, now);
    state.prune(config.time_window(), now);

    let limit = effective_limit(config, state.consecutive_violations);
    if state.requests.len() >= limit as usize {
        let delay = backoff.escalate(state, now);
        return Decision::denied(DenyReason::Quota, delay);
    }

    // Pacing, not abuse: no violation is recorded.
    if config.has_burst() && state.burst_tokens == 0 {
        let pace = config.refill_interval();
        if let Some(last) = state.last_request() {
            let since = now.saturating_duration_since(last);
            if since < pace {
                return Decision::denied(DenyReason::BurstPacing, pace - since);
            }
        }
    }

    state.admit(now);
    Decision::Allowed
}
