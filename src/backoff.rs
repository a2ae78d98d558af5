//! Exponential backoff for repeat offenders.
//!
//! Each quota denial increments the key's violation counter and imposes a
//! backoff of `base * 2^violations`, capped at `max`. Any admitted request
//! clears it again (see [`RateLimitState::admit`]).

use std::time::{Duration, Instant};

use crate::state::RateLimitState;

/// Default backoff unit.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Default backoff cap (5 minutes).
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(300);

/// Backoff escalation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Backoff unit multiplied by `2^violations`.
    pub base: Duration,
    /// Upper bound for a single backoff.
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BACKOFF_BASE,
            max: DEFAULT_BACKOFF_MAX,
        }
    }
}

impl BackoffPolicy {
    /// Create a policy with custom base and cap.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Backoff imposed after the `violations`-th consecutive denial.
    ///
    /// Non-decreasing in `violations` and never above `max`.
    pub fn delay_for(&self, violations: u32) -> Duration {
        let factor = 1u32.checked_shl(violations).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Record a violation on `state` and set its backoff deadline.
    ///
    /// Returns the imposed backoff.
    pub fn escalate(&self, state: &mut RateLimitState, now: Instant) -> Duration {
        state.consecutive_violations = state.consecutive_violations.saturating_add(1);
        let delay = self.delay_for(state.consecutive_violations);
        state.backoff_until = Some(now + delay);
        delay
    }
}
