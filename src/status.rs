//! Read-only status snapshots.

use std::time::{Duration, Instant};

/// Point-in-time view of one key's quota.
///
/// Produced by [`RateLimiter::status`](crate::RateLimiter::status) without
/// touching the stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Requests still admissible in the current window under the effective limit.
    pub remaining: u32,
    /// When the key next regains capacity: the backoff deadline while in
    /// backoff, otherwise when the oldest request leaves the window.
    pub reset_time: Instant,
    /// Burst credits a check would see right now.
    pub burst_tokens: u32,
    /// Whether a backoff deadline is pending.
    pub in_backoff: bool,
    /// Effective limit a check would enforce right now.
    pub limit: u32,
    /// Denials since the last admitted request.
    pub consecutive_violations: u32,
}

impl RateLimitStatus {
    /// Time left until `reset_time`, measured from `now`.
    pub fn time_until_reset(&self, now: Instant) -> Duration {
        self.reset_time.saturating_duration_since(now)
    }
}
