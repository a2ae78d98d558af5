//! Mutable per-key rate limiting state.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

/// State tracked for one `(identifier, caller_id)` pair.
///
/// Holds the sliding-window history of admitted requests, the burst bucket,
/// and the violation/backoff bookkeeping. Entries are created lazily on the
/// first check and owned exclusively by the limiter's store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitState {
    /// Admitted request timestamps, oldest first.
    pub requests: VecDeque<Instant>,
    /// Available burst credits, never above the config's burst allowance.
    pub burst_tokens: u32,
    /// Last instant the bucket was credited.
    pub last_refill: Instant,
    /// Denials since the last admitted request.
    pub consecutive_violations: u32,
    /// While in the future, every check for this key is denied.
    pub backoff_until: Option<Instant>,
}

impl RateLimitState {
    /// Fresh state with a full burst bucket.
    pub fn new(config: &RateLimitConfig, now: Instant) -> Self {
        Self {
            requests: VecDeque::new(),
            burst_tokens: config.burst_capacity(),
            last_refill: now,
            consecutive_violations: 0,
            backoff_until: None,
        }
    }

    /// Credit burst tokens for the whole refill intervals elapsed since
    /// `last_refill`, capped at the allowance.
    ///
    /// Tokens above the allowance are dropped first, so a config re-registered
    /// with a smaller allowance takes effect on the next check.
    ///
    /// `last_refill` advances by exactly the consumed intervals, so partial
    /// progress towards the next token is kept.
    pub fn refill(&mut self, config: &RateLimitConfig, now: Instant) {
        let capacity = config.burst_capacity();
        self.burst_tokens = self.burst_tokens.min(capacity);

        let interval = config.refill_interval().as_nanos();
        let elapsed = now.saturating_duration_since(self.last_refill).as_nanos();

        if interval == 0 {
            self.burst_tokens = capacity;
            self.last_refill = now;
            return;
        }

        let intervals = elapsed / interval;
        if intervals == 0 {
            return;
        }

        let credited = u32::try_from(intervals).unwrap_or(u32::MAX);
        self.burst_tokens = self.burst_tokens.saturating_add(credited).min(capacity);

        let remainder = Duration::from_nanos((elapsed % interval) as u64);
        self.last_refill = now - remainder;
    }

    /// Drop timestamps that are `window` or more behind `now`.
    pub fn prune(&mut self, window: Duration, now: Instant) {
        while let Some(&oldest) = self.requests.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }

    /// Whether a backoff deadline is set and still ahead of `now`.
    pub fn in_backoff(&self, now: Instant) -> bool {
        self.backoff_until.is_some_and(|until| until > now)
    }

    /// Most recent admitted request.
    pub fn last_request(&self) -> Option<Instant> {
        self.requests.back().copied()
    }

    /// Record an admitted request: consume a burst credit if one is
    /// available and clear all violation bookkeeping.
    pub fn admit(&mut self, now: Instant) {
        self.requests.push_back(now);
        self.burst_tokens = self.burst_tokens.saturating_sub(1);
        self.consecutive_violations = 0;
        self.backoff_until = None;
    }

    /// Whether the sweeper may reclaim this entry: no request within
    /// `max_idle` and no pending backoff.
    pub fn is_reclaimable(&self, max_idle: Duration, now: Instant) -> bool {
        let idle = self
            .last_request()
            .is_none_or(|last| now.saturating_duration_since(last) > max_idle);
        idle && !self.in_backoff(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_new_state_has_full_bucket() {
        let now = Instant::now();
        let state = RateLimitState::new(&RateLimitConfig::per_second(10).with_burst(4), now);
        assert_eq!(state.burst_tokens, 4);
        assert_eq!(state.last_refill, now);

        let state = RateLimitState::new(&RateLimitConfig::per_second(10), now);
        assert_eq!(state.burst_tokens, 0);
    }

    #[test]
    fn test_refill_whole_intervals_only() {
        // refill interval = 1s
        let config = RateLimitConfig::new(10, secs(10)).with_burst(5);
        let start = Instant::now();
        let mut state = RateLimitState::new(&config, start);
        state.burst_tokens = 0;

        state.refill(&config, start + Duration::from_millis(2500));
        assert_eq!(state.burst_tokens, 2);
        assert_eq!(state.last_refill, start + secs(2));

        // The leftover 500ms counts towards the next token.
        state.refill(&config, start + Duration::from_millis(3000));
        assert_eq!(state.burst_tokens, 3);
        assert_eq!(state.last_refill, start + secs(3));
    }

    #[test]
    fn test_refill_capped_at_allowance() {
        let config = RateLimitConfig::per_second(10).with_burst(3);
        let start = Instant::now();
        let mut state = RateLimitState::new(&config, start);
        state.burst_tokens = 1;

        state.refill(&config, start + secs(3600));
        assert_eq!(state.burst_tokens, 3);
    }

    #[test]
    fn test_refill_clamps_to_smaller_allowance() {
        let old = RateLimitConfig::per_minute(10).with_burst(10);
        let start = Instant::now();
        let mut state = RateLimitState::new(&old, start);

        // Less than one refill interval has passed.
        let shrunk = RateLimitConfig::per_minute(10).with_burst(2);
        state.refill(&shrunk, start + secs(1));
        assert_eq!(state.burst_tokens, 2);
        assert_eq!(state.last_refill, start);

        state.refill(&RateLimitConfig::per_minute(10), start + secs(1));
        assert_eq!(state.burst_tokens, 0);
    }

    #[test]
    fn test_refill_without_allowance_stays_zero() {
        let config = RateLimitConfig::per_second(10);
        let start = Instant::now();
        let mut state = RateLimitState::new(&config, start);
        state.refill(&config, start + secs(5));
        assert_eq!(state.burst_tokens, 0);
    }

    #[test]
    fn test_prune_drops_entries_at_window_edge() {
        let start = Instant::now();
        let mut state = RateLimitState::new(&RateLimitConfig::per_second(10), start);
        state.requests.extend([start, start + Duration::from_millis(400), start + secs(1)]);

        state.prune(secs(1), start + secs(1));
        assert_eq!(state.requests.len(), 2);

        state.prune(secs(1), start + Duration::from_millis(1400));
        assert_eq!(state.requests.len(), 1);
    }

    #[test]
    fn test_admit_clears_violations() {
        let config = RateLimitConfig::per_second(10).with_burst(1);
        let now = Instant::now();
        let mut state = RateLimitState::new(&config, now);
        state.consecutive_violations = 4;
        state.backoff_until = Some(now + secs(16));

        state.admit(now);
        assert_eq!(state.consecutive_violations, 0);
        assert_eq!(state.backoff_until, None);
        assert_eq!(state.burst_tokens, 0);

        state.admit(now);
        assert_eq!(state.burst_tokens, 0);
        assert_eq!(state.requests.len(), 2);
    }

    #[test]
    fn test_reclaimable() {
        let max_idle = secs(3600);
        let start = Instant::now();
        let mut state = RateLimitState::new(&RateLimitConfig::per_second(1), start);
        state.requests.push_back(start);

        assert!(!state.is_reclaimable(max_idle, start + secs(60)));
        assert!(state.is_reclaimable(max_idle, start + secs(3601)));

        state.backoff_until = Some(start + secs(4000));
        assert!(!state.is_reclaimable(max_idle, start + secs(3601)));
        assert!(state.is_reclaimable(max_idle, start + secs(4000)));
    }
}
