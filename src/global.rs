//! Process-wide admission ceiling.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default aggregate ceiling.
pub const DEFAULT_GLOBAL_LIMIT: u32 = 1000;

/// Default global window.
pub const DEFAULT_GLOBAL_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct GlobalState {
    requests: VecDeque<Instant>,
    last_cleanup: Instant,
}

impl GlobalState {
    fn prune(&mut self, window: Duration, now: Instant) {
        while let Some(&oldest) = self.requests.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }
}

/// A single sliding window shared by every identifier and caller.
///
/// Bounds aggregate throughput regardless of how many distinct keys exist.
/// Every admission check passes through here, so the critical section is
/// kept to a prune plus a push, bounded by `limit`.
#[derive(Debug)]
pub struct GlobalGuard {
    limit: u32,
    window: Duration,
    state: Mutex<GlobalState>,
}

impl GlobalGuard {
    /// Create a guard admitting at most `limit` requests per `window`.
    pub fn new(limit: u32, window: Duration, now: Instant) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(GlobalState {
                requests: VecDeque::with_capacity(limit.min(4096) as usize),
                last_cleanup: now,
            }),
        }
    }

    /// Admit and record one request, or return how long until a slot frees.
    pub fn check(&self, now: Instant) -> Result<(), Duration> {
        let mut state = self.state.lock();
        state.prune(self.window, now);

        if state.requests.len() >= self.limit as usize {
            let retry_after = state
                .requests
                .front()
                .map(|&oldest| (oldest + self.window).saturating_duration_since(now))
                .unwrap_or(self.window);
            return Err(retry_after);
        }

        state.requests.push_back(now);
        Ok(())
    }

    /// Drop timestamps outside the window without recording anything.
    pub fn compact(&self, now: Instant) {
        let mut state = self.state.lock();
        state.prune(self.window, now);
        state.last_cleanup = now;
    }

    /// Admitted requests still inside the window at `now`.
    pub fn len(&self, now: Instant) -> usize {
        let state = self.state.lock();
        state
            .requests
            .iter()
            .filter(|&&ts| now.saturating_duration_since(ts) < self.window)
            .count()
    }

    /// When the window was last compacted.
    pub fn last_cleanup(&self) -> Instant {
        self.state.lock().last_cleanup
    }

    /// Forget all recorded requests.
    pub fn clear(&self) {
        self.state.lock().requests.clear();
    }

    /// Configured ceiling.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Configured window.
    pub fn window(&self) -> Duration {
        self.window
    }
}
