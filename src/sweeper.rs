//! Background reclamation of idle state.
//!
//! Without sweeping, the state store grows with every distinct
//! `(identifier, caller_id)` pair ever seen. [`RateLimiter::sweep`] performs
//! one pass; [`spawn`] runs it periodically on a tokio task.
//!
//! ```ignore
//! use callgate::{sweeper, RateLimiter};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let limiter = Arc::new(RateLimiter::new());
//!     let sweeper = sweeper::spawn(&limiter);
//!
//!     // ... serve requests ...
//!
//!     sweeper.shutdown().await;
//! }
//! ```

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::limiter::RateLimiter;

/// Default sweep interval (5 minutes).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Default idle time after which an entry may be reclaimed (1 hour).
pub const DEFAULT_MAX_IDLE: Duration = Duration::from_secs(3600);

/// Sweeper configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepConfig {
    /// How often the background task sweeps.
    pub interval: Duration,
    /// Idle time after which an entry without pending backoff is removed.
    pub max_idle: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SWEEP_INTERVAL,
            max_idle: DEFAULT_MAX_IDLE,
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries removed.
    pub removed: usize,
    /// Entries left after the sweep.
    pub retained: usize,
}

/// Handle to a running sweeper task.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Ask the task to stop after its current pass.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

/// Start sweeping `limiter` every `sweep_config().interval`.
///
/// The task only holds a weak reference, so it exits on its own once the
/// last `Arc` to the limiter is dropped.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn spawn<C: Clock>(limiter: &Arc<RateLimiter<C>>) -> SweeperHandle {
    let interval = limiter.sweep_config().interval;
    let weak = Arc::downgrade(limiter);
    let shutdown = Arc::new(Notify::new());
    let signal = shutdown.clone();

    info!(interval_ms = interval.as_millis() as u64, "Starting rate limit sweeper");

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if !sweep_once(&weak) {
                        debug!("Rate limiter dropped, sweeper exiting");
                        break;
                    }
                }
                _ = signal.notified() => {
                    debug!("Rate limit sweeper stopped");
                    break;
                }
            }
        }
    });

    SweeperHandle {
        shutdown,
        task: Some(task),
    }
}

fn sweep_once<C: Clock>(limiter: &Weak<RateLimiter<C>>) -> bool {
    match limiter.upgrade() {
        Some(limiter) => {
            limiter.sweep();
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::RateLimitConfig;
    use crate::settings::LimiterSettings;

    fn limiter(clock: &ManualClock) -> Arc<RateLimiter<ManualClock>> {
        let settings = LimiterSettings {
            sweep_interval_ms: 1_000,
            ..Default::default()
        };
        Arc::new(RateLimiter::from_settings(&settings, clock.clone()))
    }

    #[test]
    fn test_sweep_removes_only_idle() {
        let clock = ManualClock::new();
        let limiter = limiter(&clock);
        limiter.register_config("x", RateLimitConfig::per_minute(10));

        limiter.is_allowed("x", Some("old"));
        clock.advance(Duration::from_secs(3000));
        limiter.is_allowed("x", Some("recent"));
        clock.advance(Duration::from_secs(601));

        let report = limiter.sweep();
        assert_eq!(report, SweepReport { removed: 1, retained: 1 });
        assert!(limiter.snapshot("x", Some("old")).is_none());
        assert!(limiter.snapshot("x", Some("recent")).is_some());
    }

    #[test]
    fn test_sweep_keeps_keys_in_backoff() {
        let clock = ManualClock::new();
        let settings = LimiterSettings {
            max_idle_ms: 1_000,
            ..Default::default()
        };
        let limiter = RateLimiter::from_settings(&settings, clock.clone());
        limiter.register_config("x", RateLimitConfig::new(1, Duration::from_secs(60)));

        assert!(limiter.is_allowed("x", None));
        assert!(!limiter.is_allowed("x", None));
        // Each expired backoff is followed by another quota denial: 2s, 4s, 8s, 16s.
        for _ in 0..3 {
            clock.advance(limiter.status("x", None).time_until_reset(clock.now()));
            assert!(!limiter.is_allowed("x", None));
        }
        assert_eq!(limiter.status("x", None).consecutive_violations, 4);

        clock.advance(Duration::from_millis(1500));
        assert_eq!(limiter.sweep().removed, 0);

        clock.advance(Duration::from_secs(16));
        assert_eq!(limiter.sweep().removed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_sweeper_reclaims() {
        let clock = ManualClock::new();
        let limiter = limiter(&clock);
        limiter.is_allowed("openai", Some("user-1"));
        clock.advance(Duration::from_secs(2 * 3600));

        let handle = spawn(&limiter);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(limiter.tracked_keys(), 0);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_task() {
        let clock = ManualClock::new();
        let limiter = limiter(&clock);

        let handle = spawn(&limiter);
        assert!(!handle.is_finished());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_exits_when_limiter_dropped() {
        let clock = ManualClock::new();
        let limiter = limiter(&clock);

        let handle = spawn(&limiter);
        drop(limiter);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(handle.is_finished());
    }
}
