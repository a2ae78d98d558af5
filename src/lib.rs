//! In-process admission control for rate-limited outbound calls.
//!
//! `callgate` decides, immediately before each call to an external provider,
//! whether the call may proceed now and, if not, how long to wait:
//!
//! - **Sliding windows**: per `(identifier, caller_id)` request history
//! - **Burst credits**: a token bucket refilled at the steady rate
//! - **Adaptive penalties**: repeat offenders get a reduced quota and an
//!   exponential backoff, capped at 5 minutes
//! - **Global ceiling**: one shared window bounding aggregate throughput
//! - **Bounded memory**: idle keys are swept periodically
//!
//! # Quick Start
//!
//! ```
//! use callgate::{Priority, RateLimitConfig, RateLimiter};
//!
//! let limiter = RateLimiter::new();
//! limiter.register_config(
//!     "embeddings",
//!     RateLimitConfig::per_minute(120).with_burst(20).with_priority(Priority::High),
//! );
//!
//! let decision = limiter.check("openai", Some("user-42"));
//! if decision.is_allowed() {
//!     // issue the provider call
//! } else {
//!     println!("retry after {:?}", decision.retry_after());
//! }
//!
//! let status = limiter.status("openai", Some("user-42"));
//! assert!(status.remaining < status.limit);
//! ```
//!
//! # Checks
//!
//! | Order | Check | Denial escalates backoff |
//! |-------|-------|--------------------------|
//! | 1 | Global ceiling (1000 / 60s) | no |
//! | 2 | Pending backoff | no |
//! | 3 | Sliding-window quota (effective limit) | yes |
//! | 4 | Burst pacing | no |
//!
//! # Testing
//!
//! Every time-dependent decision reads an injectable [`Clock`]. Build the
//! limiter with a [`ManualClock`] to drive time explicitly.

pub mod backoff;
pub mod clock;
pub mod config;
pub mod decision;
pub mod error;
pub mod global;
pub mod key;
pub mod limiter;
pub mod policy;
pub mod registry;
pub mod settings;
pub mod state;
pub mod status;
pub mod sweeper;

// Re-export main types
pub use backoff::BackoffPolicy;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Priority, RateLimitConfig, RateLimitConfigBuilder};
pub use decision::{Decision, DenyReason};
pub use error::{ConfigError, RateLimitError, Result};
pub use global::GlobalGuard;
pub use key::RateLimitKey;
pub use limiter::RateLimiter;
pub use policy::effective_limit;
pub use registry::ConfigRegistry;
pub use settings::LimiterSettings;
pub use state::RateLimitState;
pub use status::RateLimitStatus;
pub use sweeper::{SweepConfig, SweepReport, SweeperHandle};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::{Priority, RateLimitConfig};
    pub use crate::decision::{Decision, DenyReason};
    pub use crate::error::{RateLimitError, Result};
    pub use crate::limiter::RateLimiter;
    pub use crate::settings::LimiterSettings;
    pub use crate::status::RateLimitStatus;
}
