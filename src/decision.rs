//! Decision types for admission checks.
//!
//! A check produces a `Decision`. A denial is a normal result rather than an
//! error: it says why the request was held back and how long the caller
//! should wait before trying again.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The process-wide ceiling is exhausted. No per-key penalty applies.
    GlobalCeiling,
    /// The key is serving a backoff from earlier violations.
    Backoff,
    /// The key's sliding window is at its effective limit. Escalates backoff.
    Quota,
    /// The caller is faster than the steady rate with no burst credit left.
    BurstPacing,
}

impl DenyReason {
    /// Whether this denial counts as a violation against the key.
    pub fn escalates(self) -> bool {
        matches!(self, Self::Quota)
    }

    /// Stable name for logging.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GlobalCeiling => "global_ceiling",
            Self::Backoff => "backoff",
            Self::Quota => "quota",
            Self::BurstPacing => "burst_pacing",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed; it has been recorded.
    Allowed,
    /// The request must not proceed now.
    Denied {
        /// Which check denied it.
        reason: DenyReason,
        /// Advisory wait before the next attempt.
        retry_after: Duration,
    },
}

impl Decision {
    /// Create a denial.
    pub fn denied(reason: DenyReason, retry_after: Duration) -> Self {
        Self::Denied { reason, retry_after }
    }

    /// Check if the request is allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Check if the request is denied.
    pub fn is_denied(&self) -> bool {
        !self.is_allowed()
    }

    /// Deny reason, if denied.
    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            Self::Allowed => None,
            Self::Denied { reason, .. } => Some(*reason),
        }
    }

    /// Suggested wait, if denied.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Allowed => None,
            Self::Denied { retry_after, .. } => Some(*retry_after),
        }
    }
}

impl From<Decision> for bool {
    fn from(decision: Decision) -> Self {
        decision.is_allowed()
    }
}
