//! Effective limit calculation.
//!
//! The quota enforced on a given check is not simply `max_requests`: repeat
//! offenders get a reduced quota, and the identifier's priority class scales
//! it up or down.
//!
//! | Condition | Factor |
//! |-----------|--------|
//! | more than 3 consecutive violations | 0.5 |
//! | more than 1 consecutive violation | 0.7 |
//! | `Priority::High` | 1.2 |
//! | `Priority::Low` | 0.8 |
//!
//! Ratios are applied with integer arithmetic, flooring after each step, and
//! the result is never below 1. The value depends on the violation counter,
//! so it is recomputed on every check.

use crate::config::RateLimitConfig;

/// Penalty tier derived from the consecutive violation count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationPenalty {
    /// 0 or 1 violations.
    None,
    /// 2 or 3 violations: quota scaled by 0.7.
    Moderate,
    /// More than 3 violations: quota halved.
    Severe,
}

impl ViolationPenalty {
    /// Classify a consecutive violation count.
    pub fn for_violations(consecutive_violations: u32) -> Self {
        match consecutive_violations {
            v if v > 3 => Self::Severe,
            v if v > 1 => Self::Moderate,
            _ => Self::None,
        }
    }

    /// Multiplier as an exact `(numerator, denominator)` ratio.
    pub fn scale(self) -> (u64, u64) {
        match self {
            Self::None => (1, 1),
            Self::Moderate => (7, 10),
            Self::Severe => (1, 2),
        }
    }
}

/// Quota enforced for a check given the key's current violation count.
pub fn effective_limit(config: &RateLimitConfig, consecutive_violations: u32) -> u32 {
    let base = u64::from(config.max_requests());

    let penalized = apply(base, ViolationPenalty::for_violations(consecutive_violations).scale()).max(1);
    let scaled = apply(penalized, config.priority().scale()).max(1);

    u32::try_from(scaled).unwrap_or(u32::MAX)
}

fn apply(value: u64, (num, den): (u64, u64)) -> u64 {
    value * num / den
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Priority;
    use std::time::Duration;

    fn config(max: u32, priority: Priority) -> RateLimitConfig {
        RateLimitConfig::new(max, Duration::from_secs(1)).with_priority(priority)
    }

    #[test]
    fn test_penalty_tiers() {
        assert_eq!(ViolationPenalty::for_violations(0), ViolationPenalty::None);
        assert_eq!(ViolationPenalty::for_violations(1), ViolationPenalty::None);
        assert_eq!(ViolationPenalty::for_violations(2), ViolationPenalty::Moderate);
        assert_eq!(ViolationPenalty::for_violations(3), ViolationPenalty::Moderate);
        assert_eq!(ViolationPenalty::for_violations(4), ViolationPenalty::Severe);
        assert_eq!(ViolationPenalty::for_violations(u32::MAX), ViolationPenalty::Severe);
    }

    #[test]
    fn test_priority_scaling() {
        assert_eq!(effective_limit(&config(10, Priority::Normal), 0), 10);
        assert_eq!(effective_limit(&config(10, Priority::High), 0), 12);
        assert_eq!(effective_limit(&config(10, Priority::Low), 0), 8);
        // floor(3 * 1.2) = 3
        assert_eq!(effective_limit(&config(3, Priority::High), 0), 3);
    }

    #[test]
    fn test_violation_penalty() {
        assert_eq!(effective_limit(&config(10, Priority::Normal), 1), 10);
        assert_eq!(effective_limit(&config(10, Priority::Normal), 2), 7);
        assert_eq!(effective_limit(&config(10, Priority::Normal), 4), 5);
        // 10 * 0.5 = 5, * 1.2 = 6
        assert_eq!(effective_limit(&config(10, Priority::High), 5), 6);
        // 10 * 0.7 = 7, * 0.8 = 5.6
        assert_eq!(effective_limit(&config(10, Priority::Low), 3), 5);
    }

    #[test]
    fn test_never_below_one() {
        assert_eq!(effective_limit(&config(1, Priority::Low), 0), 1);
        assert_eq!(effective_limit(&config(1, Priority::Normal), 10), 1);
        assert_eq!(effective_limit(&config(1, Priority::Low), 10), 1);
    }

    #[test]
    fn test_large_quota_does_not_overflow() {
        assert_eq!(effective_limit(&config(u32::MAX, Priority::High), 0), u32::MAX);
    }
}
