//! Exponential reconnection backoff.
//!
//! The delay starts at `initial`, is multiplied by `factor` after every
//! failed attempt, never exceeds `max`, and returns to `initial` after a
//! success. Failures are counted so that callers can escalate logging once
//! the broker has been unreachable for a while.
//!
//! # Examples
//!
//! ```
//! use consultease_network::backoff::{Backoff, BackoffPolicy};
//! use std::time::Duration;
//!
//! let mut backoff = Backoff::new(BackoffPolicy::default());
//! assert_eq!(backoff.current(), Duration::from_secs(5));
//!
//! backoff.record_failure();
//! assert_eq!(backoff.current(), Duration::from_millis(7500));
//!
//! backoff.reset();
//! assert_eq!(backoff.current(), Duration::from_secs(5));
//! ```

use consultease_core::constants::{
    DEFAULT_RECONNECT_ESCALATE_AFTER, DEFAULT_RECONNECT_FACTOR, DEFAULT_RECONNECT_INITIAL_MS,
    DEFAULT_RECONNECT_MAX_MS,
};
use std::time::Duration;

/// Backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    /// Growth factor, expected to be greater than 1.
    pub factor: f64,
    /// Consecutive failures after which failures are reported as errors.
    pub escalate_after: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(DEFAULT_RECONNECT_INITIAL_MS),
            max: Duration::from_millis(DEFAULT_RECONNECT_MAX_MS),
            factor: DEFAULT_RECONNECT_FACTOR,
            escalate_after: DEFAULT_RECONNECT_ESCALATE_AFTER,
        }
    }
}

/// Backoff state for one reconnection sequence.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            current: policy.initial.min(policy.max),
            failures: 0,
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Delay to wait before the next attempt.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Consecutive failures since the last reset.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Whether failures should now be logged as persistent unavailability.
    pub fn should_escalate(&self) -> bool {
        self.failures > self.policy.escalate_after
    }

    /// Grow the delay after a failed attempt and return the new delay.
    pub fn record_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let factor = self.policy.factor.max(1.0);
        let next = self.current.as_secs_f64() * factor;
        self.current = if next >= self.policy.max.as_secs_f64() {
            self.policy.max
        } else {
            Duration::from_secs_f64(next)
        };
        self.current
    }

    /// Return to the initial delay after a successful attempt.
    pub fn reset(&mut self) {
        self.current = self.policy.initial.min(self.policy.max);
        self.failures = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_sequence() {
        let mut backoff = Backoff::default();
        let delays: Vec<u128> = (0..8)
            .map(|_| backoff.record_failure().as_millis())
            .collect();
        assert_eq!(
            delays,
            vec![7500, 11250, 16875, 25312, 37968, 56953, 60000, 60000]
        );
    }

    #[test]
    fn test_reset_after_success() {
        let mut backoff = Backoff::default();
        for _ in 0..5 {
            backoff.record_failure();
        }
        assert_eq!(backoff.failures(), 5);

        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_secs(5));
        assert_eq!(backoff.failures(), 0);
    }

    #[test]
    fn test_escalation_threshold() {
        let mut backoff = Backoff::default();
        for _ in 0..10 {
            backoff.record_failure();
        }
        assert!(!backoff.should_escalate());
        backoff.record_failure();
        assert!(backoff.should_escalate());
    }

    #[test]
    fn test_initial_above_max_is_capped() {
        let backoff = Backoff::new(BackoffPolicy {
            initial: Duration::from_secs(90),
            ..BackoffPolicy::default()
        });
        assert_eq!(backoff.current(), Duration::from_secs(60));
    }

    proptest! {
        #[test]
        fn prop_strictly_increases_until_cap(
            initial_ms in 1u64..10_000,
            max_ms in 10_000u64..120_000,
            factor in 1.1f64..4.0,
            steps in 1usize..40,
        ) {
            let policy = BackoffPolicy {
                initial: Duration::from_millis(initial_ms),
                max: Duration::from_millis(max_ms),
                factor,
                escalate_after: 10,
            };
            let mut backoff = Backoff::new(policy);
            let mut previous = backoff.current();
            for _ in 0..steps {
                let next = backoff.record_failure();
                prop_assert!(next <= policy.max);
                if previous < policy.max {
                    prop_assert!(next > previous);
                } else {
                    prop_assert_eq!(next, policy.max);
                }
                previous = next;
            }
            backoff.reset();
            prop_assert_eq!(backoff.current(), policy.initial);
        }
    }
}
