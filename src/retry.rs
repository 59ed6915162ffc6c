//! Retry policy for transient failures.
//!
//! The policy is a pure decision function: given an error classification and
//! the attempt count so far, it answers retry-with-delay or give-up without
//! performing any I/O or sleeping itself. This keeps the backoff schedule
//! testable in isolation from the dispatch loop that applies it.

use std::time::Duration;

use crate::error::DispatchError;

/// Decision returned by [`RetryPolicy::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Attempt again after waiting for the given delay.
    Retry {
        /// Backoff delay before the next attempt.
        delay: Duration,
    },
    /// Stop retrying and surface the failure.
    GiveUp,
}

/// Exponential backoff policy with a bounded attempt count.
///
/// Only transient classifications are ever retried; authentication,
/// not-found, and validation failures are deterministic for the same inputs
/// and always yield [`RetryDecision::GiveUp`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    /// Three attempts, 1 s base delay, doubling, capped at 30 s.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with an explicit attempt ceiling and backoff shape.
    ///
    /// `max_attempts` counts the initial attempt; a value of 1 disables
    /// retries entirely. A multiplier below 1 is treated as 1 (constant
    /// delay).
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier: multiplier.max(1.0),
            ..Self::default()
        }
    }

    /// Caps the computed backoff delay.
    #[must_use]
    pub const fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Returns the attempt ceiling, counting the initial attempt.
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides whether attempt number `attempt` (1-based) that failed with
    /// `error` should be retried.
    ///
    /// Pure and deterministic: the same inputs always produce the same
    /// decision and delay.
    pub fn decide(&self, error: &DispatchError, attempt: u32) -> RetryDecision {
        if !error.is_transient() {
            return RetryDecision::GiveUp;
        }
        if attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry {
            delay: self.delay_for(attempt),
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        // Cap in the float domain so an aggressive multiplier cannot overflow
        // the Duration conversion before the ceiling applies.
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent as i32);
        let capped = secs.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_delay
        }
    }
}
