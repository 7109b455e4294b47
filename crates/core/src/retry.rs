//! Bounded exponential backoff policy and retry classification.
//!
//! The policy only does arithmetic; sleeping and re-running live in the
//! executor of the `coachbase` crate.

use std::time::Duration;

use crate::storage::{RepositoryError, StorageError};

/// Classifies an error as worth another attempt or not.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for StorageError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

impl Retryable for RepositoryError {
    /// Only raw transient storage failures are retried. Validation and
    /// not-found errors propagate immediately, and an already settled
    /// `Database` error is never retried twice.
    fn is_retryable(&self) -> bool {
        match self {
            RepositoryError::Storage(source) => source.is_transient(),
            _ => false,
        }
    }
}

/// Retry limits and backoff shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Delay to wait after the given failed attempt (1-indexed).
    ///
    /// `min(base * 2^(attempt - 1), max)`, which never decreases as the
    /// attempt number grows.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Returns true if another attempt is allowed after `attempt` failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Sum of every delay a fully exhausted run would sleep.
    pub fn max_total_delay(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| self.delay_for_attempt(attempt))
            .sum()
    }
}
