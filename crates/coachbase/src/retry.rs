//! Async retry loop around a [`RetryPolicy`].

use std::fmt::Display;
use std::future::Future;

use coachbase_core::retry::{RetryPolicy, Retryable};
use coachbase_core::storage::RepositoryError;

/// The error that ended a retry loop and how many attempts were made.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryFailure<E> {
    pub attempts: u32,
    pub error: E,
}

impl RetryFailure<RepositoryError> {
    /// Turns the final error into the one a repository reports.
    pub fn settle(self, entity_type: &'static str, operation: &'static str) -> RepositoryError {
        self.error
            .into_settled(entity_type, operation, self.attempts)
    }
}

/// Runs fallible async operations under a retry policy.
///
/// Only errors classified as retryable are retried. Every other error
/// propagates after the attempt that raised it.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Calls `operation` with the 1-based attempt number until it succeeds,
    /// fails permanently, or the attempts run out.
    pub async fn run<T, E, F, Fut>(&self, name: &str, mut operation: F) -> Result<T, RetryFailure<E>>
    where
        E: Retryable + Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(operation = name, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if !error.is_retryable() => {
                    return Err(RetryFailure {
                        attempts: attempt,
                        error,
                    });
                }
                Err(error) if !self.policy.should_retry(attempt) => {
                    tracing::error!(
                        operation = name,
                        attempts = attempt,
                        error = %error,
                        "Giving up after transient failures"
                    );
                    return Err(RetryFailure {
                        attempts: attempt,
                        error,
                    });
                }
                Err(error) => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    tracing::warn!(
                        operation = name,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
