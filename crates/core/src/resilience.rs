//! Deadlines and bounded retries for calls into external collaborators.
//!
//! Only idempotent reads should go through [`RetryPolicy::run`]; writes and
//! anything with side effects (lockout counters, token issuance) must be
//! called exactly once.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("deadline of {0:?} elapsed")]
pub struct DeadlineElapsed(pub Duration);

/// Upper bound on how long a single collaborator call may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Duration);

impl Deadline {
    pub const DEFAULT: Deadline = Deadline(Duration::from_secs(5));

    pub fn new(limit: Duration) -> Self {
        Self(limit)
    }

    pub fn limit(&self) -> Duration {
        self.0
    }

    pub async fn run<F>(&self, fut: F) -> Result<F::Output, DeadlineElapsed>
    where
        F: Future,
    {
        tokio::time::timeout(self.0, fut)
            .await
            .map_err(|_| DeadlineElapsed(self.0))
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Exponential backoff for idempotent operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// retry budget is spent. The last error is returned.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: &str,
        mut op: F,
        is_transient: impl Fn(&E) -> bool,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: core::fmt::Display,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::debug!(operation, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt < self.max_retries && is_transient(&e) => {
                    attempt += 1;
                    tracing::warn!(operation, attempt, error = %e, ?delay, "transient failure, retrying");
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, self.max_delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
