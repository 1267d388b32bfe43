//! Fixed-backoff retry for refresh cycles
//!
//! A refresh cycle makes one attempt plus up to `max_retries` retries with a
//! constant sleep in between. Cancellation is never retried and interrupts
//! the sleep.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};

/// Retry behaviour of one refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Sleep between attempts
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Run `operation` until it succeeds, fails with a cancellation, or the
/// policy is exhausted. Returns the last error in the latter case.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
    operation_name: &str,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        "'{}' succeeded on attempt {}/{}",
                        operation_name, attempt, attempts
                    );
                }
                return Ok(result);
            }
            Err(err) if err.is_cancelled() => return Err(err),
            Err(err) if attempt >= attempts => {
                warn!(
                    "'{}' failed after {} attempt(s): {}",
                    operation_name, attempts, err
                );
                return Err(err);
            }
            Err(err) => {
                warn!(
                    "'{}' failed on attempt {}/{}, retrying in {:?}: {}",
                    operation_name, attempt, attempts, policy.backoff, err
                );
                tokio::select! {
                    _ = tokio::time::sleep(policy.backoff) => {}
                    _ = cancel.cancelled() => return Err(AppError::cancelled(operation_name)),
                }
                attempt += 1;
            }
        }
    }
}
