//! Store write retry
//!
//! Exponential backoff for transient store failures (busy/locked database,
//! pool timeout, I/O). Anything else fails on the first attempt.

use sfl_common::config::StoreRetryConfig;
use sfl_common::{Error, Result};
use std::future::Future;
use std::time::{Duration, Instant};

/// Retry limits for store writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&StoreRetryConfig::default())
    }
}

impl From<&StoreRetryConfig> for RetryPolicy {
    fn from(config: &StoreRetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out
///
/// Backoff starts at `initial_backoff` and doubles per attempt, capped at
/// `max_backoff`. Only errors with [`Error::is_retryable`] are retried.
pub async fn retry_store_write<F, Fut, T>(operation_name: &str, policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start_time = Instant::now();
    let mut attempt = 0u32;
    let mut backoff = policy.initial_backoff;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Store write succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) if attempt >= policy.max_attempts => {
                tracing::error!(
                    operation = operation_name,
                    attempt,
                    elapsed_ms = start_time.elapsed().as_millis() as u64,
                    error = %err,
                    "Store write failed: retries exhausted"
                );
                return Err(err);
            }
            Err(err) => {
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Store write failed, will retry after backoff"
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(policy.max_backoff);
            }
        }
    }
}
