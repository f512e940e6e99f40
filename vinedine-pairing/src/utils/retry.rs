//! Bounded retry with exponential backoff
//!
//! Shared by both external clients and the record store. An error type opts
//! in through [`Retryable`]; anything not transient fails on the first attempt.
//!
//! **Backoff Strategy:**
//! - Delay before retry `n` is `initial_backoff * 2^(n-1)`, capped at `max_backoff`
//! - With jitter enabled the actual sleep is drawn uniformly from `[delay/2, delay]`
//! - After `max_attempts` attempts the last error is returned

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;
use vinedine_common::config::RetryConfig;

/// Classifies a failure as worth another attempt
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

/// How often and how patiently to retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (at least 1)
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms.max(config.initial_backoff_ms)),
            jitter: true,
        }
    }

    /// Single attempt, never sleeps
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter: false,
        }
    }

    /// Fixed-delay policy without jitter, mostly for tests
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: delay,
            max_backoff: delay,
            jitter: false,
        }
    }

    /// Delay before retrying after failed attempt number `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    fn sleep_for(&self, attempt: u32) -> Duration {
        let delay = self.backoff_for(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let millis = delay.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(millis / 2..=millis))
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g., "recipe generation")
/// * `policy` - Attempt budget and backoff shape
/// * `operation` - Async closure performing one attempt
pub async fn retry_with_backoff<F, Fut, T, E>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let start_time = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !err.is_transient() {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "Permanent failure, not retrying"
                    );
                    return Err(err);
                }

                if attempt >= policy.max_attempts {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        error = %err,
                        "Operation failed: retry budget exhausted"
                    );
                    return Err(err);
                }

                let backoff = policy.sleep_for(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Transient failure, will retry after backoff"
                );

                tokio::time::sleep(backoff).await;
            }
        }
    }
}
