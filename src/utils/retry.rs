//! Retry utilities for rate-limited API calls
//!
//! Exponential backoff with a cap and optional jitter. Only errors accepted by
//! the caller's predicate are retried; everything else returns immediately.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call
    pub max_retries: u32,

    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds (caps exponential growth)
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff (default: 2.0)
    pub backoff_multiplier: f64,

    /// Upper bound of random jitter as a fraction of the delay (0.0 disables)
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 2000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom max retries
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Create a retry configuration with custom delays and no jitter
    pub fn with_delays(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
            backoff_multiplier: 2.0,
            jitter: 0.0,
        }
    }

    /// Deterministic delay for a given attempt (attempt 0 has none)
    pub(crate) fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms = if attempt == 0 {
            0
        } else {
            let exponential =
                self.base_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);
            (exponential as u64).min(self.max_delay_ms)
        };

        Duration::from_millis(delay_ms)
    }

    fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.calculate_delay(attempt);
        if self.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }

        let factor = rand::thread_rng().gen_range(0.0..=self.jitter);
        delay.mul_f64(1.0 + factor)
    }
}

/// Outcome of a retried operation, with the number of attempts made
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
    /// True when the last error was retryable but the budget ran out
    pub exhausted: bool,
}

/// Execute an operation, retrying only errors accepted by `should_retry`
///
/// # Example
///
/// ```no_run
/// use rankmatch::utils::retry::{with_retry_if, RetryConfig};
/// use rankmatch::utils::error::FetchError;
///
/// # async fn example() {
/// let config = RetryConfig::default();
/// let outcome = with_retry_if(
///     &config,
///     || async { Err::<(), _>(FetchError::RateLimited) },
///     FetchError::is_rate_limit,
/// )
/// .await;
/// assert!(outcome.exhausted);
/// # }
/// ```
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: P,
) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = config.jittered_delay(attempt);
            debug!(
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying operation after delay"
            );
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempt = attempt, "Operation succeeded after retry");
                }
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt + 1,
                    exhausted: false,
                };
            }
            Err(e) => {
                if !should_retry(&e) {
                    return RetryOutcome {
                        result: Err(e),
                        attempts: attempt + 1,
                        exhausted: false,
                    };
                }

                if attempt >= config.max_retries {
                    warn!(
                        attempts = attempt + 1,
                        error = %e,
                        "Retry budget exhausted"
                    );
                    return RetryOutcome {
                        result: Err(e),
                        attempts: attempt + 1,
                        exhausted: true,
                    };
                }

                warn!(
                    attempt = attempt,
                    max_retries = config.max_retries,
                    error = %e,
                    "Operation failed, will retry"
                );
            }
        }

        attempt += 1;
    }
}
