//! Retry policy with exponential backoff for backend requests.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::ports::BackendError;

/// Retry policy with exponential backoff.
///
/// Backoff doubles with each retry: `initial * 2^attempt`, capped at
/// `max_backoff_ms`.
///
/// # Retry Decision
/// - Retry on: rate limits, timeouts, service unavailability, network errors
/// - Do NOT retry: authentication failures, rejected requests, empty responses
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries before giving up
    max_retries: u32,
    /// Initial backoff duration in milliseconds
    initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds
    max_backoff_ms: u64,
}

impl RetryPolicy {
    /// Create a new retry policy.
    ///
    /// # Arguments
    /// * `max_retries` - Maximum retry attempts (recommended: 3)
    /// * `initial_backoff_ms` - Starting backoff delay
    /// * `max_backoff_ms` - Maximum backoff delay
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        assert!(
            max_backoff_ms >= initial_backoff_ms,
            "max_backoff_ms must be >= initial_backoff_ms"
        );
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms,
        }
    }

    /// Execute an operation with exponential backoff retry logic.
    ///
    /// Returns the first success, or the last error once the error is
    /// permanent or the retry budget is spent.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!("Operation succeeded after {} retries", attempt);
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if self.should_retry(&err, attempt) {
                        let backoff = self.calculate_backoff(attempt);
                        warn!(
                            "Attempt {} failed with transient error: {}. Retrying in {:?}...",
                            attempt + 1,
                            err,
                            backoff
                        );
                        sleep(backoff).await;
                        attempt += 1;
                    } else {
                        if attempt >= self.max_retries {
                            warn!("Operation failed after {} attempts: {}", attempt + 1, err);
                        } else {
                            debug!("Permanent error, not retrying: {}", err);
                        }
                        return Err(err);
                    }
                }
            }
        }
    }

    /// Exponential backoff duration for a given attempt:
    /// `min(initial_backoff * 2^attempt, max_backoff)`.
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);

        Duration::from_millis(backoff_ms)
    }

    fn should_retry(&self, error: &BackendError, attempt: u32) -> bool {
        if attempt >= self.max_retries {
            return false;
        }
        error.is_transient()
    }
}

impl Default for RetryPolicy {
    /// Recommended defaults: 3 retries, 10 s initial backoff, 5 min cap.
    fn default() -> Self {
        Self::new(3, 10_000, 300_000)
    }
}
