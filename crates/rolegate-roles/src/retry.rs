//! Retry with exponential backoff for transient store failures
//!
//! # Example
//!
//! ```ignore
//! use rolegate_roles::retry::{with_retry, RetryConfig};
//!
//! let keys = with_retry(RetryConfig::default(), || async move {
//!     store.list_keys("users:*").await
//! }).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::error::ConfigStoreError;

/// Errors that know whether a retry may help
pub trait RetryableError: std::fmt::Display {
    fn is_retryable(&self) -> bool;
}

impl RetryableError for ConfigStoreError {
    fn is_retryable(&self) -> bool {
        ConfigStoreError::is_retryable(self)
    }
}

/// Backoff schedule for [`with_retry`]
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for each one after
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    /// Three attempts in total, two seconds apart before backoff
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before retry number `attempt` (0-based), capped at `max_delay`
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Execute an async operation, retrying retryable failures.
pub async fn with_retry<F, Fut, T, E>(config: RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !err.is_retryable() || attempt >= config.max_attempts {
                    return Err(err);
                }

                let delay = config.delay_for_attempt(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_attempts = config.max_attempts + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after transient error"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
