//! Retry and fallback policy for fallible operations.
//!
//! Only errors classified retryable by [`RiskbaseError::is_retryable`] are
//! retried. Backoff is linear: `base_delay * attempt`, capped at `max_delay`.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetrySection;
use crate::error::{Result, RiskbaseError};

/// Retry/fallback policy.
#[derive(Debug, Clone)]
pub struct ErrorHandler {
    /// Total attempts including the first one. Zero is treated as one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::from(&RetrySection::default())
    }
}

impl From<&RetrySection> for ErrorHandler {
    fn from(section: &RetrySection) -> Self {
        Self {
            max_attempts: section.max_attempts,
            base_delay: Duration::from_millis(section.base_delay_ms),
            max_delay: Duration::from_millis(section.max_delay_ms),
        }
    }
}

impl ErrorHandler {
    /// Delay slept after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// attempts are exhausted. The last error is returned.
    pub async fn with_retry<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() || attempt >= max_attempts => return Err(e),
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        code = e.code(),
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Run `op`; on failure log the error and return `fallback()` instead.
    pub fn with_fallback<T>(
        &self,
        op: impl FnOnce() -> Result<T>,
        fallback: impl FnOnce(&RiskbaseError) -> T,
    ) -> T {
        match op() {
            Ok(value) => value,
            Err(e) => {
                warn!(code = e.code(), error = %e, "operation failed, using fallback");
                fallback(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_handler(max_attempts: u32) -> ErrorHandler {
        ErrorHandler {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn linear_backoff_is_capped() {
        let handler = ErrorHandler {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(250),
        };
        assert_eq!(handler.delay_for(1), Duration::from_millis(100));
        assert_eq!(handler.delay_for(2), Duration::from_millis(200));
        assert_eq!(handler.delay_for(3), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn retries_retryable_errors_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = fast_handler(3)
            .with_retry(move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(RiskbaseError::Network("connection reset".into()))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_deterministic_errors() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = fast_handler(5)
            .with_retry(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(RiskbaseError::not_found("15-9999"))
            })
            .await;

        assert_eq!(result.unwrap_err().code(), "DATA_NOT_FOUND");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = fast_handler(2)
            .with_retry(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(RiskbaseError::Cache("poisoned".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn fallback_used_on_error() {
        let handler = fast_handler(1);
        let value = handler.with_fallback(
            || Err(RiskbaseError::ServiceNotInitialized),
            |e| e.code().len(),
        );
        assert_eq!(value, "SERVICE_NOT_INITIALIZED".len());

        let value = handler.with_fallback(|| Ok(7), |_| 0);
        assert_eq!(value, 7);
    }
}
