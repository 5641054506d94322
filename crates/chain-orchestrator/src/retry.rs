//! Configurable retry mechanism for parent chain, database and reorg operations.

use std::{fmt::Debug, time::Duration};

/// A trait for errors that can indicate whether an operation can be retried.
pub trait CanRetry {
    /// Returns true if the operation that failed with the error can be retried.
    fn can_retry(&self) -> bool;
}

/// A type used for retrying transient failures in operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retry {
    /// Maximum number of retry attempts. None means infinite retries
    pub max_retries: Option<usize>,
    /// Initial delay between retries in milliseconds
    pub initial_delay_ms: u64,
    /// Whether to use exponential backoff
    pub exponential_backoff: bool,
    /// Upper bound on the delay between retries in milliseconds
    pub max_delay_ms: u64,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_delay_ms: 50,
            exponential_backoff: true,
            max_delay_ms: 10_000,
        }
    }
}

impl Retry {
    /// Creates a new [`Retry`] with the specified parameters.
    pub const fn new(
        max_retries: Option<usize>,
        initial_delay_ms: u64,
        exponential_backoff: bool,
    ) -> Self {
        Self { max_retries, initial_delay_ms, exponential_backoff, max_delay_ms: 10_000 }
    }

    /// Returns the delay before the retry `attempt`, starting at 1.
    pub fn delay(&self, attempt: usize) -> Duration {
        let delay_ms = if self.exponential_backoff {
            let exponent = attempt.saturating_sub(1).min(32) as u32;
            self.initial_delay_ms.saturating_mul(2_u64.saturating_pow(exponent))
        } else {
            self.initial_delay_ms
        };
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    /// Retry an asynchronous operation with the configured retry strategy. Errors that cannot be
    /// retried are returned immediately.
    pub async fn retry<F, Fut, T, E>(&self, operation_name: &str, operation: F) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: CanRetry + Debug,
    {
        let mut attempt: usize = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if !error.can_retry() {
                        return Err(error);
                    }
                    if let Some(max_retries) = self.max_retries {
                        if attempt >= max_retries {
                            return Err(error);
                        }
                    }

                    attempt += 1;
                    let delay = self.delay(attempt);
                    tracing::debug!(
                        target: "rollup::orchestrator",
                        operation = operation_name,
                        error = ?error,
                        attempt,
                        ?delay,
                        "Retrying operation"
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CanRetry, Retry};
    use std::{cell::RefCell, time::Duration};

    #[derive(Debug, PartialEq, Eq)]
    enum TestError {
        Transient,
        Fatal,
    }

    impl CanRetry for TestError {
        fn can_retry(&self) -> bool {
            matches!(self, Self::Transient)
        }
    }

    #[tokio::test]
    async fn test_retry_success_on_first_attempt() {
        let attempt = RefCell::new(0);
        let retry = Retry::new(Some(3), 10, false);
        let result = retry
            .retry("test_operation", || {
                *attempt.borrow_mut() += 1;
                async move { Ok::<i32, TestError>(42) }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(*attempt.borrow(), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let attempt = RefCell::new(0);
        let retry = Retry::new(Some(5), 10, false);
        let result = retry
            .retry("test_operation", || {
                *attempt.borrow_mut() += 1;
                let current_attempt = *attempt.borrow();
                async move {
                    if current_attempt < 3 {
                        Err(TestError::Transient)
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(*attempt.borrow(), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let attempt = RefCell::new(0);
        let retry = Retry::new(Some(2), 10, false);
        let result = retry
            .retry("test_operation", || {
                *attempt.borrow_mut() += 1;
                async move { Err::<i32, _>(TestError::Transient) }
            })
            .await;

        assert_eq!(result, Err(TestError::Transient));
        assert_eq!(*attempt.borrow(), 3); // 1 initial + 2 retries
    }

    #[tokio::test]
    async fn test_retry_stops_on_fatal_error() {
        let attempt = RefCell::new(0);
        let retry = Retry::default();
        let result = retry
            .retry("test_operation", || {
                *attempt.borrow_mut() += 1;
                async move { Err::<i32, _>(TestError::Fatal) }
            })
            .await;

        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(*attempt.borrow(), 1);
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let retry = Retry { max_delay_ms: 1_000, ..Retry::new(None, 100, true) };

        assert_eq!(retry.delay(1), Duration::from_millis(100));
        assert_eq!(retry.delay(3), Duration::from_millis(400));
        assert_eq!(retry.delay(10), Duration::from_millis(1_000));
        assert_eq!(retry.delay(usize::MAX), Duration::from_millis(1_000));
        assert_eq!(Retry::new(None, 100, false).delay(7), Duration::from_millis(100));
    }
}
