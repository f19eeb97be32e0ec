//! Retry Policy
//!
//! Bounded exponential backoff for exchange calls. Every attempt runs
//! under `call_timeout`; an attempt that times out counts as a failure, never
//! as a success.

use log::debug;
use stablegrid_ports::{ExchangeError, ExchangeResult};
use std::future::Future;
use std::time::Duration;

/// Retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts including the first one
    pub max_attempts: u32,
    /// Wait after the first failure
    pub initial_backoff: Duration,
    /// Growth factor per failure
    pub multiplier: u32,
    /// Cap on a single wait
    pub max_backoff: Duration,
    /// Deadline for one exchange call
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(250),
            multiplier: 2,
            max_backoff: Duration::from_secs(5),
            call_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Policy that tries once
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Wait before attempt `attempt + 1`, given `attempt` failures so far (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run one exchange call under the timeout
    pub async fn call<T, Fut>(&self, fut: Fut) -> ExchangeResult<T>
    where
        Fut: Future<Output = ExchangeResult<T>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ExchangeError::Timeout),
        }
    }

    /// Run `op` until it succeeds, `should_retry` refuses the error, or the
    /// attempts run out. Returns the last error together with the attempt count.
    pub async fn run<T, F, Fut, P>(
        &self,
        label: &str,
        mut op: F,
        should_retry: P,
    ) -> Result<T, (ExchangeError, u32)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ExchangeResult<T>>,
        P: Fn(&ExchangeError) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.call(op()).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts && should_retry(&e) => {
                    let wait = self.backoff(attempt);
                    debug!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        label, attempt, max_attempts, e, wait
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err((e, attempt)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(250));
        assert_eq!(policy.backoff(2), Duration::from_millis(500));
        assert_eq!(policy.backoff(3), Duration::from_secs(1));
        assert_eq!(policy.backoff(10), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_retried_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result = policy
            .run(
                "place",
                || async {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ExchangeError::Network("reset".into()))
                    } else {
                        Ok(7u64)
                    }
                },
                ExchangeError::is_transient,
            )
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_returns_immediately() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: Result<(), _> = policy
            .run(
                "place",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ExchangeError::Rejected("would cross".into()))
                },
                ExchangeError::is_transient,
            )
            .await;

        assert_eq!(result, Err((ExchangeError::Rejected("would cross".into()), 1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let policy = RetryPolicy {
            max_attempts: 2,
            call_timeout: Duration::from_millis(100),
            ..Default::default()
        };

        let result: Result<(), _> = policy
            .run(
                "cancel",
                || async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                },
                |_| true,
            )
            .await;

        assert_eq!(result, Err((ExchangeError::Timeout, 2)));
    }
}
