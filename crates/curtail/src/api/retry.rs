//! Bounded retry for read-only upstream calls.
//!
//! Retries transient failures (HTTP 429, 500, 502, 503, 504 and transport
//! errors) with a fixed or exponentially growing delay. Client errors are
//! never retried, and mutating operations must not be routed through here.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::UpstreamError;

/// How many times, and how patiently, to retry a read.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first (1 = no retries).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub delay: Duration,
    /// Multiplier applied per retry. `1.0` gives a fixed delay.
    pub backoff: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
            backoff: 1.0,
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay before retry number `retry` (0-indexed).
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let base = self.delay.as_secs_f64() * self.backoff.max(1.0).powi(exponent);
        Duration::from_secs_f64(base.min(self.max_delay.as_secs_f64()))
    }
}

/// Run `call` until it succeeds, fails permanently, or attempts run out.
///
/// The last error is returned as-is.
pub async fn retry_read<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut call: F,
) -> Result<T, UpstreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < policy.max_attempts && e.is_transient() => {
                let delay = policy.delay_for_attempt(attempt - 1);
                warn!(
                    "Transient upstream error in {label} (attempt {attempt}/{}): {e}. Retrying in {delay:?}...",
                    policy.max_attempts,
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn unavailable() -> UpstreamError {
        UpstreamError::Status {
            status: 503,
            body: "unavailable".into(),
        }
    }

    #[test]
    fn fixed_delay_by_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), policy.delay_for_attempt(3));
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let policy = RetryPolicy {
            backoff: 2.0,
            max_delay: Duration::from_secs(2),
            ..Default::default()
        };
        assert!(policy.delay_for_attempt(1) > policy.delay_for_attempt(0));
        assert_eq!(policy.delay_for_attempt(30), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = &AtomicU32::new(0);
        let result = retry_read(&fast(3), "list_tables", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(unavailable())
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = retry_read(&fast(3), "get_logs", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(unavailable())
        })
        .await;
        assert!(matches!(result, Err(UpstreamError::Status { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = retry_read(&fast(5), "get_advisors", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(UpstreamError::Status {
                status: 401,
                body: "unauthorized".into(),
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
