//! Delivery retry with exponential backoff.
//!
//! Every failure is retried the same way; there is no distinction between
//! a rejected payload and a dropped connection.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// How often and how patiently an operation is retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never below 1.
    pub max_attempts: u32,
    /// Wait before the second attempt; doubles after every further failure.
    pub initial_backoff: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(2000),
            operation_name: "delivery".to_string(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            ..Default::default()
        }
    }

    /// Set the operation name used in log lines.
    pub fn named(mut self, operation_name: impl Into<String>) -> Self {
        self.operation_name = operation_name.into();
        self
    }

    /// Wait after the failure of 1-based `attempt`: `b0 * 2^(attempt - 1)`.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff.saturating_mul(2u32.pow(exponent))
    }
}

/// Result of a retried operation.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    /// An attempt succeeded.
    Delivered { value: T, attempts: u32 },
    /// Every attempt failed; `error` is the last one.
    Exhausted { error: E, attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn is_delivered(&self) -> bool {
        matches!(self, RetryOutcome::Delivered { .. })
    }

    /// Attempts made, successful or not.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Delivered { attempts, .. } | RetryOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Run `operation` until it succeeds or the policy runs out of attempts.
///
/// `operation` receives the 1-based attempt number.
///
/// # Example
/// ```ignore
/// let policy = RetryPolicy::new(3, Duration::from_secs(2));
/// let outcome = retry_async(&policy, |_attempt| async {
///     sink.deliver(&artifact, &metadata).await
/// }).await;
/// ```
pub async fn retry_async<F, Fut, T, E>(policy: &RetryPolicy, operation: F) -> RetryOutcome<T, E>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                return RetryOutcome::Delivered {
                    value,
                    attempts: attempt,
                }
            }
            Err(e) if attempt < max_attempts => {
                let delay = policy.backoff_after(attempt);
                warn!(
                    operation = %policy.operation_name,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                debug!(
                    operation = %policy.operation_name,
                    attempts = attempt,
                    "Retries exhausted"
                );
                return RetryOutcome::Exhausted {
                    error: e,
                    attempts: attempt,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));

        assert_eq!(policy.backoff_after(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_after(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_after(3), Duration::from_millis(400));
        assert_eq!(policy.backoff_after(4), Duration::from_millis(800));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_immediate_success() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let outcome = retry_async(&policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(42) }
        })
        .await;

        match outcome {
            RetryOutcome::Delivered { value, attempts } => {
                assert_eq!(value, 42);
                assert_eq!(attempts, 1);
            }
            other => panic!("expected delivery, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_between_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let seen = Mutex::new(Vec::new());

        let outcome = retry_async(&policy, |attempt| {
            seen.lock().unwrap().push(Instant::now());
            async move {
                if attempt < 3 {
                    Err("consumer unavailable")
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(outcome.is_delivered());
        assert_eq!(outcome.attempts(), 3);

        let seen = seen.lock().unwrap();
        assert_eq!(seen[1] - seen[0], Duration::from_secs(2));
        assert_eq!(seen[2] - seen[1], Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_last_error() {
        let policy = RetryPolicy::new(4, Duration::from_millis(10));
        let calls = AtomicU32::new(0);

        let outcome = retry_async(&policy, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), _>(format!("attempt {} failed", attempt)) }
        })
        .await;

        match outcome {
            RetryOutcome::Exhausted { error, attempts } => {
                assert_eq!(attempts, 4);
                assert_eq!(error, "attempt 4 failed");
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
