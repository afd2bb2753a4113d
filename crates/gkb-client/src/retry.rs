//! Retry with exponential backoff for overloaded or flaky servers.
//!
//! The policy is a pure `trials -> delay` function so tests can inject a
//! zero-delay variant.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::cancel::CancelToken;
use crate::error::ClientError;

/// Backoff policy: `delay(trials) = scale * base^trials`, giving near-linear
/// growth early and super-linear growth later with the default 1.01 base.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base: f64,
    pub scale: Duration,
    /// Retries after the first failure; the attempt after the last retry
    /// aborts.
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: 1.01,
            scale: Duration::from_secs(15),
            max_retries: 10,
        }
    }
}

impl BackoffPolicy {
    /// A policy that retries without sleeping, for tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            base: 1.0,
            scale: Duration::ZERO,
            max_retries,
        }
    }

    /// Delay before retry number `trials + 1`.
    pub fn delay(&self, trials: u32) -> Duration {
        self.scale.mul_f64(self.base.powi(trials as i32))
    }
}

/// Runs `f` until it succeeds, fails non-retryably, is cancelled, or
/// exhausts the retry budget. Cancellation is checked before every backoff
/// sleep.
pub async fn with_retry<F, Fut, T>(
    policy: &BackoffPolicy,
    cancel: &CancelToken,
    operation: &str,
    f: F,
) -> Result<T, ClientError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut trials: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => {
                if trials >= policy.max_retries {
                    warn!(
                        operation = %operation,
                        retries = policy.max_retries,
                        error = %err,
                        "retry budget exhausted"
                    );
                    return Err(ClientError::Aborted {
                        retries: policy.max_retries,
                    });
                }
                let delay = policy.delay(trials);
                warn!(
                    operation = %operation,
                    trial = trials + 1,
                    delay_secs = delay.as_secs(),
                    error = %err,
                    "retrying after backoff"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                trials += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_default_policy_delays() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(15));
        // 15 * 1.01^10, a bit over 16.5 seconds.
        let later = policy.delay(10);
        assert!(later > Duration::from_secs(16));
        assert!(later < Duration::from_secs(17));
    }

    #[tokio::test]
    async fn test_retries_exactly_max_retries_on_persistent_overload() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counted = attempts.clone();

        let result = with_retry(
            &BackoffPolicy::immediate(10),
            &CancelToken::never(),
            "test",
            || {
                let attempts = counted.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ClientError::Overload { retry_after: None })
                }
            },
        )
        .await;

        assert!(matches!(result, Err(ClientError::Aborted { retries: 10 })));
        // First attempt plus ten retries.
        assert_eq!(attempts.load(Ordering::SeqCst), 11);
    }

    #[tokio::test]
    async fn test_does_not_retry_non_retryable_errors() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counted = attempts.clone();

        let result = with_retry(
            &BackoffPolicy::immediate(10),
            &CancelToken::never(),
            "test",
            || {
                let attempts = counted.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ClientError::Unauthorized)
                }
            },
        )
        .await;

        assert!(matches!(result, Err(ClientError::Unauthorized)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counted = attempts.clone();

        let result = with_retry(
            &BackoffPolicy::immediate(10),
            &CancelToken::never(),
            "test",
            || {
                let attempts = counted.clone();
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ClientError::Transport("reset".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_backoff() {
        let (handle, token) = cancel_pair();
        let slow = BackoffPolicy {
            base: 1.0,
            scale: Duration::from_secs(3600),
            max_retries: 10,
        };

        let run = tokio::spawn(async move {
            with_retry(&slow, &token, "test", || async {
                Err::<(), _>(ClientError::Overload { retry_after: None })
            })
            .await
        });
        tokio::task::yield_now().await;
        handle.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .expect("cancellation should interrupt the sleep")
            .unwrap();
        assert!(matches!(result, Err(ClientError::Cancelled)));
    }
}
