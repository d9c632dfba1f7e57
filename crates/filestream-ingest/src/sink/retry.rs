//! Deadline-bounded exponential backoff for sink inserts.
//!
//! Unlike a fixed retry count, the budget here is wall time: the operation
//! is attempted until it succeeds, fails permanently, or the deadline
//! passes. An attempt still in flight when the deadline passes is abandoned.

use super::SinkError;
use filestream_core::metrics::SINK_RETRIES_TOTAL;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Backoff schedule between attempts.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Cap for exponential growth.
    pub max_delay: Duration,

    /// Growth factor per retry.
    pub backoff_multiplier: f64,
}

impl BackoffConfig {
    /// 0.5s, 1s, 2s, 4s, 5s, 5s, ...
    pub const DEFAULT: Self = Self {
        initial_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(5),
        backoff_multiplier: 2.0,
    };

    /// Delay for the given retry (0-indexed), capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_multiplier.powi(attempt as i32);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Run `operation` until it succeeds, fails permanently, or `deadline` elapses.
///
/// Permanent errors are returned as-is. Running out of time yields
/// [`SinkError::DeadlineExceeded`] carrying the last transient error.
pub async fn retry_within_deadline<T, F, Fut>(
    deadline: Duration,
    backoff: BackoffConfig,
    mut operation: F,
) -> Result<T, SinkError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SinkError>>,
{
    let expires_at = Instant::now() + deadline;
    let mut attempts = 0u32;
    let mut last_error = String::from("no attempt completed");

    loop {
        attempts += 1;

        match tokio::time::timeout_at(expires_at, operation()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if e.is_transient() => {
                tracing::warn!(attempt = attempts, error = %e, "sink insert failed, retrying");
                last_error = e.to_string();
            }
            Ok(Err(e)) => return Err(e),
            Err(_elapsed) => {
                last_error = format!("attempt {attempts} still running at deadline");
                break;
            }
        }

        let delay = backoff.delay_for_attempt(attempts - 1);
        if Instant::now() + delay >= expires_at {
            break;
        }
        metrics::counter!(SINK_RETRIES_TOTAL).increment(1);
        tokio::time::sleep(delay).await;
    }

    Err(SinkError::DeadlineExceeded {
        deadline,
        attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    const FAST: BackoffConfig = BackoffConfig {
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        backoff_multiplier: 2.0,
    };

    #[test]
    fn test_default_delays_grow_then_cap() {
        let config = BackoffConfig::DEFAULT;
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(4), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_within_deadline(Duration::from_secs(1), FAST, move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, SinkError>(42) }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_within_deadline(Duration::from_secs(5), FAST, move || {
            let n = counter_clone.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(SinkError::Transient("connection reset".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: Result<(), _> = retry_within_deadline(Duration::from_secs(5), FAST, move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            async { Err(SinkError::Permanent("unknown table".to_string())) }
        })
        .await;

        assert_eq!(result, Err(SinkError::Permanent("unknown table".to_string())));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_persistent_transient_errors_exhaust_deadline() {
        let result: Result<(), _> =
            retry_within_deadline(Duration::from_millis(60), FAST, || async {
                Err(SinkError::Transient("503 service unavailable".to_string()))
            })
            .await;

        match result {
            Err(SinkError::DeadlineExceeded {
                attempts,
                last_error,
                ..
            }) => {
                assert!(attempts >= 2);
                assert!(last_error.contains("503"));
            }
            other => panic!("expected DeadlineExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hung_attempt_is_cut_off_at_deadline() {
        let started = std::time::Instant::now();
        let result: Result<(), _> =
            retry_within_deadline(Duration::from_millis(50), FAST, || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(SinkError::DeadlineExceeded { attempts: 1, .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
