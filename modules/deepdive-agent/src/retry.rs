//! Bounded retry with exponential backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Attempt count and backoff schedule for a fallible async operation.
///
/// The delay starts at `initial_delay`, is multiplied by `factor` after each
/// failure and never exceeds `max_delay`. The last attempt's error is
/// returned to the caller unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Default backoff schedule with `attempts` total attempts.
    pub fn attempts(attempts: u32) -> Self {
        Self {
            attempts,
            ..Self::default()
        }
    }

    pub fn with_delays(mut self, initial_delay: Duration, max_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self.max_delay = max_delay;
        self
    }

    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut delay = self.initial_delay;
        for attempt in 1..self.attempts.max(1) {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        label,
                        attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "Operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    // Non-finite or overflowing products saturate at the cap.
                    delay = Duration::try_from_secs_f64(delay.as_secs_f64() * self.factor)
                        .map_or(self.max_delay, |next| next.min(self.max_delay));
                }
            }
        }
        operation().await
    }
}

/// Run `operation` up to `times` attempts with the given backoff schedule.
pub async fn retry<T, E, F, Fut>(
    times: u32,
    initial_delay: Duration,
    max_delay: Duration,
    factor: f64,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    RetryPolicy {
        attempts: times,
        initial_delay,
        max_delay,
        factor,
    }
    .run("retry", operation)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn fails_once_then_succeeds_after_one_initial_delay() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<&str, String> = retry(
            2,
            Duration::from_millis(100),
            Duration::from_millis(1000),
            2.0,
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("connection reset".to_string())
                } else {
                    Ok("page text")
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "page text");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(started.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn last_error_propagates_after_all_attempts() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<(), String> = RetryPolicy::attempts(3)
            .run("test", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(format!("failure {n}"))
            })
            .await;

        assert_eq!(result.unwrap_err(), "failure 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms then 200ms between the three attempts
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_capped_at_max_delay() {
        let started = Instant::now();
        let policy = RetryPolicy {
            attempts: 4,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(150),
            factor: 10.0,
        };

        let result: Result<(), &str> = policy.run("capped", || async { Err("down") }).await;

        assert!(result.is_err());
        // 100 + 150 + 150
        assert_eq!(started.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn huge_factor_saturates_at_max_delay() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<&str, &str> = retry(
            3,
            Duration::from_millis(100),
            Duration::from_millis(1000),
            1e30,
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("timeout")
                } else {
                    Ok("done")
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms then the 1000ms cap
        assert_eq!(started.elapsed(), Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_never_sleeps() {
        let started = Instant::now();
        let result: Result<(), &str> = RetryPolicy::attempts(1).run("once", || async { Err("x") }).await;
        assert!(result.is_err());
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
