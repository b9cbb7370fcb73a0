//! Bounded-attempt exponential backoff with jitter (the Retry Driver, C5).
//!
//! Wraps an async operation with retry semantics: exponential delay growth,
//! multiplicative jitter to avoid thundering-herd resonance across
//! concurrent callers, and an `on_retry` observation hook. Two policies are
//! layered on top of the bare delay schedule:
//!
//! - A [`crate::Error::RateLimit`] error's `retry_after` hint takes
//!   precedence over the computed delay when present.
//! - [`crate::Error::is_retryable`] decides whether an error is worth
//!   retrying at all; non-retryable errors propagate on the first attempt.

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (the first call plus up to
    /// `max_attempts - 1` retries).
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Ceiling on any single computed delay, before jitter.
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_multiplier: f64,

    /// Multiplicative jitter fraction (0.0-1.0); +/- `jitter_factor`/2 of the
    /// capped delay is added as noise.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter_factor(mut self, jitter: f64) -> Self {
        self.jitter_factor = jitter.clamp(0.0, 1.0);
        self
    }

    /// Exponential delay for `attempt` (0-indexed), capped at `max_delay`,
    /// with multiplicative jitter applied.
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay_ms = self.initial_delay.as_millis() as f64;
        let exponential_delay = base_delay_ms * self.backoff_multiplier.powi(attempt as i32);

        let capped_delay = exponential_delay.min(self.max_delay.as_millis() as f64);

        let jitter_range = capped_delay * self.jitter_factor;
        let jitter = rand::random::<f64>() * jitter_range;
        let final_delay = capped_delay + jitter - (jitter_range / 2.0);

        Duration::from_millis(final_delay.max(0.0) as u64)
    }

    /// Delay for `attempt`, honoring a rate-limit error's `retry_after` hint
    /// in preference to the computed schedule (§4.5).
    fn delay_for(&self, attempt: u32, error: &Error) -> Duration {
        match error.retry_after() {
            Some(secs) => Duration::from_secs(secs),
            None => self.calculate_delay(attempt),
        }
    }
}

/// Retry `operation` under `config`, skipping non-retryable errors entirely
/// and calling `on_retry(attempt, &error)` before each sleep.
///
/// `attempt` passed to `on_retry` is 1-indexed (the attempt that just
/// failed). Returns the last error once `max_attempts` is exhausted.
pub async fn retry_with_backoff<F, Fut, T>(
    config: RetryConfig,
    mut operation: F,
    mut on_retry: impl FnMut(u32, &Error),
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..config.max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !err.is_retryable() {
                    return Err(err);
                }

                if attempt < config.max_attempts - 1 {
                    on_retry(attempt + 1, &err);
                    let delay = config.delay_for(attempt, &err);
                    sleep(delay).await;
                }

                last_error = Some(err);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::other("retry failed with no error")))
}

/// Convenience wrapper over [`retry_with_backoff`] for callers with no
/// interest in the `on_retry` hook.
pub async fn retry<F, Fut, T>(config: RetryConfig, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_with_backoff(config, operation, |_, _| {}).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_retry_config_builder() {
        let config = RetryConfig::new()
            .with_max_attempts(5)
            .with_initial_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(30))
            .with_backoff_multiplier(1.5)
            .with_jitter_factor(0.2);

        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.initial_delay, Duration::from_millis(500));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.backoff_multiplier, 1.5);
        assert_eq!(config.jitter_factor, 0.2);
    }

    #[test]
    fn test_calculate_delay_grows() {
        let config = RetryConfig::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_backoff_multiplier(2.0)
            .with_jitter_factor(0.0);

        let delay0 = config.calculate_delay(0);
        let delay1 = config.calculate_delay(1);
        let delay2 = config.calculate_delay(2);

        assert!(delay1 > delay0);
        assert!(delay2 > delay1);
    }

    #[test]
    fn test_delay_for_honors_retry_after() {
        let config = RetryConfig::new().with_initial_delay(Duration::from_millis(1));
        let err = Error::rate_limit(Some(5));
        assert_eq!(config.delay_for(0, &err), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_retry_success_on_first_attempt() {
        let config = RetryConfig::new().with_max_attempts(3);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();

        let result = retry(config, move || {
            calls2.fetch_add(1, Ordering::SeqCst);
            async { Ok::<i32, Error>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let config = RetryConfig::new()
            .with_max_attempts(3)
            .with_initial_delay(Duration::from_millis(1));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();

        let result = retry(config, move || {
            let n = calls2.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(Error::api_timeout(10))
                } else {
                    Ok::<i32, Error>(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_attempts() {
        let config = RetryConfig::new()
            .with_max_attempts(2)
            .with_initial_delay(Duration::from_millis(1));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();

        let result: Result<i32> = retry(config, move || {
            calls2.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::api_timeout(10)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_short_circuits() {
        let config = RetryConfig::new().with_max_attempts(5);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();

        let result: Result<i32> = retry(config, move || {
            calls2.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::validation("bad arg")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_on_retry_called_with_attempt_number() {
        let config = RetryConfig::new()
            .with_max_attempts(3)
            .with_initial_delay(Duration::from_millis(1));
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();

        let _: Result<i32> = retry_with_backoff(
            config,
            move || {
                let n = calls2.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(Error::api_timeout(10))
                    } else {
                        Ok(42)
                    }
                }
            },
            move |attempt, _err| seen2.lock().unwrap().push(attempt),
        )
        .await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }
}
