//! Retry with backoff for downloads and Bot API calls.
//!
//! Errors opt in through [`Retryable`]; a server-provided wait
//! (`retry_after`) overrides the computed delay.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::core::config;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// `initial * (attempt + 1)`
    Linear,
    /// `initial * factor^attempt`
    Exponential(f64),
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Extra attempts after the first one
    pub max_retries: u32,
    pub initial_delay: Duration,
    /// Upper bound for a computed delay
    pub max_delay: Duration,
    pub backoff: Backoff,
    /// Add up to 25% random jitter
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            backoff: Backoff::Exponential(2.0),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whole-download retries: 2 extra attempts, 3s then 6s.
    pub fn download() -> Self {
        Self {
            max_retries: config::retry::DOWNLOAD_MAX_RETRIES,
            initial_delay: config::retry::download_step(),
            max_delay: Duration::from_secs(60),
            backoff: Backoff::Linear,
            jitter: false,
        }
    }

    /// Bot API sends; flood-wait replies carry their own delay.
    pub fn telegram_send() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff: Backoff::Exponential(2.0),
            jitter: true,
        }
    }

    #[must_use]
    pub fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn linear(mut self) -> Self {
        self.backoff = Backoff::Linear;
        self
    }

    #[must_use]
    pub fn no_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let initial = self.initial_delay.as_secs_f64();
        let base = match self.backoff {
            Backoff::Linear => initial * f64::from(attempt + 1),
            Backoff::Exponential(factor) => initial * factor.powi(attempt.min(30) as i32),
        };
        let capped = base.min(self.max_delay.as_secs_f64());
        let delay = if self.jitter {
            capped + rand::random::<f64>() * 0.25 * capped
        } else {
            capped
        };
        Duration::from_secs_f64(delay)
    }
}

/// Outcome of [`retry`] with attempt statistics.
#[derive(Debug)]
pub struct RetryResult<T, E> {
    /// The value, or the error of the last attempt
    pub result: Result<T, E>,
    pub attempts: u32,
    pub total_duration: Duration,
}

impl<T, E> RetryResult<T, E> {
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// Server-provided wait, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

#[cfg(feature = "telegram")]
impl Retryable for teloxide::RequestError {
    fn is_retryable(&self) -> bool {
        use teloxide::RequestError;
        matches!(
            self,
            RequestError::RetryAfter(_) | RequestError::Network(_) | RequestError::Io(_)
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            teloxide::RequestError::RetryAfter(secs) => Some(secs.duration()),
            _ => None,
        }
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// `config.max_retries` extra attempts are used up.
pub async fn retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Debug,
{
    let start = Instant::now();
    let mut attempts = 0;

    let result = loop {
        attempts += 1;
        match operation().await {
            Err(e) if attempts <= config.max_retries && e.is_retryable() => {
                let delay = e
                    .retry_after()
                    .unwrap_or_else(|| config.delay_for_attempt(attempts - 1));
                log::warn!(
                    "Attempt {}/{} failed, retrying in {:?}: {:?}",
                    attempts,
                    config.max_retries + 1,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
            }
            other => break other,
        }
    };

    RetryResult {
        result,
        attempts,
        total_duration: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum Flaky {
        Transient,
        Fatal,
        Throttled(Duration),
    }

    impl Retryable for Flaky {
        fn is_retryable(&self) -> bool {
            !matches!(self, Flaky::Fatal)
        }

        fn retry_after(&self) -> Option<Duration> {
            match self {
                Flaky::Throttled(wait) => Some(*wait),
                _ => None,
            }
        }
    }

    fn fast() -> RetryConfig {
        RetryConfig::download().initial_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let outcome = retry(&fast(), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Flaky::Transient)
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.into_result(), Ok("done"));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let outcome = retry(&fast(), || async { Err::<(), _>(Flaky::Transient) }).await;
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.into_result(), Err(Flaky::Transient));
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let outcome = retry(&fast(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Flaky::Fatal)
        })
        .await;

        assert_eq!(outcome.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_wait_overrides_backoff() {
        let config = RetryConfig::download().max_retries(1);
        let calls = AtomicU32::new(0);
        let outcome = retry(&config, || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Flaky::Throttled(Duration::from_millis(5)))
            } else {
                Ok(())
            }
        })
        .await;

        assert!(outcome.result.is_ok());
        // a 3s linear step would have been used without the hint
        assert!(outcome.total_duration < Duration::from_secs(1));
    }

    #[test]
    fn test_download_preset_is_linear_three_then_six() {
        let config = RetryConfig::download();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(3));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(6));
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let config = RetryConfig::telegram_send().no_jitter();
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(8));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(30));
    }
}
