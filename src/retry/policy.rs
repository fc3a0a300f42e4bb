use crate::config::RetryConfig;
use crate::retry::{ErrorKind, IngestError};
use std::future::Future;
use std::time::Duration;

/// Kind-aware base delay: `base * multiplier(kind)`
///
/// NotFound maps to zero because it is never retried. Saturates at
/// `Duration::MAX`.
pub fn delay_for(kind: ErrorKind, base: Duration) -> Duration {
    base.checked_mul(kind.delay_multiplier()).unwrap_or(Duration::MAX)
}

/// Retry policy shared by every source
///
/// | Kind | Retried | Delay before attempt n+1 |
/// |------|---------|--------------------------|
/// | NotFound | never | - |
/// | Timeout | up to `max_retries` | `base * 1 * 2^(n-1)` |
/// | Unknown | up to `max_retries` | `base * 2 * 2^(n-1)` |
/// | Forbidden | up to `max_retries` | `base * 3 * 2^(n-1)` |
/// | BotChallenge | up to `max_retries` | `base * 4 * 2^(n-1)` |
/// | RateLimited | up to `max_retries` | `base * 5 * 2^(n-1)` |
///
/// Validation failures and duplicates are never retried either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, Duration::from_millis(config.base_delay))
    }

    /// Delay after the given failed attempt (1-based), saturating
    pub fn backoff(&self, kind: ErrorKind, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        delay_for(kind, self.base_delay)
            .checked_mul(2u32.pow(exponent))
            .unwrap_or(Duration::MAX)
    }

    /// Runs `op` until it succeeds, fails terminally, or retries run out
    ///
    /// `op` receives the 1-based attempt number. Only
    /// [`IngestError::Retryable`] failures are retried; the last error is
    /// returned once `max_retries` retries have been spent.
    pub async fn retry<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, IngestError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, IngestError>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(IngestError::Retryable { kind, message }) if attempt <= self.max_retries => {
                    let delay = self.backoff(kind, attempt);
                    tracing::warn!(
                        "{}: {} on attempt {}/{}, retrying in {:?} ({})",
                        label,
                        kind,
                        attempt,
                        self.max_retries + 1,
                        delay,
                        message
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::warn!("{}: giving up after {} attempts: {}", label, attempt, e);
                    } else {
                        tracing::debug!("{}: not retrying: {}", label, e);
                    }
                    return Err(e);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1000))
    }

    #[test]
    fn test_rate_limited_backoff_formula() {
        let p = policy();
        for attempt in 1..=4 {
            let expected = Duration::from_millis(1000) * 5 * 2u32.pow(attempt - 1);
            assert_eq!(p.backoff(ErrorKind::RateLimited, attempt), expected);
        }
    }

    #[test]
    fn test_huge_base_delay_saturates() {
        let p = RetryPolicy::new(3, Duration::from_millis(u64::MAX));
        assert_eq!(p.backoff(ErrorKind::RateLimited, 1), Duration::MAX);
        assert_eq!(p.backoff(ErrorKind::Timeout, 40), Duration::MAX);
        assert_eq!(delay_for(ErrorKind::BotChallenge, Duration::MAX), Duration::MAX);
    }

    #[test]
    fn test_rate_limited_delay_exceeds_timeout_delay() {
        let base = Duration::from_millis(750);
        assert!(delay_for(ErrorKind::RateLimited, base) > delay_for(ErrorKind::Timeout, base));
        assert_eq!(delay_for(ErrorKind::NotFound, base), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_attempted_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy()
            .retry("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(IngestError::from_kind(ErrorKind::NotFound, "HTTP 404")) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(IngestError::Terminal {
                kind: ErrorKind::NotFound,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy()
            .retry("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(IngestError::ValidationFailed("empty extract".into())) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success_with_backoff() {
        let start = Instant::now();
        let result = policy()
            .retry("test", |attempt| async move {
                if attempt < 3 {
                    Err(IngestError::from_kind(ErrorKind::Timeout, "timed out"))
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        // 1s after attempt 1, 2s after attempt 2
        assert_eq!(Instant::now() - start, Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result: Result<(), _> = policy()
            .retry("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(IngestError::from_kind(ErrorKind::RateLimited, "HTTP 429")) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(matches!(
            result,
            Err(IngestError::Retryable {
                kind: ErrorKind::RateLimited,
                ..
            })
        ));
        // 5s + 10s + 20s
        assert_eq!(Instant::now() - start, Duration::from_secs(35));
    }
}
