// Bounded retry for rate-limited platform calls

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use super::errors::DownloadError;

/// How often and how patiently to retry when YouTube answers 429.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Sleep after a rate-limited attempt
    pub backoff: Duration,
    /// Fixed pause before every attempt
    pub settle_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(10),
            settle_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Policy without any sleeping, for callers that only want the bound.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Duration::ZERO,
            settle_delay: Duration::ZERO,
        }
    }

    /// Run `op` until it succeeds, fails with something other than a rate
    /// limit, or the attempts are used up.
    ///
    /// `op` receives the 1-based attempt number. Exhaustion is reported as
    /// [`DownloadError::RetriesExhausted`].
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, DownloadError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, DownloadError>>,
    {
        let max_attempts = self.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if !self.settle_delay.is_zero() {
                sleep(self.settle_delay).await;
            }

            tracing::debug!(label, attempt, max_attempts, "starting attempt");

            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_rate_limited() => {
                    if attempt == max_attempts {
                        break;
                    }
                    tracing::warn!(
                        label,
                        attempt,
                        "rate limit hit (429), retrying in {}s",
                        self.backoff.as_secs()
                    );
                    sleep(self.backoff).await;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::warn!(label, max_attempts, "max retries reached, giving up");
        Err(DownloadError::RetriesExhausted {
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;

    use super::*;

    fn rate_limited() -> DownloadError {
        DownloadError::UpstreamHttp {
            status: 429,
            message: "Too Many Requests".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_two_retries() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let started = Instant::now();

        let result = policy
            .run("resolve", |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(rate_limited())
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // three settle delays and two backoffs
        assert_eq!(started.elapsed(), Duration::from_secs(3 * 5 + 2 * 10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_is_reported() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::default()
            .run("resolve", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(rate_limited()) }
            })
            .await;

        assert!(matches!(
            result,
            Err(DownloadError::RetriesExhausted { attempts: 3 })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::immediate(3)
            .run("resolve", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(DownloadError::VideoUnavailable("gone".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(DownloadError::VideoUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_numbers_are_one_based() {
        let mut seen = Vec::new();
        let _ = RetryPolicy::immediate(2)
            .run("resolve", |attempt| {
                seen.push(attempt);
                async { Err::<(), _>(rate_limited()) }
            })
            .await;
        assert_eq!(seen, vec![1, 2]);
    }
}
