use crate::core::rate_limiter::{RateLimiter, MAPS_SERVICE};
use crate::domain::model::FetchedPage;
use crate::domain::ports::RedirectResolver;
use crate::utils::error::{EtlError, Result};
use percent_encoding::percent_decode_str;
use std::time::Duration;

pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        Self {
            timeout,
            max_retries,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn check(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(EtlError::InvalidConfigValueError {
                field: "resolver.timeout_seconds".to_string(),
                value: "0".to_string(),
                reason: "Timeout must be greater than zero".to_string(),
            });
        }
        if self.max_retries == 0 {
            return Err(EtlError::InvalidConfigValueError {
                field: "resolver.max_retries".to_string(),
                value: "0".to_string(),
                reason: "At least one attempt is required".to_string(),
            });
        }
        Ok(())
    }
}

/// Percent-decodes a URL so patterns match human-readable text.
pub fn decode_url(url: &str) -> String {
    percent_decode_str(url).decode_utf8_lossy().into_owned()
}

/// Fetches `url` through `resolver`, retrying failed attempts.
///
/// Every attempt takes one slot from `limiter` under [`MAPS_SERVICE`].
/// Only retryable errors are retried, after the policy's fixed backoff.
/// When all attempts fail the last error is returned. The final URL comes back percent-decoded.
pub async fn resolve_with_retries<R>(
    resolver: &R,
    limiter: &RateLimiter,
    url: &str,
    policy: &RetryPolicy,
) -> Result<FetchedPage>
where
    R: RedirectResolver + ?Sized,
{
    policy.check()?;

    let mut attempt = 1;
    loop {
        limiter.wait_if_needed(MAPS_SERVICE).await;
        match resolver.fetch(url, policy.timeout).await {
            Ok(page) => {
                tracing::debug!(
                    "{} resolved {} on attempt {}",
                    resolver.name(),
                    url,
                    attempt
                );
                return Ok(FetchedPage {
                    final_url: decode_url(&page.final_url),
                    body: page.body,
                });
            }
            Err(e) if attempt < policy.max_retries && e.is_retryable() => {
                tracing::debug!(
                    "Attempt {}/{} for {} failed: {}; retrying in {:?}",
                    attempt,
                    policy.max_retries,
                    url,
                    e,
                    policy.backoff
                );
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    /// Fails a fixed number of times before succeeding.
    struct FlakyResolver {
        failures: u32,
        calls: AtomicU32,
        final_url: String,
    }

    impl FlakyResolver {
        fn new(failures: u32, final_url: &str) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                final_url: final_url.to_string(),
            }
        }
    }

    #[async_trait]
    impl RedirectResolver for FlakyResolver {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchedPage> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(EtlError::TransientFetch {
                    url: url.to_string(),
                    message: format!("connection reset (call {})", call),
                });
            }
            Ok(FetchedPage {
                final_url: self.final_url.clone(),
                body: None,
            })
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(15), max_retries)
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_last_allowed_attempt() {
        let resolver = FlakyResolver::new(2, "https://maps/place/Zocalo/@19.4326,-99.1332,17z");
        let limiter = RateLimiter::from_millis(1000);

        let page = resolve_with_retries(&resolver, &limiter, "https://short", &policy(3))
            .await
            .unwrap();

        assert_eq!(page.final_url, "https://maps/place/Zocalo/@19.4326,-99.1332,17z");
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_attempt_waits_on_rate_limiter() {
        let resolver = FlakyResolver::new(2, "https://maps/place/A/@1.0,2.0");
        let limiter = RateLimiter::from_millis(1000);
        let no_backoff = policy(3).with_backoff(Duration::ZERO);
        let start = Instant::now();

        resolve_with_retries(&resolver, &limiter, "https://short", &no_backoff)
            .await
            .unwrap();

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_last_error_when_exhausted() {
        let resolver = FlakyResolver::new(5, "unused");
        let limiter = RateLimiter::from_millis(0);

        let err = resolve_with_retries(&resolver, &limiter, "https://short", &policy(2))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("call 2"));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_between_attempts() {
        let resolver = FlakyResolver::new(1, "https://maps/place/A/@1.0,2.0");
        let limiter = RateLimiter::from_millis(0);
        let start = Instant::now();

        resolve_with_retries(&resolver, &limiter, "https://short", &policy(2))
            .await
            .unwrap();

        assert!(start.elapsed() >= DEFAULT_RETRY_BACKOFF);
    }

    struct BrokenResolver {
        calls: AtomicU32,
    }

    #[async_trait]
    impl RedirectResolver for BrokenResolver {
        async fn fetch(&self, _url: &str, _timeout: Duration) -> Result<FetchedPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(EtlError::ProcessingError {
                message: "unsupported URL".to_string(),
            })
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_non_retryable_error_is_not_retried() {
        let resolver = BrokenResolver {
            calls: AtomicU32::new(0),
        };
        let limiter = RateLimiter::from_millis(0);

        assert!(resolve_with_retries(&resolver, &limiter, "u", &policy(3))
            .await
            .is_err());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejects_invalid_policy() {
        let resolver = FlakyResolver::new(0, "unused");
        let limiter = RateLimiter::from_millis(0);

        assert!(resolve_with_retries(&resolver, &limiter, "u", &policy(0))
            .await
            .is_err());
        let zero_timeout = RetryPolicy::new(Duration::ZERO, 1);
        assert!(resolve_with_retries(&resolver, &limiter, "u", &zero_timeout)
            .await
            .is_err());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_final_url_is_percent_decoded() {
        let resolver = FlakyResolver::new(0, "https://maps/place/Z%C3%B3calo/@19.4326,-99.1332,17z");
        let limiter = RateLimiter::from_millis(0);

        let page = resolve_with_retries(&resolver, &limiter, "u", &policy(1))
            .await
            .unwrap();

        assert_eq!(page.final_url, "https://maps/place/Zócalo/@19.4326,-99.1332,17z");
    }
}
