use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Service key used for every request against the maps host.
pub const MAPS_SERVICE: &str = "maps";
/// Service key used by the fallback geocoder.
pub const GEOCODER_SERVICE: &str = "geocoder";

/// Enforces a minimum gap between calls tagged with the same service key.
///
/// Built on tokio's clock, so tests running with paused time see the
/// waits without actually sleeping.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_millis(min_interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_interval_ms))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Blocks until `min_interval` has passed since the previous call with
    /// this key, then stamps the key with the current instant.
    pub async fn wait_if_needed(&self, service_key: &str) {
        // 持有鎖直到睡眠結束，同一個 key 的呼叫者會依序排隊
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = last_call.get(service_key) {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                tracing::trace!("Rate limiting '{}' for {:?}", service_key, wait);
                sleep(wait).await;
            }
        }
        last_call.insert(service_key.to_string(), Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_does_not_wait() {
        let limiter = RateLimiter::from_millis(1000);
        let start = Instant::now();
        limiter.wait_if_needed(MAPS_SERVICE).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_calls_are_spaced() {
        let limiter = RateLimiter::from_millis(1000);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.wait_if_needed(MAPS_SERVICE).await;
        }
        assert!(start.elapsed() >= Duration::from_secs(4));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::from_millis(1000);
        let start = Instant::now();
        limiter.wait_if_needed(MAPS_SERVICE).await;
        limiter.wait_if_needed(GEOCODER_SERVICE).await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.wait_if_needed(MAPS_SERVICE).await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_when_interval_already_elapsed() {
        let limiter = RateLimiter::from_millis(1000);
        limiter.wait_if_needed(MAPS_SERVICE).await;
        sleep(Duration::from_secs(2)).await;

        let before = Instant::now();
        limiter.wait_if_needed(MAPS_SERVICE).await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }
}
