use crate::core::rate_limiter::{RateLimiter, GEOCODER_SERVICE};
use crate::domain::model::Coordinate;
use crate::domain::ports::Geocoder;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_GEOCODER_INTERVAL: Duration = Duration::from_secs(1);

/// Rate-limited front for a [`Geocoder`]. Never fails: errors become `None`.
pub struct FallbackGeocoder {
    service: Arc<dyn Geocoder>,
    limiter: RateLimiter,
}

impl FallbackGeocoder {
    pub fn new(service: Arc<dyn Geocoder>) -> Self {
        Self::with_interval(service, DEFAULT_GEOCODER_INTERVAL)
    }

    pub fn with_interval(service: Arc<dyn Geocoder>, min_interval: Duration) -> Self {
        Self {
            service,
            limiter: RateLimiter::new(min_interval),
        }
    }

    pub async fn geocode(&self, query_text: &str, region_hint: &str) -> Option<Coordinate> {
        let query = query_text.trim();
        if query.is_empty() {
            return None;
        }
        let full_query = match region_hint.trim() {
            "" => query.to_string(),
            hint => format!("{}, {}", query, hint),
        };

        self.limiter.wait_if_needed(GEOCODER_SERVICE).await;
        match self.service.lookup(&full_query).await {
            Ok(Some(coordinate)) => {
                tracing::debug!("Geocoded '{}' to {}", full_query, coordinate);
                Some(coordinate)
            }
            Ok(None) => {
                tracing::debug!("Geocoder found nothing for '{}'", full_query);
                None
            }
            Err(e) => {
                tracing::warn!("⚠️ Geocoder error for '{}': {}", full_query, e);
                None
            }
        }
    }
}

/// Search text from a map-search URL's `query` (or `q`) parameter.
///
/// Form-decoded, so `+` becomes a space. Empty when absent.
pub fn query_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return String::new();
    };
    let mut fallback = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "query" => return value.trim().to_string(),
            "q" if fallback.is_none() => fallback = Some(value.trim().to_string()),
            _ => {}
        }
    }
    fallback.unwrap_or_default()
}
