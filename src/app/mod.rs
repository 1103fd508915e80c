// App layer: wires settings into concrete adapters and the resolution pipeline.

use crate::adapters::{HttpRedirectResolver, LocalStorage, NominatimGeocoder, WebDriverRedirectResolver};
use crate::config::{ResolverKind, Settings};
use crate::core::geocoder::FallbackGeocoder;
use crate::core::pipeline::GeocodePipeline;
use crate::core::rate_limiter::RateLimiter;
use crate::core::redirect::RetryPolicy;
use crate::core::resolution::ResolutionPipeline;
use crate::domain::ports::RedirectResolver;
use crate::utils::error::Result;
use std::sync::Arc;
use std::time::Duration;

pub fn build_resolver(settings: &Settings) -> Result<Arc<dyn RedirectResolver>> {
    let resolver: Arc<dyn RedirectResolver> = match settings.resolver.kind {
        ResolverKind::Http => Arc::new(HttpRedirectResolver::new(&settings.resolver.user_agent)?),
        ResolverKind::Browser => Arc::new(
            WebDriverRedirectResolver::new(&settings.resolver.webdriver_url)?
                .with_poll_interval(Duration::from_millis(settings.resolver.poll_interval_ms)),
        ),
    };
    Ok(resolver)
}

pub fn build_resolution(settings: &Settings) -> Result<ResolutionPipeline> {
    let policy = RetryPolicy::new(settings.resolver.timeout(), settings.resolver.max_retries)
        .with_backoff(settings.resolver.retry_backoff());

    let mut resolution = ResolutionPipeline::new(build_resolver(settings)?, policy)
        .with_rate_limiter(RateLimiter::from_millis(settings.resolver.min_interval_ms))
        .with_record_delay(settings.resolver.record_delay())
        .with_bounds(settings.geocoder.bounds);

    if settings.geocoder.enabled {
        let service = NominatimGeocoder::new(&settings.geocoder.endpoint, &settings.geocoder.user_agent)?;
        let geocoder = FallbackGeocoder::with_interval(
            Arc::new(service),
            Duration::from_millis(settings.geocoder.min_interval_ms),
        );
        resolution = resolution.with_geocoder(geocoder, &settings.geocoder.region_hint);
    }

    Ok(resolution)
}

/// Local-disk pipeline; input and output paths are taken as given.
pub fn build_pipeline(settings: Settings) -> Result<GeocodePipeline<LocalStorage>> {
    let resolution = build_resolution(&settings)?;
    Ok(GeocodePipeline::new(LocalStorage::new("."), settings, resolution))
}
