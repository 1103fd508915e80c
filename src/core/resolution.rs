//! Per-record strategy chain and the sequential batch loop around it.
//!
//! Each record goes through:
//!
//! 1. pre-checks (stored pair, `@lat,lon` already in the URL) with no network,
//! 2. redirect fetch + URL pattern,
//! 3. HTML patterns on the fetched body,
//! 4. free-text geocoding of the URL's search query.
//!
//! A stage yields a [`StrategyOutcome`]; the first `Resolved` wins.

use crate::core::extractor::{has_embedded_coordinate, try_html_patterns, try_url_pattern};
use crate::core::geocoder::{query_from_url, FallbackGeocoder};
use crate::core::rate_limiter::RateLimiter;
use crate::core::redirect::{resolve_with_retries, RetryPolicy};
use crate::domain::model::{
    Coordinate, FetchedPage, InputRecord, RecordOutcome, RegionBounds, ResolutionAttempt,
    ResolutionReport, Strategy, StrategyOutcome,
};
use crate::domain::ports::RedirectResolver;
use crate::utils::error::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_RECORD_DELAY: Duration = Duration::from_secs(1);

const NETWORK_CHAIN: [Strategy; 3] = [Strategy::UrlPattern, Strategy::HtmlPattern, Strategy::Geocode];

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub outcomes: Vec<RecordOutcome>,
    pub report: ResolutionReport,
}

pub struct ResolutionPipeline {
    resolver: Arc<dyn RedirectResolver>,
    geocoder: Option<FallbackGeocoder>,
    limiter: RateLimiter,
    policy: RetryPolicy,
    record_delay: Duration,
    region_hint: String,
    bounds: Option<RegionBounds>,
    cancel: Arc<AtomicBool>,
}

impl ResolutionPipeline {
    pub fn new(resolver: Arc<dyn RedirectResolver>, policy: RetryPolicy) -> Self {
        Self {
            resolver,
            geocoder: None,
            limiter: RateLimiter::new(Duration::from_secs(1)),
            policy,
            record_delay: DEFAULT_RECORD_DELAY,
            region_hint: String::new(),
            bounds: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_geocoder(mut self, geocoder: FallbackGeocoder, region_hint: &str) -> Self {
        self.geocoder = Some(geocoder);
        self.region_hint = region_hint.to_string();
        self
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_record_delay(mut self, delay: Duration) -> Self {
        self.record_delay = delay;
        self
    }

    pub fn with_bounds(mut self, bounds: Option<RegionBounds>) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Setting this flag stops the batch before the next record.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn accept(&self, candidate: Option<Coordinate>, strategy: Strategy) -> StrategyOutcome {
        match candidate {
            Some(coordinate) => match &self.bounds {
                Some(bounds) if !bounds.contains(&coordinate) => {
                    tracing::debug!(
                        "Discarding {} from {}: outside region bounds",
                        coordinate,
                        strategy
                    );
                    StrategyOutcome::NeedsNextStrategy
                }
                _ => StrategyOutcome::Resolved(coordinate),
            },
            None => StrategyOutcome::NeedsNextStrategy,
        }
    }

    async fn run_stage(
        &self,
        strategy: Strategy,
        record: &InputRecord,
        fetched: &std::result::Result<FetchedPage, String>,
    ) -> ResolutionAttempt {
        match strategy {
            Strategy::UrlPattern => match fetched {
                Ok(page) => ResolutionAttempt::new(
                    strategy,
                    &page.final_url,
                    self.accept(try_url_pattern(&page.final_url), strategy),
                ),
                Err(reason) => {
                    ResolutionAttempt::new(strategy, "", StrategyOutcome::Failed(reason.clone()))
                }
            },
            Strategy::HtmlPattern => match fetched {
                Ok(FetchedPage {
                    body: Some(body), ..
                }) => ResolutionAttempt::new(
                    strategy,
                    body,
                    self.accept(try_html_patterns(body), strategy),
                ),
                _ => ResolutionAttempt::new(strategy, "", StrategyOutcome::NeedsNextStrategy),
            },
            Strategy::Geocode => {
                let Some(geocoder) = &self.geocoder else {
                    return ResolutionAttempt::new(
                        strategy,
                        "",
                        StrategyOutcome::NeedsNextStrategy,
                    );
                };
                let query = query_from_url(&record.url);
                if query.is_empty() {
                    return ResolutionAttempt::new(
                        strategy,
                        "",
                        StrategyOutcome::Failed("no search text in URL for geocoding".to_string()),
                    );
                }
                let outcome = match geocoder.geocode(&query, &self.region_hint).await {
                    Some(coordinate) => self.accept(Some(coordinate), strategy),
                    None => StrategyOutcome::Failed(format!("geocoder found no match for '{}'", query)),
                };
                ResolutionAttempt::new(strategy, &query, outcome)
            }
            Strategy::Provided | Strategy::EmbeddedUrl => {
                ResolutionAttempt::new(strategy, "", StrategyOutcome::NeedsNextStrategy)
            }
        }
    }

    /// Runs the strategy chain for one record.
    pub async fn resolve_record(&self, record: &InputRecord) -> Result<RecordOutcome> {
        if let Some(existing) = record.existing {
            return Ok(RecordOutcome::skipped(record.index, existing, Strategy::Provided));
        }
        if has_embedded_coordinate(&record.url) {
            return Ok(match try_url_pattern(&record.url) {
                Some(coordinate) => {
                    RecordOutcome::skipped(record.index, coordinate, Strategy::EmbeddedUrl)
                }
                None => RecordOutcome::unresolved(
                    record.index,
                    Some("embedded coordinate is out of range".to_string()),
                    false,
                ),
            });
        }
        if record.url.is_empty() {
            return Ok(RecordOutcome::unresolved(
                record.index,
                Some("empty URL".to_string()),
                false,
            ));
        }

        let fetched = match resolve_with_retries(
            self.resolver.as_ref(),
            &self.limiter,
            &record.url,
            &self.policy,
        )
        .await
        {
            Ok(page) => Ok(page),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => Err(e.to_string()),
        };

        let expanded_url = match &fetched {
            Ok(page) if has_embedded_coordinate(&page.final_url) => Some(page.final_url.clone()),
            _ => None,
        };

        let mut last_error = None;
        for strategy in NETWORK_CHAIN {
            let attempt = self.run_stage(strategy, record, &fetched).await;
            tracing::debug!(
                "Row {} {}: {:?} ({})",
                record.index,
                attempt.strategy,
                attempt.outcome,
                attempt.raw_response
            );
            match attempt.outcome {
                StrategyOutcome::Resolved(coordinate) => {
                    return Ok(RecordOutcome {
                        index: record.index,
                        coordinate: Some(coordinate),
                        strategy: Some(strategy),
                        expanded_url,
                        error: None,
                        touched_network: true,
                    });
                }
                StrategyOutcome::NeedsNextStrategy => {}
                StrategyOutcome::Failed(reason) => last_error = Some(reason),
            }
        }

        Ok(RecordOutcome {
            expanded_url,
            ..RecordOutcome::unresolved(
                record.index,
                Some(last_error.unwrap_or_else(|| "no strategy produced a coordinate".to_string())),
                true,
            )
        })
    }

    /// Resolves records one at a time, never aborting on a per-record error.
    pub async fn run(&self, records: &[InputRecord]) -> BatchResult {
        let total = records.len();
        let mut report = ResolutionReport::new(total);
        let mut outcomes = Vec::with_capacity(total);

        for (position, record) in records.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                tracing::warn!(
                    "🛑 Interrupted after {}/{} records; remaining rows are left as-is",
                    position,
                    total
                );
                report.interrupted = true;
                break;
            }

            let outcome = match self.resolve_record(record).await {
                Ok(outcome) => outcome,
                Err(e) => RecordOutcome::unresolved(record.index, Some(e.to_string()), true),
            };

            match (&outcome.coordinate, &outcome.strategy) {
                (Some(coordinate), Some(strategy)) => tracing::info!(
                    "[{}/{}] row {} → {} via {}",
                    position + 1,
                    total,
                    record.index,
                    coordinate,
                    strategy
                ),
                _ => tracing::warn!(
                    "⚠️ [{}/{}] row {}: could not resolve ({})",
                    position + 1,
                    total,
                    record.index,
                    outcome.error.as_deref().unwrap_or("unknown error")
                ),
            }

            report.record(&outcome, &record.url);
            let pause = outcome.touched_network && position + 1 < total;
            outcomes.push(outcome);

            // 每筆之間固定暫停，避免觸發服務端的封鎖
            if pause && !self.record_delay.is_zero() {
                tokio::time::sleep(self.record_delay).await;
            }
        }

        if let Err(e) = self.resolver.shutdown().await {
            tracing::warn!("Failed to shut down {} resolver: {}", self.resolver.name(), e);
        }

        report.finish();
        BatchResult { outcomes, report }
    }
}
