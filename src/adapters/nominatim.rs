use crate::domain::model::Coordinate;
use crate::domain::ports::Geocoder;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Nominatim returns coordinates as strings.
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

/// OpenStreetMap Nominatim free-text search.
///
/// The public instance's usage policy requires an identifying User-Agent
/// and at most one request per second; the caller enforces the latter.
pub struct NominatimGeocoder {
    client: Client,
    endpoint: String,
}

impl NominatimGeocoder {
    pub fn new(endpoint: &str, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn lookup(&self, query: &str) -> Result<Option<Coordinate>> {
        let url = format!("{}/search", self.endpoint);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| EtlError::GeocodeService {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(EtlError::GeocodeService {
                message: format!("HTTP {} for '{}'", response.status(), query),
            });
        }

        let places: Vec<NominatimPlace> =
            response.json().await.map_err(|e| EtlError::GeocodeService {
                message: format!("unexpected response: {}", e),
            })?;

        Ok(places.first().and_then(|place| {
            tracing::debug!(
                "Nominatim matched '{}' to {}",
                query,
                place.display_name.as_deref().unwrap_or("?")
            );
            Coordinate::parse(&place.lat, &place.lon)
        }))
    }
}
