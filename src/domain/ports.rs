use crate::domain::model::{Coordinate, FetchedPage, Table, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// One navigation against a short URL, following redirects to the final page.
///
/// Implementations make exactly one attempt; retries, backoff and rate
/// limiting live in [`crate::core::redirect::resolve_with_retries`].
#[async_trait]
pub trait RedirectResolver: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage>;

    /// Releases anything held across records (browser sessions).
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}

/// Free-text geocoding service.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` means the service answered but found nothing.
    async fn lookup(&self, query: &str) -> Result<Option<Coordinate>>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Table>;
    async fn transform(&self, table: Table) -> Result<TransformResult>;
    /// Returns the paths of every artifact written.
    async fn load(&self, result: TransformResult) -> Result<Vec<String>>;
}
