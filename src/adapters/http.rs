use crate::domain::model::FetchedPage;
use crate::domain::ports::RedirectResolver;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::{redirect, Client, StatusCode};
use std::time::Duration;

const MAX_REDIRECTS: usize = 10;

/// Follows HTTP redirects with a plain client and keeps the final page body.
pub struct HttpRedirectResolver {
    client: Client,
}

impl HttpRedirectResolver {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RedirectResolver for HttpRedirectResolver {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage> {
        tracing::debug!("GET {} (timeout {:?})", url, timeout);
        let response = self.client.get(url).timeout(timeout).send().await?;

        let status = response.status();
        let final_url = response.url().to_string();
        tracing::debug!("{} → {} ({})", url, final_url, status);

        // 429 與 5xx 視為暫時性錯誤，交給重試
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(EtlError::TransientFetch {
                url: url.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let body = match response.text().await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!("Could not read body of {}: {}", final_url, e);
                None
            }
        };

        Ok(FetchedPage { final_url, body })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
