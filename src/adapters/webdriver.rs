//! Browser-driven redirect resolution over the W3C WebDriver protocol.
//!
//! Some short links only reach the place page after client-side
//! JavaScript runs, so a plain HTTP client never sees the `@lat,lon` URL.
//! This resolver talks to a running driver (chromedriver, geckodriver),
//! opens one headless session on first use and reuses it for every record.

use crate::core::extractor::has_embedded_coordinate;
use crate::domain::model::FetchedPage;
use crate::domain::ports::RedirectResolver;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

const SESSION_TIMEOUT: Duration = Duration::from_secs(60);

pub struct WebDriverRedirectResolver {
    client: Client,
    endpoint: String,
    poll_interval: Duration,
    browser_args: Vec<String>,
    session: Mutex<Option<String>>,
}

impl WebDriverRedirectResolver {
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            browser_args: [
                "--headless=new",
                "--disable-gpu",
                "--no-sandbox",
                "--window-size=1200,800",
                "--lang=es-ES",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            session: Mutex::new(None),
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_browser_args(mut self, args: Vec<String>) -> Self {
        self.browser_args = args;
        self
    }

    /// Sends one WebDriver command and unwraps the `value` member of the reply.
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let url = format!("{}{}", self.endpoint, path);
        let mut request = self.client.request(method, &url).timeout(timeout);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let payload: Value = response.json().await?;

        if !status.is_success() {
            let error = payload["value"]["error"].as_str().unwrap_or("unknown error");
            let message = payload["value"]["message"].as_str().unwrap_or_default();
            return Err(EtlError::WebDriverError {
                message: format!("{} {}: {} {}", status.as_u16(), path, error, message)
                    .trim_end()
                    .to_string(),
            });
        }

        Ok(payload.get("value").cloned().unwrap_or(Value::Null))
    }

    async fn session_id(&self) -> Result<String> {
        let mut session = self.session.lock().await;
        if let Some(id) = session.as_ref() {
            return Ok(id.clone());
        }

        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": self.browser_args }
                }
            }
        });
        let value = self
            .command(Method::POST, "/session", Some(capabilities), SESSION_TIMEOUT)
            .await?;

        let id = value["sessionId"]
            .as_str()
            .ok_or_else(|| EtlError::WebDriverError {
                message: "new session reply carried no sessionId".to_string(),
            })?
            .to_string();

        tracing::info!("🌐 Started browser session {}", id);
        *session = Some(id.clone());
        Ok(id)
    }

    /// Drops the cached session when the driver reports it gone, so the next
    /// record starts a fresh one.
    async fn forget_if_dead(&self, error: &EtlError) {
        let message = error.to_string();
        if message.contains("invalid session id") || message.contains("no such window") {
            tracing::warn!("🌐 Browser session lost ({}), a new one will be started", message);
            *self.session.lock().await = None;
        }
    }

    async fn current_url(&self, session_id: &str, timeout: Duration) -> Result<String> {
        let value = self
            .command(
                Method::GET,
                &format!("/session/{}/url", session_id),
                None,
                timeout,
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn page_source(&self, session_id: &str, timeout: Duration) -> Option<String> {
        match self
            .command(
                Method::GET,
                &format!("/session/{}/source", session_id),
                None,
                timeout,
            )
            .await
        {
            Ok(value) => value.as_str().map(str::to_string),
            Err(e) => {
                tracing::debug!("Could not read page source: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl RedirectResolver for WebDriverRedirectResolver {
    /// Navigates, then polls the address bar until it carries `@lat,lon`.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage> {
        let session_id = self.session_id().await?;
        let deadline = Instant::now() + timeout;

        let navigation = self
            .command(
                Method::POST,
                &format!("/session/{}/url", session_id),
                Some(json!({ "url": url })),
                timeout,
            )
            .await;
        if let Err(e) = navigation {
            self.forget_if_dead(&e).await;
            return Err(e);
        }

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let current = match self
                .current_url(&session_id, remaining.max(self.poll_interval))
                .await
            {
                Ok(current) => current,
                Err(e) => {
                    self.forget_if_dead(&e).await;
                    return Err(e);
                }
            };
            if has_embedded_coordinate(&current) {
                let body = self.page_source(&session_id, timeout).await;
                return Ok(FetchedPage {
                    final_url: current,
                    body,
                });
            }
            if Instant::now() >= deadline {
                return Err(EtlError::RedirectTimeout {
                    url: url.to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn shutdown(&self) -> Result<()> {
        let session = self.session.lock().await.take();
        if let Some(id) = session {
            self.command(
                Method::DELETE,
                &format!("/session/{}", id),
                None,
                SESSION_TIMEOUT,
            )
            .await?;
            tracing::info!("🌐 Closed browser session {}", id);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}
