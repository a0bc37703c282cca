//! Shared HTTP client for the network strategies.
//!
//! Thin wrapper over `reqwest` adding per-call timeout overrides and
//! cooperative cancellation, so the orchestrator can stop waiting on a
//! request without tearing down the whole client.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::{Client, ClientBuilder, Response};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Configuration for HTTP transport behavior.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub user_agent: String,
    /// Client-wide request timeout in seconds; individual calls may pass
    /// a tighter per-call deadline.
    pub timeout_seconds: u64,
    pub follow_redirects: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            timeout_seconds: 15,
            follow_redirects: true,
        }
    }
}

/// HTTP client shared across strategies. Cheap to clone.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .gzip(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// GET a URL and return the response body as text.
    pub async fn get_text(
        &self,
        url: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let response = self.send_checked(self.client.get(url), url, timeout, cancel).await?;

        let text = tokio::select! {
            result = response.text() => {
                result.with_context(|| format!("Failed to read response body from {url}"))?
            }
            _ = cancel.cancelled() => bail!("response reading cancelled for {url}"),
        };

        debug!(url, bytes = text.len(), "fetched response body");
        Ok(text)
    }

    /// GET a URL and parse the body as JSON.
    pub async fn get_json(
        &self,
        url: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value> {
        let response = self.send_checked(self.client.get(url), url, timeout, cancel).await?;

        let payload = tokio::select! {
            result = response.json::<serde_json::Value>() => {
                result.with_context(|| format!("Failed to parse JSON response from {url}"))?
            }
            _ = cancel.cancelled() => bail!("response reading cancelled for {url}"),
        };

        Ok(payload)
    }

    /// HEAD-style request following redirects; returns the final resolved
    /// URL. Redirect statuses on the final hop are acceptable.
    pub async fn resolve_final_url(
        &self,
        url: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let request = self.client.head(url).timeout(timeout);

        let response = tokio::select! {
            result = request.send() => {
                result.with_context(|| format!("Failed to resolve {url}"))?
            }
            _ = cancel.cancelled() => bail!("request cancelled for {url}"),
        };

        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            bail!("HTTP error {status} while resolving {url}");
        }

        Ok(response.url().to_string())
    }

    async fn send_checked(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let response = tokio::select! {
            result = request.timeout(timeout).send() => {
                result.with_context(|| format!("Failed to fetch {url}"))?
            }
            _ = cancel.cancelled() => bail!("request cancelled for {url}"),
        };

        if !response.status().is_success() {
            bail!("HTTP error {} for {url}", response.status());
        }

        Ok(response)
    }
}
