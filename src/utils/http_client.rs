//! Shared HTTP client with per-host User-Agent overrides.
//!
//! One client is built at startup and threaded through the pipeline; there
//! is no ambient global. Plain document fetches carry a per-request timeout,
//! while probe traffic (issued through [`HttpClient::inner`]) only bounds
//! connection establishment so that byte-capped sampling, not a wall-clock
//! limit, ends the transfer.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, CACHE_CONTROL, USER_AGENT};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::HttpConfig;
use crate::errors::{AppError, AppResult, SourceError, SourceResult};
use crate::utils::UrlUtils;

/// Default User-Agent presented to origin servers unless overridden.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";

pub struct HttpClient {
    client: Client,
    default_user_agent: String,
    host_user_agents: HashMap<String, String>,
    request_timeout: Duration,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| AppError::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            default_user_agent: config
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            host_user_agents: config.host_user_agents.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    /// The User-Agent to present for a given URL: the per-host override when
    /// one is configured for the URL's origin, the default otherwise.
    pub fn user_agent_for(&self, url: &str) -> &str {
        UrlUtils::origin_host(url)
            .and_then(|host| self.host_user_agents.get(&host))
            .unwrap_or(&self.default_user_agent)
    }

    /// Fetch a document as text. Success requires a 2xx status.
    pub async fn fetch_text(&self, url: &str, cancel: &CancellationToken) -> SourceResult<String> {
        let request = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent_for(url))
            .header(ACCEPT, "*/*")
            .timeout(self.request_timeout);

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(SourceError::Cancelled),
            response = request.send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let text = tokio::select! {
            _ = cancel.cancelled() => return Err(SourceError::Cancelled),
            text = response.text() => text?,
        };
        Ok(text)
    }

    /// Fetch a document as text, retrying transient failures up to
    /// `retry_times` additional attempts. Cancellation is returned
    /// immediately and never consumes an attempt.
    pub async fn fetch_text_with_retry(
        &self,
        url: &str,
        retry_times: u32,
        cancel: &CancellationToken,
    ) -> SourceResult<String> {
        let mut attempt = 0;
        loop {
            match self.fetch_text(url, cancel).await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    if attempt >= retry_times {
                        return Err(err);
                    }
                    attempt += 1;
                    debug!(url, attempt, "fetch failed, retrying: {err}");
                }
            }
        }
    }

    /// Build a GET request suitable for probe traffic: origin-appropriate
    /// User-Agent, no caching, and no total-request timeout.
    pub fn probe_get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header(USER_AGENT, self.user_agent_for(url))
            .header(ACCEPT, "*/*")
            .header(CACHE_CONTROL, "no-cache")
    }

    /// Build a HEAD request for latency pings.
    pub fn probe_head(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .head(url)
            .header(USER_AGENT, self.user_agent_for(url))
            .header(ACCEPT, "*/*")
            .timeout(self.request_timeout)
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }
}
