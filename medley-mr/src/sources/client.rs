//! Rate-limited HTTP fetch plumbing shared by all adapters
//!
//! Every outbound call passes through the process-wide rate limiter, then
//! a bounded retry loop: transient failures (timeout, transport error,
//! HTTP 5xx, malformed body) back off `2^attempt` seconds between
//! attempts; HTTP 429 additionally arms the limiter's provider-signaled
//! backoff. Terminal statuses (404, 401/403, other 4xx) never retry.

use crate::rate_limit::RateLimiter;
use medley_common::{Error, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("medley/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_ATTEMPTS: u32 = 3;

/// Shared HTTP client: one reqwest client, one rate limiter
pub struct HttpClient {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
}

impl HttpClient {
    pub fn new(limiter: Arc<RateLimiter>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Internal(format!("HTTP client init failed: {}", e)))?;

        Ok(Self { client, limiter })
    }

    /// GET a JSON document, deserialized into `T`
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        source: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.execute(source, url, query, |body| {
            serde_json::from_str(body).map_err(|e| e.to_string())
        })
        .await
    }

    /// GET a raw text document (HTML pages)
    pub async fn get_text(&self, source: &str, url: &str, query: &[(&str, String)]) -> Result<String> {
        self.execute(source, url, query, |body| Ok(body.to_string()))
            .await
    }

    async fn execute<T>(
        &self,
        source: &str,
        url: &str,
        query: &[(&str, String)],
        parse: impl Fn(&str) -> std::result::Result<T, String>,
    ) -> Result<T> {
        self.limiter.wait_for_slot(source).await;
        self.limiter.record_request(source).await;

        let mut last_error = Error::Source(format!("{}: no attempts made", source));

        for attempt in 1..=MAX_ATTEMPTS {
            debug!(source, url, attempt, "Dispatching request");

            let response = match self.client.get(url).query(query).send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    last_error = Error::Timeout(format!("{}: {}", source, e));
                    self.sleep_before_retry(source, attempt).await;
                    continue;
                }
                Err(e) => {
                    last_error = Error::Source(format!("{}: {}", source, e));
                    self.sleep_before_retry(source, attempt).await;
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 404 {
                return Err(Error::NotFound(format!("{}: {}", source, url)));
            }
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(Error::Auth(format!(
                    "{}: HTTP {} (check API credentials)",
                    source, status
                )));
            }
            if status.as_u16() == 429 {
                let backoff = self.limiter.trigger_backoff(source, attempt).await;
                last_error = Error::RateLimited {
                    message: format!("{}: upstream throttled", source),
                    retry_after_ms: Some(backoff.as_millis() as u64),
                };
                if attempt < MAX_ATTEMPTS {
                    self.limiter.wait_for_slot(source).await;
                }
                continue;
            }
            if status.is_server_error() {
                last_error = Error::Source(format!("{}: HTTP {}", source, status));
                self.sleep_before_retry(source, attempt).await;
                continue;
            }
            if !status.is_success() {
                // Remaining 4xx statuses are terminal
                return Err(Error::Source(format!("{}: HTTP {}", source, status)));
            }

            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    last_error = if e.is_timeout() {
                        Error::Timeout(format!("{}: body read: {}", source, e))
                    } else {
                        Error::Source(format!("{}: body read: {}", source, e))
                    };
                    self.sleep_before_retry(source, attempt).await;
                    continue;
                }
            };

            match parse(&body) {
                Ok(parsed) => return Ok(parsed),
                Err(e) => {
                    warn!(source, attempt, error = %e, "Malformed response body");
                    last_error = Error::Source(format!("{}: malformed response: {}", source, e));
                    self.sleep_before_retry(source, attempt).await;
                }
            }
        }

        Err(last_error)
    }

    /// `2^attempt` seconds between transient-failure attempts, skipped
    /// after the final one
    async fn sleep_before_retry(&self, source: &str, attempt: u32) {
        if attempt < MAX_ATTEMPTS {
            let delay = Duration::from_secs(1 << attempt.min(6));
            debug!(source, attempt, delay_s = delay.as_secs(), "Retrying after transient failure");
            tokio::time::sleep(delay).await;
        }
    }
}
