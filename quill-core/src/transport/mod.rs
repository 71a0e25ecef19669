//! HTTP transport for the Gemini `generateContent` call.
//!
//! - [`HttpTransport`] performs a single POST attempt and is the seam tests replace.
//! - [`with_retry`] wraps an attempt in sequential exponential backoff.
//! - [`GeminiClient`] builds the request, selects direct or proxy mode, and
//!   extracts the model text from the response envelope.

pub mod gemini;
#[cfg(any(test, feature = "test-util"))]
mod scripted;

pub use crate::config::RetryConfig;
pub use gemini::{Endpoint, GeminiClient};
#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedTransport;

use crate::error::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A single POST of a JSON body.
///
/// Implementations report connection-level failures as
/// [`TransportError::Network`] and return every HTTP status as a reply.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply, TransportError>;
}

/// `reqwest`-backed transport.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TransportError::ClientBuild {
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply, TransportError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Network {
                // Strip the URL: in direct mode it carries the API key.
                message: e.without_url().to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| TransportError::Network {
            message: format!("Failed to read response body: {}", e.without_url()),
        })?;
        Ok(HttpReply { status, body })
    }
}

/// Execute an async operation with exponential backoff retry on transient errors.
///
/// Retries `RateLimited` and `Network` failures up to `config.max_retries`
/// times after the first attempt. Every other error returns immediately.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T, TransportError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if !e.is_retryable() || attempt >= config.max_retries {
                    return Err(e);
                }

                let backoff_ms = compute_backoff(config, attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max = config.max_retries,
                    backoff_ms = backoff_ms,
                    error = %e,
                    "Retrying after transient error"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                attempt += 1;
            }
        }
    }
}

/// `initial * multiplier^attempt`, capped at `max_backoff_ms`.
pub fn compute_backoff(config: &RetryConfig, attempt: u32) -> u64 {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_backoff_ms as f64 * config.backoff_multiplier.powi(exponent);
    base.min(config.max_backoff_ms as f64).max(0.0) as u64
}
