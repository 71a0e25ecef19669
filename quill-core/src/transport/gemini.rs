//! Gemini `generateContent` client.
//!
//! Sends a prompt either directly to the Generative Language API (the key is
//! appended as a `?key=` query parameter) or to the local development proxy,
//! which holds the key server-side.

use super::{HttpReply, HttpTransport, ReqwestTransport, with_retry};
use crate::config::{GeminiConfig, QuillConfig, RetryConfig};
use crate::credentials::{CredentialStore, resolve_api_key};
use crate::error::{QuillError, TransportError};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

/// Harm categories sent with every request.
pub const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Where requests are sent.
#[derive(Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Remote API; `url` already includes the key.
    Direct { url: String },
    /// Local proxy that adds the key itself.
    Proxy { url: String },
}

impl Endpoint {
    fn url(&self) -> &str {
        match self {
            Endpoint::Direct { url } | Endpoint::Proxy { url } => url,
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self, Endpoint::Proxy { .. })
    }
}

// The direct URL embeds the API key, so it is never printed.
impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Direct { .. } => f.write_str("Direct"),
            Endpoint::Proxy { url } => f.debug_struct("Proxy").field("url", url).finish(),
        }
    }
}

/// Client for one configured Gemini model.
pub struct GeminiClient {
    transport: Arc<dyn HttpTransport>,
    endpoint: Endpoint,
    gemini: GeminiConfig,
    retry: RetryConfig,
}

impl GeminiClient {
    /// Build a client with the real HTTP transport.
    ///
    /// In direct mode the API key is resolved here, so a missing or
    /// placeholder key fails before any network attempt.
    pub fn from_config(
        config: &QuillConfig,
        store: &dyn CredentialStore,
    ) -> Result<Self, QuillError> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Self::with_transport(config, store, transport)
    }

    /// Build a client over an arbitrary transport.
    pub fn with_transport(
        config: &QuillConfig,
        store: &dyn CredentialStore,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, QuillError> {
        let endpoint = if config.gemini.use_proxy {
            Endpoint::Proxy {
                url: config.gemini.proxy_url.clone(),
            }
        } else {
            let key = resolve_api_key(&config.gemini, store)?;
            Endpoint::Direct {
                url: format!("{}?key={}", config.gemini.generate_content_url(), key),
            }
        };
        info!(
            model = %config.gemini.model,
            proxy = endpoint.is_proxy(),
            "Gemini client configured"
        );
        Ok(Self {
            transport,
            endpoint,
            gemini: config.gemini.clone(),
            retry: config.retry.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.gemini.model
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Request body for a prompt.
    pub fn build_request_body(&self, prompt: &str) -> Value {
        build_request_body(&self.gemini, prompt)
    }

    /// Send a prompt and return the model's text payload.
    ///
    /// Returns an empty string when the envelope carries no candidate text;
    /// the recovery pipeline treats that as an extraction failure.
    pub async fn send(&self, prompt: &str) -> Result<String, QuillError> {
        let body = self.build_request_body(prompt);
        let url = self.endpoint.url();
        debug!(
            model = %self.gemini.model,
            proxy = self.endpoint.is_proxy(),
            prompt_len = prompt.len(),
            "Sending Gemini request"
        );

        let start = std::time::Instant::now();
        let reply = with_retry(&self.retry, || async {
            match self.transport.post_json(url, &body).await {
                Ok(reply) if reply.is_success() => Ok(reply),
                Ok(reply) => Err(map_http_error(&reply)),
                Err(e) => Err(e),
            }
        })
        .await?;

        let envelope: Value =
            serde_json::from_str(&reply.body).map_err(|e| TransportError::InvalidEnvelope {
                message: format!("Invalid JSON in response: {e}"),
            })?;
        let text = candidate_text(&envelope).unwrap_or_default().to_string();
        info!(
            status = reply.status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            len = text.len(),
            "Gemini response received"
        );
        Ok(text)
    }
}

/// Request body with the configured generation and safety settings.
pub fn build_request_body(gemini: &GeminiConfig, prompt: &str) -> Value {
    let safety: Vec<Value> = SAFETY_CATEGORIES
        .iter()
        .map(|category| json!({"category": category, "threshold": gemini.safety_threshold}))
        .collect();
    json!({
        "contents": [{"parts": [{"text": prompt}]}],
        "generationConfig": {
            "temperature": gemini.temperature,
            "topK": gemini.top_k,
            "topP": gemini.top_p,
            "maxOutputTokens": gemini.max_output_tokens,
            "responseMimeType": gemini.response_mime_type,
        },
        "safetySettings": safety,
    })
}

/// `candidates[0].content.parts[0].text`, if present.
pub fn candidate_text(envelope: &Value) -> Option<&str> {
    envelope
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
}

/// Map a non-2xx reply to a transport error carrying the upstream message.
///
/// Reads `error.message`, or `error` itself when the proxy reports a plain
/// string.
pub fn map_http_error(reply: &HttpReply) -> TransportError {
    let message = serde_json::from_str::<Value>(&reply.body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "Unknown error".to_string());
    match reply.status {
        429 => TransportError::RateLimited { message },
        status => TransportError::Http { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{GEMINI_PROVIDER, InMemoryCredentialStore, PLACEHOLDER_API_KEY};
    use crate::error::ConfigError;
    use crate::transport::ScriptedTransport;
    use std::time::Duration;

    fn direct_config() -> QuillConfig {
        let mut config = QuillConfig::default();
        config.gemini.api_key = Some("test-key".into());
        config
    }

    fn client(config: &QuillConfig, transport: &Arc<ScriptedTransport>) -> GeminiClient {
        GeminiClient::with_transport(config, &InMemoryCredentialStore::new(), transport.clone())
            .unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let body = build_request_body(&GeminiConfig::default(), "Analyze this");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Analyze this");
        let gen_config = &body["generationConfig"];
        assert!((gen_config["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert_eq!(gen_config["topK"], 1);
        assert_eq!(gen_config["topP"], 1.0);
        assert_eq!(gen_config["maxOutputTokens"], 8000);
        assert_eq!(gen_config["responseMimeType"], "application/json");
        let safety = body["safetySettings"].as_array().unwrap();
        assert_eq!(safety.len(), 4);
        assert!(
            safety
                .iter()
                .all(|s| s["threshold"] == "BLOCK_MEDIUM_AND_ABOVE")
        );
        assert_eq!(safety[0]["category"], "HARM_CATEGORY_HARASSMENT");
    }

    #[test]
    fn test_map_http_error_reads_upstream_message() {
        let err = map_http_error(&HttpReply::new(
            400,
            r#"{"error": {"code": 400, "message": "API key not valid."}}"#,
        ));
        assert_eq!(err.to_string(), "API error (400): API key not valid.");

        let err = map_http_error(&HttpReply::new(503, "<html>down</html>"));
        assert_eq!(err.to_string(), "API error (503): Unknown error");

        assert!(matches!(
            map_http_error(&HttpReply::new(429, "{}")),
            TransportError::RateLimited { .. }
        ));
    }

    #[test]
    fn test_candidate_text() {
        let envelope = json!({"candidates": [{"content": {"parts": [{"text": "{}"}]}}]});
        assert_eq!(candidate_text(&envelope), Some("{}"));
        assert_eq!(candidate_text(&json!({"candidates": []})), None);
        assert_eq!(candidate_text(&json!({})), None);
    }

    #[test]
    fn test_missing_key_rejected_before_network() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut config = QuillConfig::default();
        config.gemini.api_key_env = "QUILL_TEST_UNSET_KEY_VAR".into();
        let store = InMemoryCredentialStore::new();
        store.store_key(GEMINI_PROVIDER, PLACEHOLDER_API_KEY).unwrap();

        let err = GeminiClient::with_transport(&config, &store, transport.clone()).err();
        assert!(matches!(
            err,
            Some(QuillError::Config(ConfigError::CredentialNotConfigured { .. }))
        ));
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn test_proxy_mode_needs_no_key() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut config = QuillConfig::default();
        config.gemini.use_proxy = true;
        config.gemini.api_key_env = "QUILL_TEST_UNSET_KEY_VAR".into();
        let client = client(&config, &transport);
        assert_eq!(
            client.endpoint(),
            &Endpoint::Proxy {
                url: "http://localhost:3000/api/gemini".into()
            }
        );
    }

    #[test]
    fn test_endpoint_debug_hides_key() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client(&direct_config(), &transport);
        assert_eq!(format!("{:?}", client.endpoint()), "Direct");
    }

    #[tokio::test]
    async fn test_send_direct_returns_candidate_text() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_candidate_text(r#"{"quickSummary": {}}"#);
        let client = client(&direct_config(), &transport);

        let text = client.send("prompt").await.unwrap();
        assert_eq!(text, r#"{"quickSummary": {}}"#);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].0.ends_with(
            "/models/gemini-2.5-flash-lite-preview-06-17:generateContent?key=test-key"
        ));
        assert_eq!(requests[0].1["contents"][0]["parts"][0]["text"], "prompt");
    }

    #[tokio::test]
    async fn test_send_missing_candidate_is_empty_text() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_reply(200, r#"{"candidates": []}"#);
        let client = client(&direct_config(), &transport);
        assert_eq!(client.send("p").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_send_non_json_envelope_is_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_reply(200, "not json");
        let client = client(&direct_config(), &transport);
        assert!(matches!(
            client.send("p").await,
            Err(QuillError::Transport(TransportError::InvalidEnvelope { .. }))
        ));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_three_times_then_success() {
        let transport = Arc::new(ScriptedTransport::new());
        for _ in 0..3 {
            transport.push_reply(429, r#"{"error": {"message": "Resource exhausted"}}"#);
        }
        transport.push_candidate_text("{}");
        let client = client(&direct_config(), &transport);

        let start = tokio::time::Instant::now();
        assert_eq!(client.send("p").await.unwrap(), "{}");
        assert_eq!(transport.request_count(), 4);
        assert_eq!(start.elapsed(), Duration::from_millis(7000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_beyond_ceiling_fails() {
        let transport = Arc::new(ScriptedTransport::new());
        for _ in 0..3 {
            transport.push_reply(429, r#"{"error": {"message": "Resource exhausted"}}"#);
        }
        transport.push_candidate_text("{}");
        let mut config = direct_config();
        config.retry.max_retries = 2;
        let client = client(&config, &transport);

        let err = client.send("p").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Transport error: API error (429): Resource exhausted"
        );
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_errors_are_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push_network_error("connection reset")
            .push_candidate_text("ok");
        let client = client(&direct_config(), &transport);
        assert_eq!(client.send("p").await.unwrap(), "ok");
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_server_error_not_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_reply(500, r#"{"error": {"message": "Internal"}}"#);
        transport.push_candidate_text("never");
        let client = client(&direct_config(), &transport);
        let err = client.send("p").await.unwrap_err();
        assert!(matches!(
            err,
            QuillError::Transport(TransportError::Http { status: 500, .. })
        ));
        assert_eq!(transport.request_count(), 1);
    }
}
