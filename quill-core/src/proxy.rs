//! Local development proxy for the Gemini API.
//!
//! `POST /api/gemini` forwards the request body to `generateContent` with a
//! server-held key and echoes the upstream status and body verbatim. Any other
//! path is served from the optional static directory. CORS is fully open,
//! which is only appropriate for local development.

use crate::config::QuillConfig;
use crate::credentials::{CredentialStore, resolve_api_key};
use crate::debug_cache::preview;
use crate::transport::{HttpTransport, ReqwestTransport};
use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Characters of the upstream body included in logs.
const BODY_PREVIEW_CHARS: usize = 1200;

/// Shared proxy state.
pub struct ProxyState {
    transport: Arc<dyn HttpTransport>,
    upstream_url: String,
    api_key: Option<String>,
    api_key_env: String,
}

pub type SharedProxy = Arc<ProxyState>;

impl ProxyState {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        upstream_url: impl Into<String>,
        api_key: Option<String>,
        api_key_env: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            upstream_url: upstream_url.into(),
            api_key,
            api_key_env: api_key_env.into(),
        }
    }

    /// State for the configured model with the key resolved server-side.
    ///
    /// A missing key is not fatal: requests are answered with a 500 until
    /// one is configured.
    pub fn from_config(
        config: &QuillConfig,
        store: &dyn CredentialStore,
    ) -> Result<Self, crate::error::QuillError> {
        let api_key = match resolve_api_key(&config.gemini, store) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(error = %e, "Proxy starting without an API key");
                None
            }
        };
        Ok(Self::new(
            Arc::new(ReqwestTransport::new()?),
            config.gemini.generate_content_url(),
            api_key,
            config.gemini.api_key_env.clone(),
        ))
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Build the proxy router.
pub fn router(state: SharedProxy, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let mut app = Router::new()
        .route("/api/gemini", post(gemini_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(cors).layer(TraceLayer::new_for_http())
}

/// Health check endpoint.
async fn health_handler(State(state): State<SharedProxy>) -> impl IntoResponse {
    Json(json!({"status": "ok", "key_configured": state.has_key()}))
}

/// Forward a `generateContent` request upstream.
///
/// The body is read without checking `content-type`; an empty or non-JSON body
/// is forwarded as `{}` so the upstream reports the problem.
async fn gemini_handler(State(state): State<SharedProxy>, body: Bytes) -> Response {
    let request_id = Uuid::new_v4();
    let payload = parse_payload(&body).unwrap_or_else(|e| {
        warn!(%request_id, error = %e, len = body.len(), "[proxy] body is not JSON, forwarding {{}}");
        json!({})
    });
    let keys: Vec<&str> = payload
        .as_object()
        .map(|m| m.keys().map(String::as_str).collect())
        .unwrap_or_default();
    info!(%request_id, ?keys, "[proxy] /api/gemini payload");

    let Some(api_key) = state.api_key.as_deref() else {
        error!(%request_id, "[proxy] no API key configured");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Missing {} in .env", state.api_key_env)})),
        )
            .into_response();
    };

    let url = format!("{}?key={}", state.upstream_url, api_key);
    let start = Instant::now();
    match state.transport.post_json(&url, &payload).await {
        Ok(reply) => {
            info!(
                %request_id,
                status = reply.status,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "[proxy] upstream responded"
            );
            debug!(%request_id, body = %preview(&reply.body, BODY_PREVIEW_CHARS), "[proxy] upstream body");
            let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
            (
                status,
                [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                reply.body,
            )
                .into_response()
        }
        Err(e) => {
            error!(%request_id, error = %e, "[proxy] upstream call failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Proxy error", "details": e.to_string()})),
            )
                .into_response()
        }
    }
}

fn parse_payload(body: &[u8]) -> Result<Value, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(json!({}));
    }
    serde_json::from_slice(body)
}

/// Start the proxy on the configured address.
///
/// Runs until Ctrl-C.
pub async fn run(config: &QuillConfig, state: SharedProxy) -> Result<(), std::io::Error> {
    let app = router(state, config.proxy.static_dir.clone());
    let addr = config.proxy.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %listener.local_addr()?, "Proxy listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Proxy shutting down");
        })
        .await
}
