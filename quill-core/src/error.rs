//! Error types for the Quill core library.
//!
//! Uses `thiserror` for public API error types. Configuration and transport
//! failures are genuine errors surfaced to the caller. Recovery failures
//! (`RecoveryError`) stay internal: the analyzer converts them into a
//! fallback analysis and never returns them.

use crate::credentials::CredentialError;

/// Top-level error type for the Quill core library.
#[derive(Debug, thiserror::Error)]
pub enum QuillError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Gemini API key is not configured ({hint})")]
    CredentialNotConfigured { hint: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Failed to load configuration: {message}")]
    Load { message: String },
}

/// Errors from a request to the generative API (direct or through the proxy).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("API error (429): {message}")]
    RateLimited { message: String },

    #[error("API error ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Invalid response envelope: {message}")]
    InvalidEnvelope { message: String },

    #[error("Failed to build HTTP client: {message}")]
    ClientBuild { message: String },
}

impl TransportError {
    /// Whether a retry may succeed (rate limiting and network failures only).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::RateLimited { .. } | TransportError::Network { .. }
        )
    }

    /// The upstream HTTP status, when the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::RateLimited { .. } => Some(429),
            TransportError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failures inside the response-recovery pipeline.
///
/// Never raised past the analyzer boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecoveryError {
    #[error("no JSON payload found in model output")]
    ExtractionFailed,

    #[error("JSON repair failed: {message}")]
    RepairFailed { message: String },

    #[error("recovered JSON is not an object (got {kind})")]
    NotAnObject { kind: String },
}

/// A type alias for results using the top-level `QuillError`.
pub type Result<T> = std::result::Result<T, QuillError>;
