//! # Quill Core
//!
//! Core library for Quill, a writing-feedback client for the Gemini API.
//! Provides the analysis prompt, the HTTP transport with retry, recovery of
//! malformed model JSON, normalization into a stable analysis record, and a
//! local development proxy.

pub mod analysis;
pub mod analyzer;
pub mod config;
pub mod credentials;
pub mod debug_cache;
pub mod error;
pub mod prompt;
pub mod proxy;
pub mod recovery;
pub mod transport;

// Re-export commonly used types at the crate root.
pub use analysis::{
    Correction, DetailedFeedback, Grade, NormalizedAnalysis, RawAnalysis, Suggestion, Topic,
    WritingSubmission,
};
pub use analyzer::{WritingAnalyzer, recover_analysis};
pub use config::{QuillConfig, RetryConfig, load_config};
pub use credentials::{CredentialStore, FileCredentialStore, InMemoryCredentialStore};
pub use error::{ConfigError, QuillError, RecoveryError, Result, TransportError};
pub use prompt::build_analysis_prompt;
pub use recovery::{extract_json, recover, repair_json};
pub use transport::{GeminiClient, HttpTransport, ReqwestTransport};
#[cfg(any(test, feature = "test-util"))]
pub use transport::ScriptedTransport;
