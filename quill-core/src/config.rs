//! Configuration system for Quill.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> environment -> explicit overrides.
//! Configuration is loaded from `~/.config/quill/config.toml` and/or
//! `.quill/config.toml` in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite-preview-06-17";

/// Default Generative Language API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default environment variable holding the API key.
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Directory name used for workspace-level configuration.
pub const WORKSPACE_DIR: &str = ".quill";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuillConfig {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub prompt: PromptOptions,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

/// Gemini endpoint, credential, and generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// Model identifier, also reported as `apiVersion` in analysis metadata.
    pub model: String,
    /// API root without the `/models/...` suffix.
    pub base_url: String,
    /// Explicitly injected API key. Takes precedence over every other source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable consulted after the credential store.
    pub api_key_env: String,
    /// Send requests through the local proxy instead of the remote API.
    pub use_proxy: bool,
    /// Proxy endpoint used when `use_proxy` is set.
    pub proxy_url: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    pub response_mime_type: String,
    /// Threshold applied to every safety category.
    pub safety_threshold: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            use_proxy: false,
            proxy_url: "http://localhost:3000/api/gemini".to_string(),
            temperature: 0.3,
            top_k: 1,
            top_p: 1.0,
            max_output_tokens: 8000,
            response_mime_type: "application/json".to_string(),
            safety_threshold: "BLOCK_MEDIUM_AND_ABOVE".to_string(),
        }
    }
}

impl GeminiConfig {
    /// `generateContent` URL for the configured model, without the key.
    pub fn generate_content_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// Validate this Gemini config and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.model.trim().is_empty() {
            warnings.push("gemini.model is empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            warnings.push(format!(
                "gemini.temperature ({}) is outside the typical range 0.0-2.0",
                self.temperature
            ));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            warnings.push(format!(
                "gemini.top_p ({}) is outside the range 0.0-1.0",
                self.top_p
            ));
        }
        if self.max_output_tokens == 0 {
            warnings.push("gemini.max_output_tokens is 0; every response will be empty".to_string());
        }
        if self.use_proxy && self.proxy_url.trim().is_empty() {
            warnings.push("gemini.use_proxy is set but gemini.proxy_url is empty".to_string());
        }
        warnings
    }
}

/// Retry policy for transient transport failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            backoff_multiplier: 2.0,
            max_backoff_ms: 60_000,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.initial_backoff_ms > self.max_backoff_ms {
            warnings.push(format!(
                "retry.initial_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            ));
        }
        if self.backoff_multiplier < 1.0 {
            warnings.push(format!(
                "retry.backoff_multiplier ({}) is below 1.0; delays will shrink",
                self.backoff_multiplier
            ));
        }
        warnings
    }
}

/// Options for the analysis prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptOptions {
    /// Language used for explanations, feedback, and tips.
    pub feedback_language: String,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            feedback_language: "Korean".to_string(),
        }
    }
}

/// Development proxy settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    /// Directory served for any path other than the API routes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<PathBuf>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            static_dir: None,
        }
    }
}

impl ProxyConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Diagnostics for inspecting raw model output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// File mirroring the most recent raw response, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response_path: Option<PathBuf>,
}

impl QuillConfig {
    /// Validate the whole configuration and return any warnings.
    ///
    /// Warnings never prevent loading.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.gemini.validate();
        warnings.extend(self.retry.validate());
        if self.proxy.port == 0 {
            warnings.push("proxy.port is 0; an ephemeral port will be chosen".to_string());
        }
        warnings
    }
}

/// Project directories for user-level config and data.
pub fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "quill", "quill")
}

/// Path of the user-level config file.
pub fn user_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(WORKSPACE_DIR).join("config.toml")
}

/// Load configuration from all sources.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&QuillConfig>,
) -> Result<QuillConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(QuillConfig::default()));

    // User-level config
    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (QUILL_GEMINI__MODEL, QUILL_RETRY__MAX_RETRIES, etc.)
    figment = figment.merge(Env::prefixed("QUILL_").split("__"));

    // Explicit overrides
    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Check whether any Quill configuration file exists.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QuillConfig::default();
        assert_eq!(config.gemini.model, DEFAULT_MODEL);
        assert_eq!(config.gemini.api_key_env, "GEMINI_API_KEY");
        assert!(!config.gemini.use_proxy);
        assert_eq!(config.gemini.temperature, 0.3);
        assert_eq!(config.gemini.max_output_tokens, 8000);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.initial_backoff_ms, 1000);
        assert_eq!(config.prompt.feedback_language, "Korean");
        assert_eq!(config.proxy.port, 3000);
        assert!(config.debug.raw_response_path.is_none());
    }

    #[test]
    fn test_generate_content_url() {
        let mut gemini = GeminiConfig::default();
        assert_eq!(
            gemini.generate_content_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-lite-preview-06-17:generateContent"
        );
        gemini.base_url = "http://127.0.0.1:9000/".into();
        gemini.model = "m".into();
        assert_eq!(
            gemini.generate_content_url(),
            "http://127.0.0.1:9000/models/m:generateContent"
        );
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = QuillConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: QuillConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: QuillConfig = toml::from_str(
            r#"
            [gemini]
            model = "gemini-custom"
            use_proxy = true

            [retry]
            max_retries = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.gemini.model, "gemini-custom");
        assert!(config.gemini.use_proxy);
        assert_eq!(config.gemini.temperature, 0.3);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_backoff_ms, 1000);
        assert_eq!(config.proxy, ProxyConfig::default());
    }

    #[test]
    fn test_load_config_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.retry.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_load_config_workspace_file_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(WORKSPACE_DIR)).unwrap();
        std::fs::write(
            workspace_config_path(dir.path()),
            "[proxy]\nport = 4100\n\n[prompt]\nfeedback_language = \"Japanese\"\n",
        )
        .unwrap();
        assert!(config_exists(Some(dir.path())));

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.proxy.port, 4100);
        assert_eq!(config.prompt.feedback_language, "Japanese");

        let mut overrides = config.clone();
        overrides.gemini.model = "override-model".into();
        let config = load_config(Some(dir.path()), Some(&overrides)).unwrap();
        assert_eq!(config.gemini.model, "override-model");
        assert_eq!(config.proxy.port, 4100);
    }

    #[test]
    fn test_validate_defaults_clean() {
        assert!(QuillConfig::default().validate().is_empty());
    }

    #[test]
    fn test_validate_warnings() {
        let mut config = QuillConfig::default();
        config.gemini.temperature = 3.5;
        config.gemini.max_output_tokens = 0;
        config.retry.initial_backoff_ms = 90_000;
        config.retry.backoff_multiplier = 0.5;
        let warnings = config.validate();
        assert_eq!(warnings.len(), 4);
        assert!(warnings.iter().any(|w| w.contains("temperature")));
        assert!(warnings.iter().any(|w| w.contains("max_output_tokens")));
        assert!(warnings.iter().any(|w| w.contains("initial_backoff_ms")));
        assert!(warnings.iter().any(|w| w.contains("backoff_multiplier")));
    }

    #[test]
    fn test_proxy_bind_addr() {
        assert_eq!(ProxyConfig::default().bind_addr(), "127.0.0.1:3000");
    }
}
