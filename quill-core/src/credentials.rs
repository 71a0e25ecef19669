//! Credential storage and resolution for the Gemini API key.
//!
//! Provides a trait-based abstraction over credential storage with two implementations:
//! - `FileCredentialStore`: a TOML file under the user config directory,
//!   readable only by the owner on Unix.
//! - `InMemoryCredentialStore`: in-memory store for testing.
//!
//! [`resolve_api_key`] applies the lookup order: injected config value, then
//! the persisted store, then the environment. Empty values and the
//! [`PLACEHOLDER_API_KEY`] count as absent at every step.

use crate::config::GeminiConfig;
use crate::error::ConfigError;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Provider name under which the Gemini key is stored.
pub const GEMINI_PROVIDER: &str = "gemini";

/// Value shipped in templates in place of a real key.
pub const PLACEHOLDER_API_KEY: &str = "your_gemini_api_key";

/// Errors from credential storage operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Credential not found for {service}:{account}")]
    NotFound { service: String, account: String },

    #[error("Failed to store credential: {message}")]
    StoreFailed { message: String },

    #[error("Failed to delete credential: {message}")]
    DeleteFailed { message: String },

    #[error("Credential backend not available: {message}")]
    BackendUnavailable { message: String },
}

/// Trait for credential storage backends.
pub trait CredentialStore: Send + Sync {
    /// Store an API key for the given provider.
    fn store_key(&self, provider: &str, api_key: &str) -> Result<(), CredentialError>;

    /// Retrieve the API key for the given provider.
    fn get_key(&self, provider: &str) -> Result<String, CredentialError>;

    /// Delete the API key for the given provider.
    fn delete_key(&self, provider: &str) -> Result<(), CredentialError>;

    /// Check whether a key exists for the given provider.
    fn has_key(&self, provider: &str) -> bool;
}

/// Account name for a provider, shared by every backend.
pub fn account_name(provider: &str) -> String {
    format!("provider:{provider}")
}

/// Whether a key is usable: non-empty and not the placeholder.
pub fn is_usable_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && key != PLACEHOLDER_API_KEY
}

/// File-backed credential store.
///
/// Keys live in a flat TOML table keyed by account name.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `credentials.toml` in the user config directory.
    pub fn default_location() -> Result<Self, CredentialError> {
        crate::config::project_dirs()
            .map(|dirs| Self::new(dirs.config_dir().join("credentials.toml")))
            .ok_or_else(|| CredentialError::BackendUnavailable {
                message: "no home directory available for the credential file".to_string(),
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, CredentialError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => toml::from_str(&text).map_err(|e| CredentialError::BackendUnavailable {
                message: format!("{}: {e}", self.path.display()),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(CredentialError::BackendUnavailable {
                message: format!("{}: {e}", self.path.display()),
            }),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string(entries).map_err(std::io::Error::other)?;
        std::fs::write(&self.path, text)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn store_key(&self, provider: &str, api_key: &str) -> Result<(), CredentialError> {
        let mut entries = self.read_all()?;
        entries.insert(account_name(provider), api_key.to_string());
        self.write_all(&entries)
            .map_err(|e| CredentialError::StoreFailed {
                message: e.to_string(),
            })
    }

    fn get_key(&self, provider: &str) -> Result<String, CredentialError> {
        let account = account_name(provider);
        self.read_all()?
            .remove(&account)
            .ok_or_else(|| CredentialError::NotFound {
                service: self.path.display().to_string(),
                account,
            })
    }

    fn delete_key(&self, provider: &str) -> Result<(), CredentialError> {
        let mut entries = self.read_all()?;
        if entries.remove(&account_name(provider)).is_none() {
            return Ok(());
        }
        self.write_all(&entries)
            .map_err(|e| CredentialError::DeleteFailed {
                message: e.to_string(),
            })
    }

    fn has_key(&self, provider: &str) -> bool {
        self.get_key(provider).is_ok()
    }
}

/// In-memory credential store for testing.
///
/// Thread-safe via `Mutex<HashMap>`. Does not persist across process restarts.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    store: Mutex<HashMap<String, String>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn store_key(&self, provider: &str, api_key: &str) -> Result<(), CredentialError> {
        self.entries()
            .insert(account_name(provider), api_key.to_string());
        Ok(())
    }

    fn get_key(&self, provider: &str) -> Result<String, CredentialError> {
        let account = account_name(provider);
        self.entries()
            .get(&account)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound {
                service: "memory".to_string(),
                account,
            })
    }

    fn delete_key(&self, provider: &str) -> Result<(), CredentialError> {
        self.entries().remove(&account_name(provider));
        Ok(())
    }

    fn has_key(&self, provider: &str) -> bool {
        self.entries().contains_key(&account_name(provider))
    }
}

/// Where a resolved key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Config,
    Store,
    Env,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Config => write!(f, "config"),
            KeySource::Store => write!(f, "credential store"),
            KeySource::Env => write!(f, "environment"),
        }
    }
}

/// Resolve the Gemini API key from config, store, then the process environment.
pub fn resolve_api_key(
    config: &GeminiConfig,
    store: &dyn CredentialStore,
) -> Result<String, ConfigError> {
    resolve_api_key_from(config, store, |name| std::env::var(name).ok())
        .map(|(key, _)| key)
}

/// Resolve the API key with an explicit environment lookup.
pub fn resolve_api_key_from(
    config: &GeminiConfig,
    store: &dyn CredentialStore,
    env: impl Fn(&str) -> Option<String>,
) -> Result<(String, KeySource), ConfigError> {
    if let Some(key) = config.api_key.as_deref()
        && is_usable_key(key)
    {
        debug!(source = %KeySource::Config, "Resolved API key");
        return Ok((key.trim().to_string(), KeySource::Config));
    }

    if let Ok(key) = store.get_key(GEMINI_PROVIDER)
        && is_usable_key(&key)
    {
        debug!(source = %KeySource::Store, "Resolved API key");
        return Ok((key.trim().to_string(), KeySource::Store));
    }

    if let Some(key) = env(&config.api_key_env)
        && is_usable_key(&key)
    {
        debug!(source = %KeySource::Env, var = %config.api_key_env, "Resolved API key");
        return Ok((key.trim().to_string(), KeySource::Env));
    }

    Err(ConfigError::CredentialNotConfigured {
        hint: format!(
            "set gemini.api_key, run `quill auth set-key`, or export {}",
            config.api_key_env
        ),
    })
}

/// Whether any source yields a usable key.
pub fn is_configured(config: &GeminiConfig, store: &dyn CredentialStore) -> bool {
    resolve_api_key(config, store).is_ok()
}
