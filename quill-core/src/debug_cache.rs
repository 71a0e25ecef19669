//! Best-effort record of the most recent raw model response.
//!
//! Purely diagnostic. The latest write wins, and failures to mirror the
//! record to disk are logged and otherwise ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// Characters of the raw text included in log previews.
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedResponse {
    pub text: String,
    pub received_at: DateTime<Utc>,
    pub length: usize,
}

#[derive(Debug, Default)]
pub struct RawResponseCache {
    latest: RwLock<Option<CachedResponse>>,
    mirror_path: Option<PathBuf>,
}

impl RawResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also mirror every record to a JSON file at `path`.
    pub fn with_mirror(path: impl Into<PathBuf>) -> Self {
        Self {
            latest: RwLock::new(None),
            mirror_path: Some(path.into()),
        }
    }

    pub fn mirror_path(&self) -> Option<&Path> {
        self.mirror_path.as_deref()
    }

    pub fn record(&self, text: &str) {
        let entry = CachedResponse {
            text: text.to_string(),
            received_at: Utc::now(),
            length: text.chars().count(),
        };
        debug!(
            length = entry.length,
            preview = %preview(text, PREVIEW_CHARS),
            "Raw AI response recorded"
        );

        if let Some(path) = &self.mirror_path
            && let Err(e) = write_mirror(path, &entry)
        {
            warn!(path = %path.display(), error = %e, "Failed to mirror raw response");
        }

        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(entry);
    }

    pub fn latest(&self) -> Option<CachedResponse> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn write_mirror(path: &Path, entry: &CachedResponse) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(entry)?;
    std::fs::write(path, json)
}

/// Read a mirrored record written by a previous run.
pub fn load_mirror(path: &Path) -> std::io::Result<CachedResponse> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(std::io::Error::from)
}

/// First `max` characters of `text`, with an ellipsis when cut.
pub fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_write_wins() {
        let cache = RawResponseCache::new();
        assert!(cache.latest().is_none());
        cache.record("first");
        cache.record("second");
        let latest = cache.latest().unwrap();
        assert_eq!(latest.text, "second");
        assert_eq!(latest.length, 6);
    }

    #[test]
    fn test_mirror_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug").join("last.json");
        let cache = RawResponseCache::with_mirror(&path);
        cache.record("{\"a\": 1}");

        let loaded = load_mirror(&path).unwrap();
        assert_eq!(loaded, cache.latest().unwrap());
    }

    #[test]
    fn test_mirror_failure_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be overwritten with a file.
        let cache = RawResponseCache::with_mirror(dir.path());
        cache.record("still cached");
        assert_eq!(cache.latest().unwrap().text, "still cached");
    }

    #[test]
    fn test_preview_counts_chars() {
        assert_eq!(preview("héllo", 2), "hé...");
        assert_eq!(preview("hi", 5), "hi");
        assert_eq!(preview("abc", 3), "abc");
    }
}
