//! Defensive access to the recovered, loosely typed model output.
//!
//! Nothing about the shape of the tree is guaranteed. Every accessor degrades
//! to an empty or zero value instead of failing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The recovered JSON object as returned by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawAnalysis(Value);

impl RawAnalysis {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Top-level keys.
    pub fn keys(&self) -> Vec<&str> {
        self.0
            .as_object()
            .map(|map| map.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Look up a dotted path such as `quickSummary.scores.grammar`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.0, path)
    }

    pub fn text(&self, path: &str) -> String {
        self.get(path).map(value_text).unwrap_or_default()
    }

    pub fn items(&self, path: &str) -> &[Value] {
        self.get(path).map(value_items).unwrap_or(&[])
    }

    pub fn score(&self, path: &str) -> u8 {
        self.get(path).map(coerce_score).unwrap_or(0)
    }
}

impl From<Value> for RawAnalysis {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Walk a dotted path. Numeric segments index into arrays.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Text form of a scalar. Containers and null become empty.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

/// Text of `key` inside an object entry.
pub fn field_text(entry: &Value, key: &str) -> String {
    entry.get(key).map(value_text).unwrap_or_default()
}

/// Elements of an array. A lone non-null value counts as a one-element list.
pub fn value_items(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        Value::Null => &[],
        other => std::slice::from_ref(other),
    }
}

/// Coerce a loosely typed score into 0–100.
///
/// Numbers and numeric strings are rounded and clamped, booleans count as
/// 1/0, and anything else is 0.
pub fn coerce_score(value: &Value) -> u8 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let trimmed = s.trim().trim_end_matches('%').trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().unwrap_or(0.0)
            }
        }
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    if !n.is_finite() {
        return 0;
    }
    n.round().clamp(0.0, 100.0) as u8
}
