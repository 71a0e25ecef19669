//! Recovery of structured JSON from raw model output.
//!
//! The remote model is asked for strict JSON but regularly returns fenced,
//! truncated, or slightly malformed text. Recovery runs in two stages:
//! - [`extract`] locates the intended top-level JSON value in the raw text
//! - [`repair`] parses it, applying loose textual repairs when strict parsing fails

pub mod extract;
pub mod repair;

pub use extract::extract_json;
pub use repair::repair_json;

use crate::analysis::RawAnalysis;
use crate::error::RecoveryError;
use serde_json::Value;
use tracing::debug;

/// Run extraction and repair, requiring an object at the top level.
pub fn recover(raw: &str) -> Result<RawAnalysis, RecoveryError> {
    let json_text = extract_json(raw).ok_or(RecoveryError::ExtractionFailed)?;
    debug!(len = json_text.len(), "Attempting to parse extracted JSON");

    let value = repair_json(&json_text)?;
    match value {
        Value::Object(_) => {
            let raw = RawAnalysis::new(value);
            debug!(keys = ?raw.keys(), "Recovered analysis object");
            Ok(raw)
        }
        other => Err(RecoveryError::NotAnObject {
            kind: json_kind(&other).to_string(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
