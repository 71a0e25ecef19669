//! Balanced JSON extraction from raw model output.
//!
//! Locates the intended top-level JSON value inside text that may carry code
//! fences, an extra layer of quoting, or prose before and after the payload.
//! The scan tracks string-literal state (honoring `\` escapes) and a stack of
//! open `{`/`[` delimiters, so brackets inside strings never end a candidate.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;
use tracing::{debug, trace};

/// Matches fence markers such as ```` ``` ````, ```` ```json ```` and ```` ```JSON ````.
static FENCE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```[ \t]*(?:json)?").unwrap());

/// Widest `{ ... }` span, used when the balanced scan finds no candidate.
static WIDEST_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Upper bound on candidates considered in a single payload.
const MAX_CANDIDATES: usize = 64;

/// A balanced (or virtually closed) slice found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    text: String,
    truncated: bool,
}

/// Extract the JSON payload from raw model output.
///
/// Returns `None` when no JSON-looking value exists, which callers treat as an
/// extraction failure. A payload truncated mid-value comes back with its open
/// string closed and its open delimiters closed in nested order, ready for the
/// repairer.
pub fn extract_json(raw: &str) -> Option<String> {
    let stripped = strip_fences(raw);
    let cleaned = unwrap_quoting(stripped.trim());

    let candidates = scan_candidates(&cleaned);
    if candidates.is_empty() {
        let widest = WIDEST_OBJECT.find(&cleaned).map(|m| m.as_str().to_string());
        debug!(found = widest.is_some(), "No balanced candidate, using widest-match fallback");
        return widest;
    }

    let mut candidates = candidates.into_iter();
    let first = candidates.next()?;
    if is_object(&first) {
        trace!(len = first.text.len(), truncated = first.truncated, "Extracted leading object");
        return Some(first.text);
    }

    // Prose like "see [1]" can open with a bracketed span; a later object
    // replaces it only when it already parses.
    if let Some(object) = candidates.find(|c| is_object(c) && parses_strictly(&c.text)) {
        debug!(len = object.text.len(), "Leading candidate is not an object, using later valid object");
        return Some(object.text);
    }

    trace!(len = first.text.len(), truncated = first.truncated, "Extracted leading candidate");
    Some(first.text)
}

fn is_object(candidate: &Candidate) -> bool {
    candidate.text.starts_with('{')
}

fn parses_strictly(text: &str) -> bool {
    serde_json::from_str::<serde::de::IgnoredAny>(text).is_ok()
}

/// Remove code fence markers, keeping the fenced interior.
fn strip_fences(text: &str) -> Cow<'_, str> {
    FENCE_MARKER.replace_all(text, "")
}

/// Remove one extra layer of quoting around the whole payload.
///
/// A double-quoted payload that is itself a valid JSON string literal is
/// decoded so escaped inner quotes become structural again.
fn unwrap_quoting(text: &str) -> Cow<'_, str> {
    if text.len() < 2 {
        return Cow::Borrowed(text);
    }
    if text.starts_with('"') && text.ends_with('"') {
        if let Ok(decoded) = serde_json::from_str::<String>(text) {
            return Cow::Owned(decoded.trim().to_string());
        }
        return Cow::Borrowed(&text[1..text.len() - 1]);
    }
    if text.starts_with('\'') && text.ends_with('\'') {
        return Cow::Borrowed(&text[1..text.len() - 1]);
    }
    Cow::Borrowed(text)
}

/// Scan for top-level bracketed values in order of appearance.
fn scan_candidates(text: &str) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    let mut stack: Vec<char> = Vec::new();
    let mut start: Option<usize> = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' | '[' => {
                if stack.is_empty() {
                    start = Some(i);
                }
                stack.push(if ch == '{' { '}' } else { ']' });
            }
            '}' | ']' => {
                if stack.pop().is_some()
                    && stack.is_empty()
                    && let Some(s) = start.take()
                {
                    candidates.push(Candidate {
                        text: text[s..=i].to_string(),
                        truncated: false,
                    });
                    if candidates.len() >= MAX_CANDIDATES {
                        return candidates;
                    }
                }
            }
            _ => {}
        }
    }

    if let Some(s) = start
        && !stack.is_empty()
    {
        let mut slice = text[s..].to_string();
        if in_string {
            if escaped {
                // A dangling backslash would escape the closing quote.
                slice.pop();
            }
            slice.push('"');
        }
        slice.extend(stack.iter().rev());
        trace!(open = stack.len(), "Input ended inside a value, closing virtually");
        candidates.push(Candidate {
            text: slice,
            truncated: true,
        });
    }

    candidates
}
