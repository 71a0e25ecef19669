//! Loose JSON repair.
//!
//! Strict parse first; only on failure does the text go through a bounded,
//! ordered set of textual repairs:
//!
//! 1. typographic double quotes used as delimiters become `"` (curly single
//!    quotes become `'`)
//! 2. trailing commas before `}` / `]` are removed
//! 3. a comma is inserted between adjacent tokens that lack a separator
//! 4. list-bullet separators between array strings (`"a" - "b"`) become commas
//! 5. an unterminated string literal is closed
//! 6. unclosed `{` / `[` are closed in nested order
//! 7. if strict parse still fails, the longest prefix of the object fragment
//!    that ends on a complete member is force-closed and parsed
//!
//! Steps 2–4 are pattern based. They can misfire on string contents that
//! happen to match, which is why valid JSON never reaches them.

use crate::error::RecoveryError;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, trace};

static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// Two string tokens separated only by whitespace.
static ADJACENT_STRINGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""\s+""#).unwrap());

/// A value end (quote, brace, bracket, digit) followed by whitespace and a
/// value start (quote, brace, bracket, minus sign).
static ADJACENT_VALUES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([}\]"]|\d)\s+([{\["-])"#).unwrap());

/// `"a" - "b"`, optionally after a comma inserted by the previous step.
static BULLET_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(?:\s*,)?\s*-\s*""#).unwrap());

/// Upper bound on prefixes tried by the last-resort salvage.
const MAX_SALVAGE_ATTEMPTS: usize = 256;

/// Parse near-JSON text into a value, repairing it if necessary.
pub fn repair_json(text: &str) -> Result<Value, RecoveryError> {
    let strict_err = match serde_json::from_str::<Value>(text) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    debug!(len = text.len(), error = %strict_err, "Strict parse failed, repairing");

    let mut fixed = normalize_quotes(text);
    log_step("normalize_quotes", text, &fixed);

    let next = strip_trailing_commas(&fixed);
    log_step("strip_trailing_commas", &fixed, &next);
    fixed = next;

    let next = insert_missing_commas(&fixed);
    log_step("insert_missing_commas", &fixed, &next);
    fixed = next;

    let next = bullets_to_commas(&fixed);
    log_step("bullets_to_commas", &fixed, &next);
    fixed = next;

    let next = close_open_string(&fixed);
    log_step("close_open_string", &fixed, &next);
    fixed = next;

    let next = close_open_delimiters(&fixed);
    log_step("close_open_delimiters", &fixed, &next);
    fixed = next;

    match serde_json::from_str::<Value>(&fixed) {
        Ok(value) => {
            debug!("Repaired JSON parsed");
            Ok(value)
        }
        Err(e) => {
            debug!(error = %e, "Repaired text still invalid, salvaging longest complete prefix");
            salvage_prefix(&fixed).ok_or_else(|| RecoveryError::RepairFailed {
                message: e.to_string(),
            })
        }
    }
}

fn log_step(step: &str, before: &str, after: &str) {
    if before != after {
        trace!(step, before_len = before.len(), after_len = after.len(), "Repair step applied");
    }
}

fn is_curly_double(ch: char) -> bool {
    matches!(ch, '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}')
}

fn is_curly_single(ch: char) -> bool {
    matches!(ch, '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}')
}

/// Step 1: typographic quotes.
///
/// Curly double quotes outside straight-quoted strings are delimiters and
/// become `"`; inside a straight-quoted string they are content and stay.
pub(crate) fn normalize_quotes(text: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Outside,
        Straight,
        Curly,
    }

    let mut out = String::with_capacity(text.len());
    let mut state = State::Outside;
    let mut escaped = false;

    for ch in text.chars() {
        let ch = if is_curly_single(ch) { '\'' } else { ch };
        match state {
            State::Outside => {
                if ch == '"' {
                    state = State::Straight;
                    out.push(ch);
                } else if is_curly_double(ch) {
                    state = State::Curly;
                    out.push('"');
                } else {
                    out.push(ch);
                }
            }
            State::Straight => {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '"' {
                    state = State::Outside;
                }
                out.push(ch);
            }
            State::Curly => {
                if escaped {
                    escaped = false;
                    out.push(ch);
                } else if ch == '\\' {
                    escaped = true;
                    out.push(ch);
                } else if is_curly_double(ch) || ch == '"' {
                    state = State::Outside;
                    out.push('"');
                } else {
                    out.push(ch);
                }
            }
        }
    }
    out
}

/// Step 2: `,` followed by optional whitespace and a closer.
pub(crate) fn strip_trailing_commas(text: &str) -> String {
    TRAILING_COMMA.replace_all(text, "$1").into_owned()
}

/// Step 3: separator insertion between adjacent tokens.
pub(crate) fn insert_missing_commas(text: &str) -> String {
    let fixed = ADJACENT_STRINGS.replace_all(text, "\", \"");
    ADJACENT_VALUES
        .replace_all(&fixed, |caps: &Captures<'_>| format!("{}, {}", &caps[1], &caps[2]))
        .into_owned()
}

/// Step 4: list-bullet separators inside arrays.
pub(crate) fn bullets_to_commas(text: &str) -> String {
    BULLET_SEPARATOR.replace_all(text, "\", \"").into_owned()
}

/// Step 5: close a string literal left open by truncation.
pub(crate) fn close_open_string(text: &str) -> String {
    let mut in_string = false;
    let mut escaped = false;
    for ch in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
        } else if ch == '"' {
            in_string = true;
        }
    }

    if !in_string {
        return text.to_string();
    }
    let mut out = text.to_string();
    if escaped {
        out.pop();
    }
    out.push('"');
    out
}

/// Step 6: append the closers for every still-open `{` / `[`.
///
/// Closers that do not match the innermost open delimiter are left in place
/// and ignored for balancing.
pub(crate) fn close_open_delimiters(text: &str) -> String {
    let stack = open_delimiters(text);
    if stack.is_empty() {
        return text.to_string();
    }
    let mut out = text.to_string();
    out.extend(stack.iter().rev());
    out
}

/// Expected closers for delimiters still open at the end of `text`.
fn open_delimiters(text: &str) -> Vec<char> {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for ch in text.chars() {
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
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&ch) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }
    stack
}

/// Step 7: last-resort reconstruction.
///
/// Takes the fragment from the first `{` to the end, records every point
/// where a member is complete (just before a separating comma, or just after
/// a nested value closes), and tries those prefixes from longest to shortest,
/// force-closing each.
fn salvage_prefix(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let fragment = &text[start..];

    let mut cuts: Vec<(usize, String)> = Vec::new();
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in fragment.char_indices() {
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
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&ch) {
                    stack.pop();
                    cuts.push((i + ch.len_utf8(), stack.iter().rev().collect()));
                    if stack.is_empty() {
                        break;
                    }
                }
            }
            ',' if !stack.is_empty() => {
                cuts.push((i, stack.iter().rev().collect()));
            }
            _ => {}
        }
    }

    for (attempt, (cut, closers)) in cuts.iter().rev().take(MAX_SALVAGE_ATTEMPTS).enumerate() {
        let mut candidate = fragment[..*cut].trim_end().to_string();
        candidate.push_str(closers);
        if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
            debug!(attempt, kept = cut, dropped = fragment.len() - cut, "Salvaged JSON prefix");
            return Some(value);
        }
    }
    None
}
