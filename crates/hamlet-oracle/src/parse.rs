//! Recovery parsing of oracle responses into JSON values.
//!
//! The oracle returns raw text that should contain JSON but often does
//! not, quite. This module extracts a [`serde_json::Value`] through a
//! ladder of recovery strategies; callers then pull typed fields out with
//! the lenient accessors, clamping or dropping anything malformed.

use serde_json::Value;
use tracing::warn;

use crate::error::OracleError;

/// Parse an oracle response string into a JSON value.
///
/// Recovery ladder:
/// 1. Direct `serde_json` parse
/// 2. Extract from a fenced markdown code block
/// 3. Strip trailing commas and retry
/// 4. Fenced block extraction, then trailing-comma strip
/// 5. First `{`..last `}` slice
///
/// # Errors
///
/// Returns [`OracleError::Parse`] when every strategy fails.
pub fn recover_json(raw: &str) -> Result<Value, OracleError> {
    let trimmed = raw.trim();

    // Strategy 1: direct parse
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    // Strategy 2: extract from markdown code block
    if let Some(block) = extract_code_block(trimmed)
        && let Ok(value) = serde_json::from_str::<Value>(block)
    {
        return Ok(value);
    }

    // Strategy 3: strip trailing commas and retry
    let cleaned = strip_trailing_commas(trimmed);
    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        return Ok(value);
    }

    // Strategy 4: code block extraction then comma strip
    if let Some(block) = extract_code_block(trimmed) {
        let cleaned = strip_trailing_commas(block);
        if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
            return Ok(value);
        }
    }

    // Strategy 5: widest brace slice
    if let Some(slice) = widest_object_slice(trimmed) {
        let cleaned = strip_trailing_commas(slice);
        if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
            return Ok(value);
        }
    }

    warn!(raw_len = raw.len(), "all JSON recovery strategies failed");
    Err(OracleError::Parse(format!(
        "unrecoverable response ({} bytes)",
        raw.len()
    )))
}

/// Extract the contents of the first fenced code block, tolerating an
/// optional `json` language tag.
fn extract_code_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = text.get(start.checked_add(3)?..)?;
    let body_start = after_fence
        .strip_prefix("json")
        .unwrap_or(after_fence)
        .trim_start_matches(['\r', '\n']);
    let end = body_start.find("```")?;
    body_start.get(..end).map(str::trim)
}

/// Remove trailing commas before closing brackets/braces.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == ',' {
            // Look ahead past whitespace for a closing bracket.
            let next_non_ws = chars.clone().find(|peeked| !peeked.is_whitespace());
            if matches!(next_non_ws, Some('}' | ']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Slice from the first `{` to the last `}` inclusive.
fn widest_object_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    text.get(start..=end)
}

// ---------------------------------------------------------------------------
// Lenient field accessors
// ---------------------------------------------------------------------------

/// Read a number field, accepting integers, floats, and numeric strings.
pub fn field_f64(value: &Value, key: &str) -> Option<f64> {
    let field = value.get(key)?;
    if let Some(n) = field.as_f64() {
        return Some(n);
    }
    field.as_str()?.trim().parse().ok()
}

/// Read a string field, accepting numbers by formatting them.
pub fn field_str(value: &Value, key: &str) -> Option<String> {
    let field = value.get(key)?;
    if let Some(s) = field.as_str() {
        return Some(s.to_owned());
    }
    if field.is_number() {
        return Some(field.to_string());
    }
    None
}

/// Read a boolean field, accepting `"true"` / `"false"` strings.
pub fn field_bool(value: &Value, key: &str) -> Option<bool> {
    let field = value.get(key)?;
    if let Some(b) = field.as_bool() {
        return Some(b);
    }
    match field.as_str()?.trim().to_lowercase().as_str() {
        "true" | "yes" => Some(true),
        "false" | "no" => Some(false),
        _ => None,
    }
}
