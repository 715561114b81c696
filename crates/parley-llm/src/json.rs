//! JSON extraction from model output.
//!
//! JSON mode is not honored by every compatible endpoint, so replies may
//! arrive fenced in code blocks or prefixed with `<think>` sections.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

use parley_core::error::{ParleyError, ParleyResult};

static FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("valid regex"));
static WHOLE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[a-zA-Z0-9]*\n?([\s\S]*?)\n?```$").expect("valid regex"));
static THINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));

/// Strip a surrounding code fence and any `<think>` sections.
pub fn remove_code_blocks(content: &str) -> String {
    let content = content.trim();
    let content = WHOLE_FENCE
        .captures(content)
        .and_then(|c| c.get(1).map(|m| m.as_str().trim()))
        .unwrap_or(content);
    THINK.replace_all(content, "").trim().to_string()
}

/// The JSON object inside `text`.
///
/// Prefers a fenced block, then the outermost `{...}` span.
pub fn extract_json(text: &str) -> String {
    let text = text.trim();
    if let Some(inner) = FENCED.captures(text).and_then(|c| c.get(1)) {
        return inner.as_str().trim().to_string();
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => text[start..=end].to_string(),
        _ => text.to_string(),
    }
}

/// Parse model output into `T`.
pub fn parse_model_json<T: DeserializeOwned>(response: &str) -> ParleyResult<T> {
    let cleaned = remove_code_blocks(response);
    if cleaned.is_empty() {
        return Err(ParleyError::parse("model returned an empty response"));
    }
    let json = extract_json(&cleaned);
    serde_json::from_str(&json)
        .map_err(|e| ParleyError::parse(format!("Failed to parse model JSON: {}", e)))
}
