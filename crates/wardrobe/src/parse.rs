//! Recovering JSON from free-form model replies.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::warn;

static FENCED_BLOCK: LazyLock<Option<Regex>> =
  LazyLock::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").ok());

/// Find the JSON value in a model reply.
///
/// Tried in order: the body of the first fenced code block; the span from
/// the first `{` to the last `}` once fence markers are stripped; the whole
/// trimmed text. The first candidate found is the only one parsed.
pub fn extract_json(text: &str) -> Option<Value> {
  let fenced = FENCED_BLOCK
    .as_ref()
    .and_then(|re| re.captures(text))
    .and_then(|caps| caps.get(1))
    .map(|m| m.as_str().to_string());

  let candidate = match fenced {
    Some(body) => body,
    None => {
      let cleaned = text.replace("```json", "").replace("```", "");
      let cleaned = cleaned.trim();
      match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => cleaned[start..=end].to_string(),
        _ => cleaned.to_string(),
      }
    }
  };

  match serde_json::from_str(&candidate) {
    Ok(value) => Some(value),
    Err(e) => {
      warn!(error = %e, "model reply is not JSON");
      None
    }
  }
}

/// [`extract_json`] then deserialize; a shape mismatch is also `None`
pub fn parse_reply<T: DeserializeOwned>(text: &str) -> Option<T> {
  let value = extract_json(text)?;
  serde_json::from_value(value)
    .inspect_err(|e| warn!(error = %e, "model reply has unexpected shape"))
    .ok()
}
