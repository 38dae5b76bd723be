//! Generation API client
//!
//! A single `generateContent` call: ordered text and inline-image parts in,
//! text and inline images out. Retry and fallback live with the callers in
//! [`crate::stylist`].

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::config::WardrobeConfig;
use crate::image::InlineImage;

/// One request part, sent in order
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
  Text(String),
  Image(InlineImage),
}

impl Part {
  pub fn text(text: impl Into<String>) -> Self {
    Part::Text(text.into())
  }

  fn to_json(&self) -> Value {
    match self {
      Part::Text(text) => json!({ "text": text }),
      Part::Image(image) => json!({
        "inlineData": { "mimeType": image.mime_type, "data": image.data }
      }),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerationOutput {
  /// Concatenated text parts of the first candidate, if any
  pub text: Option<String>,
  pub images: Vec<InlineImage>,
}

impl GenerationOutput {
  pub fn from_text(text: impl Into<String>) -> Self {
    Self { text: Some(text.into()), images: Vec::new() }
  }

  /// Pull text and inline images out of a `generateContent` response body
  pub fn from_response(body: &Value) -> Self {
    let parts = body
      .get("candidates")
      .and_then(|c| c.get(0))
      .and_then(|c| c.get("content"))
      .and_then(|c| c.get("parts"))
      .and_then(|p| p.as_array());

    let mut text = String::new();
    let mut images = Vec::new();

    for part in parts.into_iter().flatten() {
      if let Some(t) = part.get("text").and_then(|t| t.as_str()) {
        text.push_str(t);
      }
      if let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) {
        let mime = inline
          .get("mimeType")
          .or_else(|| inline.get("mime_type"))
          .and_then(|m| m.as_str())
          .unwrap_or("image/png");
        if let Some(data) = inline.get("data").and_then(|d| d.as_str()) {
          images.push(InlineImage::new(mime, data));
        }
      }
    }

    Self { text: (!text.is_empty()).then_some(text), images }
  }
}

/// Failure of one generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationError {
  /// HTTP status, absent for transport failures
  pub status: Option<u16>,
  /// `error.code` from the response body
  pub code: Option<i64>,
  pub message: String,
}

impl GenerationError {
  pub fn new(message: impl Into<String>) -> Self {
    Self { status: None, code: None, message: message.into() }
  }

  /// Build from a non-success status and its body. The body's
  /// `error.status` (e.g. `RESOURCE_EXHAUSTED`) is kept in the message.
  pub fn from_status(status: u16, body: &str) -> Self {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));

    let code = error.and_then(|e| e.get("code")).and_then(|c| c.as_i64());
    let detail = error.and_then(|e| e.get("message")).and_then(|m| m.as_str());
    let kind = error.and_then(|e| e.get("status")).and_then(|s| s.as_str());

    let message = match (detail, kind) {
      (Some(detail), Some(kind)) => format!("{kind}: {detail}"),
      (Some(detail), None) => detail.to_string(),
      (None, Some(kind)) => kind.to_string(),
      (None, None) => truncate(body, 300),
    };

    Self { status: Some(status), code, message }
  }

  pub fn transport(err: &reqwest::Error) -> Self {
    Self { status: None, code: None, message: err.to_string() }
  }

  /// Status or code 429, or a message mentioning 429, quota, or
  /// RESOURCE_EXHAUSTED
  pub fn is_rate_limited(&self) -> bool {
    self.status == Some(429)
      || self.code == Some(429)
      || self.message.contains("429")
      || self.message.contains("quota")
      || self.message.contains("RESOURCE_EXHAUSTED")
  }
}

impl fmt::Display for GenerationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.status {
      Some(status) => write!(f, "generation API error (HTTP {status}): {}", self.message),
      None => write!(f, "generation API error: {}", self.message),
    }
  }
}

impl std::error::Error for GenerationError {}

fn truncate(body: &str, max_chars: usize) -> String {
  if body.chars().count() <= max_chars {
    return body.to_string();
  }
  let cut: String = body.chars().take(max_chars).collect();
  format!("{cut}...")
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationBackend: Send + Sync {
  /// One `generateContent` call. `expect_json` asks for a JSON response body.
  async fn generate(
    &self,
    model: &str,
    parts: Vec<Part>,
    expect_json: bool,
  ) -> Result<GenerationOutput, GenerationError>;
}

/// Gemini `generateContent` over HTTPS (or a forwarding proxy)
pub struct GeminiClient {
  client: Client,
  api_base: String,
  api_key: String,
}

impl GeminiClient {
  pub fn new(api_base: &str, api_key: &str, timeout: Duration) -> crate::Result<Self> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self {
      client,
      api_base: api_base.trim_end_matches('/').to_string(),
      api_key: api_key.to_string(),
    })
  }

  pub fn from_config(config: &WardrobeConfig) -> crate::Result<Self> {
    Self::new(&config.api_base, &config.api_key, config.request_timeout())
  }

  pub fn endpoint(&self, model: &str) -> String {
    format!("{}/models/{}:generateContent", self.api_base, model)
  }
}

/// Request body for one user turn
pub fn request_body(parts: &[Part], expect_json: bool) -> Value {
  let mut body = json!({
    "contents": [{
      "role": "user",
      "parts": parts.iter().map(Part::to_json).collect::<Vec<_>>(),
    }]
  });
  if expect_json {
    body["generationConfig"] = json!({ "responseMimeType": "application/json" });
  }
  body
}

#[async_trait]
impl GenerationBackend for GeminiClient {
  async fn generate(
    &self,
    model: &str,
    parts: Vec<Part>,
    expect_json: bool,
  ) -> Result<GenerationOutput, GenerationError> {
    let url = self.endpoint(model);
    debug!(model, parts = parts.len(), expect_json, "generateContent");

    let response = self
      .client
      .post(&url)
      .header("x-goog-api-key", &self.api_key)
      .json(&request_body(&parts, expect_json))
      .send()
      .await
      .map_err(|e| GenerationError::transport(&e))?;

    let status = response.status();
    let text = response.text().await.map_err(|e| GenerationError::transport(&e))?;

    if !status.is_success() {
      return Err(GenerationError::from_status(status.as_u16(), &text));
    }

    let body: Value = serde_json::from_str(&text)
      .map_err(|e| GenerationError::new(format!("unreadable response body: {e}")))?;
    Ok(GenerationOutput::from_response(&body))
  }
}
