use thiserror::Error;

use crate::genai::GenerationError;

/// Errors surfaced by the wardrobe library.
///
/// Most external failures never reach this type: the requesters and the
/// weather pipeline degrade to default values instead. What remains is local
/// I/O, configuration, and persistence writes.
#[derive(Error, Debug)]
pub enum WardrobeError {
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error(transparent)]
  Generation(#[from] GenerationError),

  #[error("Configuration error: {0}")]
  Config(String),

  #[error("Unexpected response: {0}")]
  Response(String),

  #[error("Invalid image: {0}")]
  Image(String),

  #[error("Could not find home directory")]
  NoHomeDir,
}

pub type Result<T> = std::result::Result<T, WardrobeError>;
