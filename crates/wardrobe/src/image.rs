//! Inline images and data URLs

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;

use crate::{Result, WardrobeError};

const FALLBACK_MIME: &str = "image/jpeg";

/// Base64 image payload with its MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
  pub mime_type: String,
  pub data: String,
}

impl InlineImage {
  pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
    Self { mime_type: mime_type.into(), data: data.into() }
  }

  /// Split `data:image/<x>;base64,<data>`. Anything else is taken as raw
  /// base64 JPEG.
  pub fn from_data_url(url: &str) -> Self {
    match split_data_url(url) {
      Some((mime, data)) => Self::new(mime, data),
      None => Self::new(FALLBACK_MIME, url),
    }
  }

  pub fn to_data_url(&self) -> String {
    format!("data:{};base64,{}", self.mime_type, self.data)
  }

  /// Read an image file; the MIME type comes from the extension
  pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref();
    let mime = mime_for_path(path)
      .ok_or_else(|| WardrobeError::Image(format!("unsupported image type: {}", path.display())))?;
    let bytes = std::fs::read(path)?;
    Ok(Self::new(mime, STANDARD.encode(bytes)))
  }

  pub fn decode(&self) -> Result<Vec<u8>> {
    STANDARD
      .decode(self.data.trim())
      .map_err(|e| WardrobeError::Image(format!("bad base64 payload: {e}")))
  }

  /// Write the decoded bytes to `path`
  pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
    std::fs::write(path, self.decode()?)?;
    Ok(())
  }
}

fn split_data_url(url: &str) -> Option<(&str, &str)> {
  let (mime, data) = url.strip_prefix("data:")?.split_once(";base64,")?;
  let subtype = mime.strip_prefix("image/")?;
  let well_formed = !subtype.is_empty()
    && subtype.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    && !data.is_empty();
  well_formed.then_some((mime, data))
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
  let ext = path.extension()?.to_str()?.to_ascii_lowercase();
  match ext.as_str() {
    "jpg" | "jpeg" => Some("image/jpeg"),
    "png" => Some("image/png"),
    "webp" => Some("image/webp"),
    "gif" => Some("image/gif"),
    "heic" => Some("image/heic"),
    _ => None,
  }
}
