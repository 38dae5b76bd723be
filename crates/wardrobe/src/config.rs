//! Configuration for the wardrobe tools
//!
//! Everything lives under one data root (`WARDROBE_ROOT`, else `~/.wardrobe`):
//! the two persisted slots and an optional `config.json`. Environment
//! variables override whatever the file says.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::weather::Coordinates;
use crate::{Result, WardrobeError};

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WardrobeConfig {
  /// Generation API base, e.g. a local forwarding proxy
  #[serde(default = "default_api_base")]
  pub api_base: String,
  #[serde(default)]
  pub api_key: String,
  /// Model used for tagging, suggestions, advice and chat
  #[serde(default = "default_text_model")]
  pub text_model: String,
  /// Model used for try-on and flat-lay renders
  #[serde(default = "default_image_model")]
  pub image_model: String,
  #[serde(default = "default_request_timeout_secs")]
  pub request_timeout_secs: u64,
  /// Upper bound on waiting for a device position
  #[serde(default = "default_geolocation_timeout_ms")]
  pub geolocation_timeout_ms: u64,
  /// Where this device is; absent means geolocation is unavailable
  #[serde(default)]
  pub location: Option<Coordinates>,
}

fn default_api_base() -> String {
  "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_text_model() -> String {
  "gemini-3-flash-preview".to_string()
}
fn default_image_model() -> String {
  "gemini-2.5-flash-image".to_string()
}
fn default_request_timeout_secs() -> u64 {
  120
}
fn default_geolocation_timeout_ms() -> u64 {
  3000
}

impl Default for WardrobeConfig {
  fn default() -> Self {
    Self {
      api_base: default_api_base(),
      api_key: String::new(),
      text_model: default_text_model(),
      image_model: default_image_model(),
      request_timeout_secs: default_request_timeout_secs(),
      geolocation_timeout_ms: default_geolocation_timeout_ms(),
      location: None,
    }
  }
}

impl WardrobeConfig {
  pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
    let content = std::fs::read_to_string(path)?;
    let config: WardrobeConfig = serde_json::from_str(&content)?;
    Ok(config)
  }

  /// Load `config.json` from the data root (or defaults), then apply env overrides
  pub fn load() -> Result<Self> {
    let path = data_root()?.join(CONFIG_FILE);
    let mut config = if path.exists() { Self::load_from_file(&path)? } else { Self::default() };
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
  }

  fn apply_env_overrides(&mut self) -> Result<()> {
    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
      self.api_key = key;
    }
    if let Ok(base) = std::env::var("WARDROBE_API_BASE") {
      self.api_base = base;
    }

    match (std::env::var("WARDROBE_LAT"), std::env::var("WARDROBE_LON")) {
      (Ok(lat), Ok(lon)) => {
        let latitude = parse_coordinate("WARDROBE_LAT", &lat)?;
        let longitude = parse_coordinate("WARDROBE_LON", &lon)?;
        self.location = Some(Coordinates::new(latitude, longitude));
      }
      (Ok(_), Err(_)) | (Err(_), Ok(_)) => {
        return Err(WardrobeError::Config(
          "WARDROBE_LAT and WARDROBE_LON must be set together".to_string(),
        ));
      }
      _ => {}
    }

    Ok(())
  }

  /// The API base must be an absolute http(s) URL
  pub fn validate(&self) -> Result<()> {
    let base = Url::parse(&self.api_base)
      .map_err(|e| WardrobeError::Config(format!("api_base '{}' is not a URL: {e}", self.api_base)))?;
    if !matches!(base.scheme(), "http" | "https") {
      return Err(WardrobeError::Config(format!("api_base must be http or https, got {}", base.scheme())));
    }
    Ok(())
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }

  pub fn geolocation_timeout(&self) -> Duration {
    Duration::from_millis(self.geolocation_timeout_ms)
  }

  /// Copy safe to print
  pub fn redacted(&self) -> Self {
    let api_key = if self.api_key.is_empty() { String::new() } else { "********".to_string() };
    Self { api_key, ..self.clone() }
  }
}

fn parse_coordinate(var: &str, value: &str) -> Result<f64> {
  value
    .trim()
    .parse::<f64>()
    .map_err(|_| WardrobeError::Config(format!("{var} is not a number: {value}")))
}

/// Data root directory (~/.wardrobe unless WARDROBE_ROOT is set)
pub fn data_root() -> Result<PathBuf> {
  if let Ok(custom_root) = std::env::var("WARDROBE_ROOT") {
    return Ok(PathBuf::from(custom_root));
  }

  let home = dirs::home_dir().ok_or(WardrobeError::NoHomeDir)?;
  Ok(home.join(".wardrobe"))
}
