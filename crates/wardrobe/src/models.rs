//! Domain records shared by the store, the requesters, and the CLI.
//!
//! Field names on the wire match the persisted layout (`imageUrl`,
//! `dateAdded`, `wearCount`, ...) and timestamps are epoch milliseconds.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Read an explicit `null` the same as a missing field
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Any JSON number, rounded and clamped to 0..=100
fn percent_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
  let raw = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
  Ok(raw.round().clamp(0.0, 100.0) as u8)
}

fn lenient_gender<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Gender, D::Error> {
  let raw = Option::<String>::deserialize(deserializer)?;
  Ok(raw.as_deref().and_then(Gender::from_label).unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Season {
  #[serde(rename = "春")]
  Spring,
  #[serde(rename = "夏")]
  Summer,
  #[serde(rename = "秋")]
  Autumn,
  #[serde(rename = "冬")]
  Winter,
  #[serde(rename = "四季通用")]
  All,
}

impl Season {
  pub fn label(&self) -> &'static str {
    match self {
      Season::Spring => "春",
      Season::Summer => "夏",
      Season::Autumn => "秋",
      Season::Winter => "冬",
      Season::All => "四季通用",
    }
  }

  /// Accepts the label the generation API returns
  pub fn from_label(label: &str) -> Option<Self> {
    match label.trim() {
      "春" => Some(Season::Spring),
      "夏" => Some(Season::Summer),
      "秋" => Some(Season::Autumn),
      "冬" => Some(Season::Winter),
      "四季通用" => Some(Season::All),
      _ => None,
    }
  }
}

impl fmt::Display for Season {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Formality {
  #[serde(rename = "休闲")]
  Casual,
  #[serde(rename = "商务休闲")]
  SmartCasual,
  #[serde(rename = "正式商务")]
  Business,
  #[serde(rename = "隆重礼服")]
  Formal,
  #[serde(rename = "运动户外")]
  Sport,
}

impl Formality {
  pub fn label(&self) -> &'static str {
    match self {
      Formality::Casual => "休闲",
      Formality::SmartCasual => "商务休闲",
      Formality::Business => "正式商务",
      Formality::Formal => "隆重礼服",
      Formality::Sport => "运动户外",
    }
  }

  pub fn from_label(label: &str) -> Option<Self> {
    match label.trim() {
      "休闲" => Some(Formality::Casual),
      "商务休闲" => Some(Formality::SmartCasual),
      "正式商务" => Some(Formality::Business),
      "隆重礼服" => Some(Formality::Formal),
      "运动户外" => Some(Formality::Sport),
      _ => None,
    }
  }
}

impl fmt::Display for Formality {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

/// One cataloged clothing item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClothingRecord {
  pub id: String,
  /// Data URL or remote URL of the item photo
  pub image_url: String,
  pub category: String,
  pub color: String,
  pub season: Season,
  pub formality: Formality,
  pub description: String,
  #[serde(with = "chrono::serde::ts_milliseconds")]
  pub date_added: DateTime<Utc>,

  pub wear_count: u32,
  #[serde(default, with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
  pub last_worn: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub price: Option<f64>,
}

impl ClothingRecord {
  /// Create a never-worn record with a fresh id
  pub fn new(
    image_url: String,
    category: String,
    color: String,
    season: Season,
    formality: Formality,
    description: String,
  ) -> Self {
    Self {
      id: uuid::Uuid::new_v4().to_string(),
      image_url,
      category,
      color,
      season,
      formality,
      description,
      date_added: Utc::now(),
      wear_count: 0,
      last_worn: None,
      price: None,
    }
  }

  /// Short "color category" label used in listings and prompts
  pub fn title(&self) -> String {
    format!("{} {}", self.color, self.category)
  }

  /// Whole days since the record was last worn, if ever
  pub fn days_since_worn(&self, now: DateTime<Utc>) -> Option<i64> {
    self.last_worn.map(|worn| (now - worn).num_days())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum Gender {
  Male,
  #[default]
  Female,
  Unisex,
}

impl Gender {
  /// Case-insensitive; anything unrecognised is `None`
  pub fn from_label(label: &str) -> Option<Self> {
    match label.trim().to_ascii_lowercase().as_str() {
      "male" => Some(Gender::Male),
      "female" => Some(Gender::Female),
      "unisex" => Some(Gender::Unisex),
      _ => None,
    }
  }
}

impl fmt::Display for Gender {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      Gender::Male => "Male",
      Gender::Female => "Female",
      Gender::Unisex => "Unisex",
    };
    f.write_str(label)
  }
}

/// The single per-device profile; missing or null fields take the defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
  #[serde(deserialize_with = "null_as_default")]
  pub name: String,
  #[serde(deserialize_with = "lenient_gender")]
  pub gender: Gender,
  /// Centimetres as typed by the user; empty when not provided
  #[serde(deserialize_with = "null_as_default")]
  pub height: String,
  /// Kilograms as typed by the user; empty when not provided
  #[serde(deserialize_with = "null_as_default")]
  pub weight: String,
  pub avatar: Option<String>,
}

impl Default for UserProfile {
  fn default() -> Self {
    Self {
      name: "主人".to_string(),
      gender: Gender::Female,
      height: String::new(),
      weight: String::new(),
      avatar: None,
    }
  }
}

/// Partial profile edit; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
  pub name: Option<String>,
  pub gender: Option<Gender>,
  pub height: Option<String>,
  pub weight: Option<String>,
  pub avatar: Option<Option<String>>,
}

impl UserProfile {
  pub fn apply(&mut self, update: ProfileUpdate) {
    if let Some(name) = update.name {
      self.name = name;
    }
    if let Some(gender) = update.gender {
      self.gender = gender;
    }
    if let Some(height) = update.height {
      self.height = height;
    }
    if let Some(weight) = update.weight {
      self.weight = weight;
    }
    if let Some(avatar) = update.avatar {
      self.avatar = avatar;
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
  #[serde(rename = "晴")]
  Clear,
  #[serde(rename = "多云")]
  Cloudy,
  #[serde(rename = "雨")]
  Rain,
  #[serde(rename = "雪")]
  Snow,
  #[serde(rename = "大风")]
  Windy,
  #[serde(rename = "阴")]
  Overcast,
}

impl Condition {
  pub fn label(&self) -> &'static str {
    match self {
      Condition::Clear => "晴",
      Condition::Cloudy => "多云",
      Condition::Rain => "雨",
      Condition::Snow => "雪",
      Condition::Windy => "大风",
      Condition::Overcast => "阴",
    }
  }
}

impl fmt::Display for Condition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

/// Current conditions for one place; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
  pub city: String,
  pub temperature: i32,
  pub condition: Condition,
  pub description: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutfitSuggestion {
  #[serde(default, deserialize_with = "null_as_default")]
  pub selected_item_ids: Vec<String>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub reasoning: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
  #[serde(rename = "买")]
  Buy,
  #[serde(rename = "不买")]
  Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingAdvice {
  pub verdict: Verdict,
  /// 0-100 recommendation score
  #[serde(default, deserialize_with = "percent_score")]
  pub score: u8,
  #[serde(default, deserialize_with = "null_as_default")]
  pub reasoning: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub suggestions: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub similar_item_id: Option<String>,
}

impl ShoppingAdvice {
  pub fn declined(reasoning: &str) -> Self {
    Self {
      verdict: Verdict::Skip,
      score: 0,
      reasoning: reasoning.to_string(),
      suggestions: None,
      similar_item_id: None,
    }
  }
}

/// Tags proposed for a freshly photographed item; every field may be missing
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ItemAnalysis {
  #[serde(default, deserialize_with = "null_as_default")]
  pub category: String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub color: String,
  #[serde(default)]
  pub season: Option<String>,
  #[serde(default)]
  pub formality: Option<String>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub description: String,
}

impl ItemAnalysis {
  pub fn is_empty(&self) -> bool {
    self.category.is_empty() && self.color.is_empty()
  }

  pub fn season(&self) -> Option<Season> {
    self.season.as_deref().and_then(Season::from_label)
  }

  pub fn formality(&self) -> Option<Formality> {
    self.formality.as_deref().and_then(Formality::from_label)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_record_serializes_with_persisted_field_names() {
    let mut record = ClothingRecord::new(
      "data:image/png;base64,AAAA".to_string(),
      "衬衫".to_string(),
      "米白".to_string(),
      Season::Spring,
      Formality::SmartCasual,
      "修身".to_string(),
    );
    record.date_added = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["imageUrl"], "data:image/png;base64,AAAA");
    assert_eq!(value["season"], "春");
    assert_eq!(value["formality"], "商务休闲");
    assert_eq!(value["dateAdded"], 1_700_000_000_000i64);
    assert_eq!(value["wearCount"], 0);
    assert!(value.get("lastWorn").is_none());
  }

  #[test]
  fn test_profile_missing_gender_defaults_to_female() {
    let profile: UserProfile =
      serde_json::from_str(r#"{"name":"小王","height":"170","weight":"","avatar":null}"#).unwrap();
    assert_eq!(profile.gender, Gender::Female);
    assert_eq!(profile.height, "170");
  }

  #[test]
  fn test_profile_missing_name_keeps_other_fields() {
    let profile: UserProfile =
      serde_json::from_str(r#"{"gender":"MALE","height":"180","weight":null,"avatar":"data:x"}"#).unwrap();
    assert_eq!(profile.name, "主人");
    assert_eq!(profile.gender, Gender::Male);
    assert_eq!(profile.height, "180");
    assert_eq!(profile.weight, "");
    assert_eq!(profile.avatar.as_deref(), Some("data:x"));
  }

  #[test]
  fn test_profile_unknown_gender_defaults_to_female() {
    let profile: UserProfile = serde_json::from_str(r#"{"name":"小王","gender":"other"}"#).unwrap();
    assert_eq!(profile.gender, Gender::Female);
    assert_eq!(profile.name, "小王");
  }

  #[test]
  fn test_profile_update_only_touches_given_fields() {
    let mut profile = UserProfile::default();
    profile.apply(ProfileUpdate { height: Some("165".to_string()), ..Default::default() });

    assert_eq!(profile.height, "165");
    assert_eq!(profile.name, "主人");
    assert_eq!(profile.weight, "");

    profile.apply(ProfileUpdate { avatar: Some(Some("data:x".to_string())), ..Default::default() });
    assert_eq!(profile.avatar.as_deref(), Some("data:x"));
    profile.apply(ProfileUpdate { avatar: Some(None), ..Default::default() });
    assert!(profile.avatar.is_none());
  }

  #[test]
  fn test_days_since_worn() {
    let mut record = ClothingRecord::new(
      String::new(),
      "T恤".to_string(),
      "白".to_string(),
      Season::Summer,
      Formality::Casual,
      String::new(),
    );
    let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    assert_eq!(record.days_since_worn(now), None);

    record.last_worn = Some(now - chrono::Duration::days(3));
    assert_eq!(record.days_since_worn(now), Some(3));
  }

  #[test]
  fn test_analysis_labels_map_to_enums() {
    let analysis = ItemAnalysis {
      category: "牛仔裤".to_string(),
      color: "藏青".to_string(),
      season: Some("四季通用".to_string()),
      formality: Some("unknown".to_string()),
      description: String::new(),
    };
    assert_eq!(analysis.season(), Some(Season::All));
    assert_eq!(analysis.formality(), None);
    assert!(!analysis.is_empty());
  }
}
