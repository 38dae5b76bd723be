//! Local record store
//!
//! The clothing collection and the profile are held in memory by an
//! explicitly owned [`WardrobeStore`] and mirrored to two key-value slots.
//! Every mutation updates memory first and then rewrites the whole slot. A
//! failed write is reported, but memory keeps the new state: the two diverge
//! until the next successful mutation rewrites the slot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config;
use crate::models::{null_as_default, ClothingRecord, Formality, ProfileUpdate, Season, UserProfile};
use crate::Result;

pub const ITEMS_KEY: &str = "wardrobe_items_cn";
pub const PROFILE_KEY: &str = "user_profile_cn";

/// Flat key-value persistence
pub trait SlotStore {
  fn read(&self, key: &str) -> Result<Option<String>>;
  fn write(&self, key: &str, value: &str) -> Result<()>;
}

/// One JSON file per key under a root directory
#[derive(Debug, Clone)]
pub struct FileSlots {
  root: PathBuf,
}

impl FileSlots {
  pub fn new<P: AsRef<Path>>(root: P) -> Self {
    Self { root: root.as_ref().to_path_buf() }
  }

  /// Slots under the configured data root
  pub fn open_default() -> Result<Self> {
    Ok(Self::new(config::data_root()?))
  }

  pub fn path_for(&self, key: &str) -> PathBuf {
    self.root.join(format!("{key}.json"))
  }
}

impl SlotStore for FileSlots {
  fn read(&self, key: &str) -> Result<Option<String>> {
    let path = self.path_for(key);
    if !path.exists() {
      return Ok(None);
    }
    Ok(Some(fs::read_to_string(path)?))
  }

  fn write(&self, key: &str, value: &str) -> Result<()> {
    fs::create_dir_all(&self.root)?;
    fs::write(self.path_for(key), value)?;
    Ok(())
  }
}

/// Unknown labels fall back to the manual-entry default
fn lenient_season<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Season, D::Error> {
  let raw = Option::<String>::deserialize(deserializer)?;
  Ok(raw.as_deref().and_then(Season::from_label).unwrap_or(Season::All))
}

fn lenient_formality<'de, D: Deserializer<'de>>(
  deserializer: D,
) -> std::result::Result<Formality, D::Error> {
  let raw = Option::<String>::deserialize(deserializer)?;
  Ok(raw.as_deref().and_then(Formality::from_label).unwrap_or(Formality::Casual))
}

/// Record shape as found on disk: analytics fields possibly absent, tags
/// possibly outside the known label sets
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedRecord {
  id: String,
  #[serde(default, deserialize_with = "null_as_default")]
  image_url: String,
  #[serde(default, deserialize_with = "null_as_default")]
  category: String,
  #[serde(default, deserialize_with = "null_as_default")]
  color: String,
  #[serde(default = "all_seasons", deserialize_with = "lenient_season")]
  season: Season,
  #[serde(default = "casual", deserialize_with = "lenient_formality")]
  formality: Formality,
  #[serde(default, deserialize_with = "null_as_default")]
  description: String,
  #[serde(with = "chrono::serde::ts_milliseconds")]
  date_added: DateTime<Utc>,
  #[serde(default)]
  wear_count: Option<u32>,
  #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
  last_worn: Option<DateTime<Utc>>,
  #[serde(default)]
  price: Option<f64>,
}

fn all_seasons() -> Season {
  Season::All
}

fn casual() -> Formality {
  Formality::Casual
}

impl From<PersistedRecord> for ClothingRecord {
  fn from(stored: PersistedRecord) -> Self {
    ClothingRecord {
      id: stored.id,
      image_url: stored.image_url,
      category: stored.category,
      color: stored.color,
      season: stored.season,
      formality: stored.formality,
      description: stored.description,
      date_added: stored.date_added,
      wear_count: stored.wear_count.unwrap_or(0),
      last_worn: stored.last_worn,
      price: stored.price,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WardrobeStats {
  pub total: usize,
  pub worn: usize,
  /// Share of records worn at least once, rounded to a whole percent
  pub utilization_percent: u32,
  pub newest: Option<String>,
}

pub struct WardrobeStore<S: SlotStore> {
  slots: S,
  items: Vec<ClothingRecord>,
  profile: UserProfile,
}

impl<S: SlotStore> WardrobeStore<S> {
  /// Load both slots.
  ///
  /// An unparseable collection becomes empty and an unparseable profile
  /// becomes the default; only read I/O failures are returned.
  pub fn open(slots: S) -> Result<Self> {
    let items = match slots.read(ITEMS_KEY)? {
      Some(raw) => parse_items(&raw),
      None => Vec::new(),
    };

    let profile = match slots.read(PROFILE_KEY)? {
      Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(error = %e, "stored profile unreadable, using defaults");
        UserProfile::default()
      }),
      None => UserProfile::default(),
    };

    debug!(items = items.len(), "wardrobe loaded");
    Ok(Self { slots, items, profile })
  }

  /// Records, newest first
  pub fn items(&self) -> &[ClothingRecord] {
    &self.items
  }

  pub fn profile(&self) -> &UserProfile {
    &self.profile
  }

  pub fn get(&self, id: &str) -> Option<&ClothingRecord> {
    self.items.iter().find(|item| item.id == id)
  }

  pub fn slots(&self) -> &S {
    &self.slots
  }

  /// Prepend a record; its wear count always starts at zero
  pub fn add(&mut self, record: ClothingRecord) -> Result<()> {
    let record = ClothingRecord { wear_count: 0, ..record };
    self.items.insert(0, record);
    self.persist_items()
  }

  /// Drop the record with this id; absent ids are a no-op. Returns whether
  /// anything was removed.
  pub fn remove(&mut self, id: &str) -> Result<bool> {
    let before = self.items.len();
    self.items.retain(|item| item.id != id);
    let removed = self.items.len() != before;
    self.persist_items()?;
    Ok(removed)
  }

  /// Count one wear for every record in `ids`, stamped now
  pub fn mark_worn<I: AsRef<str>>(&mut self, ids: &[I]) -> Result<usize> {
    self.mark_worn_at(ids, Utc::now())
  }

  /// Count one wear for every record in `ids`, stamped `at`. Returns the
  /// number of records updated.
  pub fn mark_worn_at<I: AsRef<str>>(&mut self, ids: &[I], at: DateTime<Utc>) -> Result<usize> {
    let wanted: HashSet<&str> = ids.iter().map(|id| id.as_ref()).collect();
    let mut updated = 0;

    for item in self.items.iter_mut().filter(|item| wanted.contains(item.id.as_str())) {
      item.wear_count = item.wear_count.saturating_add(1);
      item.last_worn = Some(at);
      updated += 1;
    }

    self.persist_items()?;
    Ok(updated)
  }

  pub fn update_profile(&mut self, update: ProfileUpdate) -> Result<()> {
    self.profile.apply(update);
    self.persist_profile()
  }

  pub fn stats(&self) -> WardrobeStats {
    let total = self.items.len();
    let worn = self.items.iter().filter(|item| item.wear_count > 0).count();
    let utilization_percent =
      if total == 0 { 0 } else { ((worn as f64 / total as f64) * 100.0).round() as u32 };

    WardrobeStats { total, worn, utilization_percent, newest: self.items.first().map(|item| item.title()) }
  }

  fn persist_items(&self) -> Result<()> {
    let encoded = serde_json::to_string(&self.items)?;
    self.slots.write(ITEMS_KEY, &encoded).inspect_err(|e| {
      warn!(error = %e, "failed to persist wardrobe; memory and disk now differ");
    })
  }

  fn persist_profile(&self) -> Result<()> {
    let encoded = serde_json::to_string(&self.profile)?;
    self.slots.write(PROFILE_KEY, &encoded).inspect_err(|e| {
      warn!(error = %e, "failed to persist profile; memory and disk now differ");
    })
  }
}

/// Decode the stored collection record by record, filling in missing
/// analytics fields. Only a slot that is not a JSON array comes back empty; a
/// single record without an id or timestamp is skipped.
fn parse_items(raw: &str) -> Vec<ClothingRecord> {
  let stored = match serde_json::from_str::<Vec<Value>>(raw) {
    Ok(stored) => stored,
    Err(e) => {
      warn!(error = %e, "stored wardrobe unreadable, starting empty");
      return Vec::new();
    }
  };

  stored
    .into_iter()
    .enumerate()
    .filter_map(|(index, value)| match serde_json::from_value::<PersistedRecord>(value) {
      Ok(record) => Some(ClothingRecord::from(record)),
      Err(e) => {
        warn!(index, error = %e, "skipping unreadable wardrobe record");
        None
      }
    })
    .collect()
}
