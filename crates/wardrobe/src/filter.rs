//! Category-group filter and free-text search over records.

use clap::ValueEnum;
use std::fmt;

use crate::models::ClothingRecord;

const TOP_KEYWORDS: &[&str] =
  &["T恤", "衬衫", "卫衣", "毛衣", "针织衫", "外套", "夹克", "大衣", "羽绒服", "马甲", "吊带", "西装外套"];
const BOTTOM_KEYWORDS: &[&str] = &["裤", "裙"];
const FOOTWEAR_KEYWORDS: &[&str] = &["鞋", "靴"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CategoryGroup {
  #[default]
  All,
  Tops,
  Bottoms,
  Footwear,
  Other,
}

impl CategoryGroup {
  /// Derive the group of a category label by keyword membership.
  ///
  /// Tables are checked tops, bottoms, footwear in that order; a label
  /// matching none of them is `Other`. Never returns `All`.
  pub fn of(category: &str) -> Self {
    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| category.contains(k));

    if contains_any(TOP_KEYWORDS) {
      CategoryGroup::Tops
    } else if contains_any(BOTTOM_KEYWORDS) {
      CategoryGroup::Bottoms
    } else if contains_any(FOOTWEAR_KEYWORDS) {
      CategoryGroup::Footwear
    } else {
      CategoryGroup::Other
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      CategoryGroup::All => "全部",
      CategoryGroup::Tops => "上装",
      CategoryGroup::Bottoms => "下装",
      CategoryGroup::Footwear => "鞋履",
      CategoryGroup::Other => "其它",
    }
  }

  fn admits(&self, record: &ClothingRecord) -> bool {
    *self == CategoryGroup::All || CategoryGroup::of(&record.category) == *self
  }
}

impl fmt::Display for CategoryGroup {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

fn matches_query(record: &ClothingRecord, needle: &str) -> bool {
  [&record.category, &record.color, &record.description]
    .iter()
    .any(|field| field.to_lowercase().contains(needle))
}

/// Records in `group` whose category, color or description contains `query`
/// (case-insensitive). An empty query matches everything; order is preserved.
pub fn filter_records<'a>(
  records: &'a [ClothingRecord],
  group: CategoryGroup,
  query: &str,
) -> Vec<&'a ClothingRecord> {
  let needle = query.to_lowercase();

  records
    .iter()
    .filter(|record| group.admits(record))
    .filter(|record| needle.is_empty() || matches_query(record, &needle))
    .collect()
}
