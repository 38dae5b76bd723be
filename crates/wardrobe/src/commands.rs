use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::Args;
use colored::*;
use std::path::{Path, PathBuf};

use wardrobe::config::{self, WardrobeConfig};
use wardrobe::filter::{filter_records, CategoryGroup};
use wardrobe::genai::GeminiClient;
use wardrobe::image::InlineImage;
use wardrobe::models::{
  ClothingRecord, Formality, Gender, ItemAnalysis, ProfileUpdate, Season, ShoppingAdvice, Verdict,
  WeatherSnapshot,
};
use wardrobe::store::{FileSlots, WardrobeStore};
use wardrobe::stylist::{chat_context, resolve_outfit, Stylist, DEFAULT_OCCASION};
use wardrobe::weather::{self, ConfiguredLocation, OpenMeteoClient};

const UNNAMED_CATEGORY: &str = "未命名";
const UNKNOWN_COLOR: &str = "无色";

/// Tags given on the command line; each one overrides the automatic analysis
#[derive(Args, Debug, Default)]
pub struct ItemTags {
  /// Category, e.g. 衬衫 or 运动鞋
  #[arg(long)]
  pub category: Option<String>,
  #[arg(long)]
  pub color: Option<String>,
  #[arg(long, value_enum)]
  pub season: Option<Season>,
  #[arg(long, value_enum)]
  pub formality: Option<Formality>,
  #[arg(long)]
  pub description: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct ProfileFields {
  #[arg(long)]
  pub name: Option<String>,
  #[arg(long, value_enum)]
  pub gender: Option<Gender>,
  /// Height in centimetres
  #[arg(long)]
  pub height: Option<String>,
  /// Weight in kilograms
  #[arg(long)]
  pub weight: Option<String>,
  /// Photo used as the default try-on model
  #[arg(long, conflicts_with = "clear_avatar")]
  pub avatar: Option<PathBuf>,
  /// Forget the stored avatar
  #[arg(long)]
  pub clear_avatar: bool,
}

#[derive(Args, Debug, Default)]
pub struct SuggestOptions {
  /// Occasion to dress for (default 日常通勤)
  #[arg(long)]
  pub occasion: Option<String>,
  /// Use this city's weather instead of the device location
  #[arg(long)]
  pub city: Option<String>,
  /// Record the suggested outfit as worn today
  #[arg(long)]
  pub wear: bool,
  /// Render the outfit on a model
  #[arg(long)]
  pub try_on: bool,
  /// Person photo for the try-on (defaults to the profile avatar)
  #[arg(long, requires = "try_on")]
  pub photo: Option<PathBuf>,
  /// Where to write the rendered image
  #[arg(long, default_value = "outfit.png", requires = "try_on")]
  pub out: PathBuf,
}

fn open_store() -> Result<WardrobeStore<FileSlots>> {
  let slots = FileSlots::open_default()?;
  WardrobeStore::open(slots).context("Failed to load wardrobe data")
}

fn load_config() -> Result<WardrobeConfig> {
  WardrobeConfig::load().context("Failed to load configuration")
}

fn stylist(config: &WardrobeConfig) -> Result<Stylist> {
  if config.api_key.is_empty() {
    valet::warn!("GEMINI_API_KEY is not set; AI features will fall back to defaults");
  }
  let backend = GeminiClient::from_config(config)?;
  Ok(Stylist::from_config(Box::new(backend), config))
}

fn load_image(path: &Path) -> Result<InlineImage> {
  InlineImage::load(path).with_context(|| format!("Failed to read image {}", path.display()))
}

/// Explicit tags win, then the analysis, then the manual defaults
fn merge_tags(tags: ItemTags, analysis: &ItemAnalysis) -> (String, String, Season, Formality, String) {
  let or_analysis = |given: Option<String>, found: &str, fallback: &str| {
    given.filter(|v| !v.trim().is_empty()).unwrap_or_else(|| {
      if found.trim().is_empty() {
        fallback.to_string()
      } else {
        found.to_string()
      }
    })
  };

  (
    or_analysis(tags.category, &analysis.category, UNNAMED_CATEGORY),
    or_analysis(tags.color, &analysis.color, UNKNOWN_COLOR),
    tags.season.or(analysis.season()).unwrap_or(Season::All),
    tags.formality.or(analysis.formality()).unwrap_or(Formality::Casual),
    or_analysis(tags.description, &analysis.description, ""),
  )
}

/// Catalog a new item from a photo
pub async fn add_item(image: &Path, tags: ItemTags, analyze: bool) -> Result<()> {
  let photo = load_image(image)?;
  let mut store = open_store()?;

  let analysis = if analyze {
    let config = load_config()?;
    valet::info!("Analyzing photo...");
    let analysis = stylist(&config)?.analyze_item(&photo).await;
    if analysis.is_empty() {
      valet::warn!("Automatic tagging unavailable, using defaults for missing fields");
    }
    analysis
  } else {
    ItemAnalysis::default()
  };

  let (category, color, season, formality, description) = merge_tags(tags, &analysis);
  let record = ClothingRecord::new(photo.to_data_url(), category, color, season, formality, description);
  let title = record.title();
  let id = record.id.clone();

  store.add(record)?;
  println!("{} Added {} {}", "✓".green(), title.cyan(), id.dimmed());
  Ok(())
}

fn print_record(record: &ClothingRecord) {
  let worn = match record.days_since_worn(Utc::now()) {
    Some(0) => "worn today".to_string(),
    Some(days) => format!("last worn {days}d ago"),
    None => "never worn".to_string(),
  };

  println!(
    "  {} {}  {} · {} · {}×  {}",
    record.id.dimmed(),
    record.title().cyan(),
    record.season,
    record.formality,
    record.wear_count,
    worn.dimmed()
  );
  if !record.description.is_empty() {
    println!("      {}", record.description);
  }
}

/// List items, optionally narrowed by group and search text
pub fn list_items(group: CategoryGroup, query: Option<&str>) -> Result<()> {
  let store = open_store()?;
  let matches = filter_records(store.items(), group, query.unwrap_or(""));

  if matches.is_empty() {
    println!("No items found");
    return Ok(());
  }

  println!("{} ({} items)", group.label().bold(), matches.len());
  for record in matches {
    print_record(record);
  }
  Ok(())
}

pub fn remove_item(id: &str) -> Result<()> {
  let mut store = open_store()?;
  if store.remove(id)? {
    println!("{} Removed {}", "✓".green(), id.yellow());
  } else {
    valet::warn!(&format!("No item with id {id}"));
  }
  Ok(())
}

pub fn wear_items(ids: &[String]) -> Result<()> {
  let mut store = open_store()?;
  let updated = store.mark_worn(ids)?;

  if updated < ids.len() {
    valet::warn!(&format!("{} of {} ids did not match any item", ids.len() - updated, ids.len()));
  }
  println!("{} Marked {} item(s) as worn", "✓".green(), updated);
  Ok(())
}

pub fn show_stats() -> Result<()> {
  let stats = open_store()?.stats();

  println!("{}", "Wardrobe".bold());
  println!("  Items:        {}", stats.total);
  println!("  Worn:         {}", stats.worn);
  println!("  Utilization:  {}%", stats.utilization_percent);
  println!("  Newest:       {}", stats.newest.as_deref().unwrap_or("-"));
  Ok(())
}

pub fn show_profile() -> Result<()> {
  let store = open_store()?;
  let profile = store.profile();
  let or_dash = |v: &str| if v.is_empty() { "-".to_string() } else { v.to_string() };

  println!("{}", profile.name.bold());
  println!("  Gender: {}", profile.gender);
  println!("  Height: {}", or_dash(&profile.height));
  println!("  Weight: {}", or_dash(&profile.weight));
  println!("  Avatar: {}", if profile.avatar.is_some() { "set" } else { "-" });
  Ok(())
}

pub fn set_profile(fields: ProfileFields) -> Result<()> {
  let avatar = match (fields.avatar, fields.clear_avatar) {
    (Some(path), _) => Some(Some(load_image(&path)?.to_data_url())),
    (None, true) => Some(None),
    (None, false) => None,
  };

  let update = ProfileUpdate {
    name: fields.name,
    gender: fields.gender,
    height: fields.height,
    weight: fields.weight,
    avatar,
  };

  let mut store = open_store()?;
  store.update_profile(update)?;
  println!("{} Profile updated", "✓".green());
  Ok(())
}

fn print_weather(snapshot: &WeatherSnapshot) {
  println!(
    "{} {}°C {}",
    snapshot.city.bold(),
    snapshot.temperature.to_string().yellow(),
    snapshot.condition
  );
  println!("  {}", snapshot.description);
}

async fn current_weather(config: &WardrobeConfig, city: Option<&str>) -> Result<WeatherSnapshot> {
  let api = OpenMeteoClient::new()?;

  match city {
    Some(query) => {
      let found = weather::search_city(&api, query)
        .await
        .ok_or_else(|| anyhow!("No city matching '{query}'"))?;
      Ok(weather::weather_at(&api, found.coordinates, &found.name).await)
    }
    None => {
      let locator = ConfiguredLocation(config.location);
      Ok(weather::local_weather(&api, &locator, config.geolocation_timeout()).await)
    }
  }
}

pub async fn show_weather(city: Option<&str>) -> Result<()> {
  let config = load_config()?;
  let snapshot = current_weather(&config, city).await?;
  print_weather(&snapshot);
  Ok(())
}

/// Suggest today's outfit, optionally rendering it and recording it as worn
pub async fn suggest(options: SuggestOptions) -> Result<()> {
  let config = load_config()?;
  let mut store = open_store()?;

  if store.items().is_empty() {
    println!("Your wardrobe is empty. Add items with `wardrobe add <photo>` first.");
    return Ok(());
  }

  let snapshot = current_weather(&config, options.city.as_deref()).await?;
  print_weather(&snapshot);

  let stylist = stylist(&config)?;
  let suggestion =
    stylist.suggest_outfit(store.items(), &snapshot, options.occasion.as_deref(), store.profile()).await;
  let outfit = resolve_outfit(store.items(), &suggestion);

  valet::heading(&format!("Outfit for {}", options.occasion.as_deref().unwrap_or(DEFAULT_OCCASION)));
  for item in &outfit.items {
    println!("  {} {}", "•".green(), item.title().cyan());
  }
  println!("\n{}", outfit.reasoning);

  let worn_ids: Vec<String> = outfit.items.iter().map(|item| item.id.clone()).collect();

  if options.try_on && !outfit.items.is_empty() {
    let person = match &options.photo {
      Some(path) => Some(load_image(path)?),
      None => store.profile().avatar.as_deref().map(InlineImage::from_data_url),
    };

    valet::info!("Rendering outfit...");
    match stylist.try_on(person.as_ref(), &outfit.items, store.profile()).await {
      Some(render) => {
        render
          .save(&options.out)
          .with_context(|| format!("Failed to write {}", options.out.display()))?;
        println!("{} Saved render to {}", "✓".green(), options.out.display());
      }
      None => {
        valet::warn!("AI 生成图片服务暂时繁忙，请稍后再试。");
      }
    }
  } else if options.try_on {
    valet::warn!("没有有效的衣物可供试穿");
  }

  if options.wear && !worn_ids.is_empty() {
    let updated = store.mark_worn(&worn_ids)?;
    println!("{} Marked {} item(s) as worn", "✓".green(), updated);
  }

  Ok(())
}

fn print_advice(advice: &ShoppingAdvice) {
  let verdict = match advice.verdict {
    Verdict::Buy => "买".green().bold(),
    Verdict::Skip => "不买".red().bold(),
  };

  println!("{}  {}/100", verdict, advice.score);
  println!("  {}", advice.reasoning);
  if let Some(suggestions) = advice.suggestions.as_deref().filter(|s| !s.is_empty()) {
    println!("  {} {}", "建议:".yellow(), suggestions);
  }
}

pub async fn shop(image: &Path) -> Result<()> {
  let photo = load_image(image)?;
  let config = load_config()?;
  let store = open_store()?;

  let advice = stylist(&config)?.evaluate_purchase(&photo, store.items(), store.profile()).await;
  print_advice(&advice);
  Ok(())
}

pub async fn chat(message: &[String]) -> Result<()> {
  let message = message.join(" ");
  let config = load_config()?;
  let store = open_store()?;

  let reply = stylist(&config)?.chat(&message, &chat_context(store.items())).await;
  println!("{reply}");
  Ok(())
}

pub fn show_config() -> Result<()> {
  let config = load_config()?;
  let root = config::data_root()?;

  println!("{} {}", "Data root:".bold(), root.display());
  println!("{}", serde_json::to_string_pretty(&config.redacted())?);
  Ok(())
}
