//! Styling requests against the generation API
//!
//! Each requester builds a prompt from wardrobe state, sends it through a
//! [`GenerationBackend`] under a [`RetryPolicy`], and turns whatever comes
//! back into a domain value. None of them fail: unparseable replies and
//! exhausted retries map to fixed fallback values.

use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::WardrobeConfig;
use crate::genai::{GenerationBackend, GenerationError, GenerationOutput, Part};
use crate::image::InlineImage;
use crate::models::{
  ClothingRecord, Gender, ItemAnalysis, OutfitSuggestion, ShoppingAdvice, UserProfile, WeatherSnapshot,
};
use crate::parse::{extract_json, parse_reply};
use crate::retry::RetryPolicy;

pub const DEFAULT_OCCASION: &str = "日常通勤";

const SUGGEST_UNPARSEABLE: &str = "服务繁忙，请稍后重试。";
const SUGGEST_UNAVAILABLE: &str = "AI 服务暂时不可用。";
const SUGGEST_NOTHING_FITS: &str = "抱歉，库存中没有找到符合当前天气和场合的完整搭配。";
const ADVICE_UNPARSEABLE: &str = "分析失败";
const ADVICE_UNAVAILABLE: &str = "服务繁忙。";
const CHAT_NO_ANSWER: &str = "我暂时无法回答这个问题。";
const CHAT_UNAVAILABLE: &str = "网络繁忙。";

/// Clothing images sent with one try-on request
pub const MAX_TRY_ON_GARMENTS: usize = 3;

const ANALYZE_PROMPT: &str = r#"你是一名时尚单品录入员。只看图片中的主体衣物，忽略背景。
根据版型（收腰、肩宽、扣子方向等）判断男款、女款或中性，并写进描述。

只返回如下 JSON（中文）：
{
  "category": "单一最准确的品类名词，见下方列表",
  "color": "具体颜色，如 藏青、米白、军绿",
  "season": "春 | 夏 | 秋 | 冬 | 四季通用",
  "formality": "休闲 | 商务休闲 | 正式商务 | 隆重礼服 | 运动户外",
  "description": "版型、材质与性别风格，如 收腰女款、廓形男款"
}

品类参考：
- 上装: T恤, 衬衫, 卫衣, 毛衣, 针织衫, 西装外套, 夹克, 大衣, 羽绒服, 马甲, 吊带
- 下装: 牛仔裤, 休闲裤, 西装裤, 运动裤, 短裤, 半身裙
- 全身: 连衣裙, 连体裤
- 鞋履: 运动鞋, 皮鞋, 靴子, 凉鞋, 休闲鞋"#;

/// Items resolved from a suggestion, in inventory order
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOutfit<'a> {
  pub items: Vec<&'a ClothingRecord>,
  pub reasoning: String,
}

pub struct Stylist {
  backend: Box<dyn GenerationBackend>,
  text_model: String,
  image_model: String,
  text_policy: RetryPolicy,
  try_on_policy: RetryPolicy,
  flat_lay_policy: RetryPolicy,
}

impl Stylist {
  pub fn new(backend: Box<dyn GenerationBackend>, text_model: &str, image_model: &str) -> Self {
    Self {
      backend,
      text_model: text_model.to_string(),
      image_model: image_model.to_string(),
      text_policy: RetryPolicy::rate_limited(),
      try_on_policy: RetryPolicy::exponential(2, Duration::from_millis(2000)),
      flat_lay_policy: RetryPolicy::exponential(2, Duration::from_millis(1000)),
    }
  }

  pub fn from_config(backend: Box<dyn GenerationBackend>, config: &WardrobeConfig) -> Self {
    Self::new(backend, &config.text_model, &config.image_model)
  }

  async fn request(
    &self,
    policy: &RetryPolicy,
    model: &str,
    parts: Vec<Part>,
    expect_json: bool,
  ) -> Result<GenerationOutput, GenerationError> {
    policy
      .run(
        || {
          let parts = parts.clone();
          let backend = &self.backend;
          async move { backend.generate(model, parts, expect_json).await }
        },
        GenerationError::is_rate_limited,
      )
      .await
  }

  /// Propose tags for a photographed item. Any failure yields an empty
  /// analysis; callers fill in manual defaults.
  pub async fn analyze_item(&self, image: &InlineImage) -> ItemAnalysis {
    let parts = vec![Part::Image(image.clone()), Part::text(ANALYZE_PROMPT)];

    let text = match self.request(&self.text_policy, &self.text_model, parts, true).await {
      Ok(GenerationOutput { text: Some(text), .. }) => text,
      Ok(_) => {
        warn!("item analysis returned no text");
        return ItemAnalysis::default();
      }
      Err(e) => {
        warn!(error = %e, "item analysis failed");
        return ItemAnalysis::default();
      }
    };

    let value = match extract_json(&text) {
      Some(serde_json::Value::Array(values)) => values.into_iter().next(),
      other => other,
    };

    value
      .and_then(|v| serde_json::from_value(v).ok())
      .unwrap_or_default()
  }

  /// Pick one outfit from `inventory` for the weather and occasion
  pub async fn suggest_outfit(
    &self,
    inventory: &[ClothingRecord],
    weather: &WeatherSnapshot,
    occasion: Option<&str>,
    profile: &UserProfile,
  ) -> OutfitSuggestion {
    let occasion = occasion.filter(|o| !o.trim().is_empty()).unwrap_or(DEFAULT_OCCASION);
    let prompt = suggestion_prompt(inventory, weather, occasion, profile);

    match self.request(&self.text_policy, &self.text_model, vec![Part::text(prompt)], true).await {
      Ok(output) => output
        .text
        .as_deref()
        .and_then(parse_reply::<OutfitSuggestion>)
        .unwrap_or_else(|| OutfitSuggestion { selected_item_ids: Vec::new(), reasoning: SUGGEST_UNPARSEABLE.to_string() }),
      Err(e) => {
        warn!(error = %e, "outfit suggestion failed");
        OutfitSuggestion { selected_item_ids: Vec::new(), reasoning: SUGGEST_UNAVAILABLE.to_string() }
      }
    }
  }

  /// Judge whether a candidate purchase earns its place in the wardrobe
  pub async fn evaluate_purchase(
    &self,
    image: &InlineImage,
    inventory: &[ClothingRecord],
    profile: &UserProfile,
  ) -> ShoppingAdvice {
    let parts = vec![Part::Image(image.clone()), Part::text(purchase_prompt(inventory, profile))];

    match self.request(&self.text_policy, &self.text_model, parts, true).await {
      Ok(output) => output
        .text
        .as_deref()
        .and_then(parse_reply::<ShoppingAdvice>)
        .unwrap_or_else(|| ShoppingAdvice::declined(ADVICE_UNPARSEABLE)),
      Err(e) => {
        warn!(error = %e, "purchase evaluation failed");
        ShoppingAdvice::declined(ADVICE_UNAVAILABLE)
      }
    }
  }

  /// Free-form styling question with a short wardrobe summary as context
  pub async fn chat(&self, message: &str, context: &str) -> String {
    let prompt = format!("你是一个专业的形象顾问。背景信息: {context}。用户问题: {message}");
    let parts = vec![Part::text(prompt)];

    self
      .text_policy
      .run_or(
        || {
          let parts = parts.clone();
          let backend = &self.backend;
          let model = self.text_model.as_str();
          async move {
            backend.generate(model, parts, false).await.map(|output| {
              output.text.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| CHAT_NO_ANSWER.to_string())
            })
          }
        },
        GenerationError::is_rate_limited,
        CHAT_UNAVAILABLE.to_string(),
      )
      .await
  }

  /// Render the person (or a generated model) wearing up to three garments
  pub async fn visualize_outfit(
    &self,
    person: Option<&InlineImage>,
    garments: &[InlineImage],
    profile: &UserProfile,
  ) -> Option<InlineImage> {
    let body = body_description(profile);
    let mut parts: Vec<Part> = person.map(|p| Part::Image(p.clone())).into_iter().collect();
    parts.extend(garments.iter().take(MAX_TRY_ON_GARMENTS).map(|g| Part::Image(g.clone())));

    let prompt = if person.is_some() {
      format!(
        "TASK: HIGH-FIDELITY VIRTUAL TRY-ON.\n\
         INPUTS: IMAGE 1 is the reference person; the other images are clothes.\n\
         1. IDENTITY LOCK: keep the face and head from IMAGE 1 exactly as they are.\n\
         2. ACTION: dress the person in the provided clothes.\n\
         3. BODY: {body}.\n\
         4. STYLE: realistic photography, 8k resolution."
      )
    } else {
      format!(
        "TASK: FASHION CATALOG SHOOT.\n\
         1. GENERATE A MODEL: a realistic full-body {body}.\n\
         2. WEARING: the model must wear the clothing items in the images.\n\
         3. GENDER: the model's gender must match the description ({gender}).\n\
         4. VIEW: full body, standing pose.\n\
         5. BACKGROUND: clean, neutral studio.\n\
         NEGATIVE PROMPT: flat lay, clothes only, no human, headless, cartoon, ghost mannequin.",
        gender = profile.gender
      )
    };
    parts.push(Part::text(prompt));

    match self.request(&self.try_on_policy, &self.image_model, parts, false).await {
      Ok(output) => output.images.into_iter().next(),
      Err(e) => {
        warn!(error = %e, "try-on render failed");
        None
      }
    }
  }

  /// Flat-lay product shot of an outfit described in words
  pub async fn generate_outfit_image(&self, description: &str) -> Option<InlineImage> {
    let prompt =
      format!("Fashion Photography, Flat lay: {description}. Clean background, aesthetic lighting.");

    match self.request(&self.flat_lay_policy, &self.image_model, vec![Part::text(prompt)], false).await {
      Ok(output) => output.images.into_iter().next(),
      Err(e) => {
        warn!(error = %e, "flat-lay render failed");
        None
      }
    }
  }

  /// Try-on render, falling back to a flat-lay of the same items
  pub async fn try_on(
    &self,
    person: Option<&InlineImage>,
    outfit: &[&ClothingRecord],
    profile: &UserProfile,
  ) -> Option<InlineImage> {
    let garments: Vec<InlineImage> =
      outfit.iter().map(|item| InlineImage::from_data_url(&item.image_url)).collect();

    if let Some(image) = self.visualize_outfit(person, &garments, profile).await {
      return Some(image);
    }

    let description = outfit.iter().map(|item| item.title()).collect::<Vec<_>>().join(" + ");
    debug!(description = %description, "falling back to flat-lay render");
    self.generate_outfit_image(&description).await
  }
}

/// Records named by a suggestion, ignoring ids not in the inventory. With
/// nothing matched, an empty reasoning gets a stock explanation.
pub fn resolve_outfit<'a>(inventory: &'a [ClothingRecord], suggestion: &OutfitSuggestion) -> ResolvedOutfit<'a> {
  let items: Vec<&ClothingRecord> =
    inventory.iter().filter(|item| suggestion.selected_item_ids.contains(&item.id)).collect();

  let reasoning = if items.is_empty() && suggestion.reasoning.trim().is_empty() {
    SUGGEST_NOTHING_FITS.to_string()
  } else {
    suggestion.reasoning.clone()
  };

  ResolvedOutfit { items, reasoning }
}

/// Item count plus the first five categories
pub fn chat_context(inventory: &[ClothingRecord]) -> String {
  let categories: Vec<&str> = inventory.iter().take(5).map(|item| item.category.as_str()).collect();
  format!("用户有 {} 件衣服，包括: {} 等。", inventory.len(), categories.join(", "))
}

/// Model description for renders. Height and weight appear only when the
/// user supplied them.
pub fn body_description(profile: &UserProfile) -> String {
  let gender = match profile.gender {
    Gender::Female => "Female",
    Gender::Male => "Male",
    Gender::Unisex => "Androgynous",
  };

  let height = profile.height.trim();
  let weight = profile.weight.trim();
  let stats = if height.is_empty() && weight.is_empty() {
    "Average body type".to_string()
  } else {
    let height = if height.is_empty() { String::new() } else { format!("{height}cm") };
    let weight = if weight.is_empty() { String::new() } else { format!("{weight}kg") };
    format!("Body Stats: {height} {weight}").trim_end().to_string()
  };

  format!("{gender} model, {stats}")
}

fn suggestion_prompt(
  inventory: &[ClothingRecord],
  weather: &WeatherSnapshot,
  occasion: &str,
  profile: &UserProfile,
) -> String {
  let listing: Vec<_> = inventory
    .iter()
    .map(|item| {
      json!({
        "id": item.id,
        "desc": format!("{} {} ({}, {})", item.color, item.category, item.season, item.description),
        "tag": item.formality.label(),
      })
    })
    .collect();
  let listing = serde_json::Value::Array(listing);

  let style = match profile.gender {
    Gender::Male => "Male (Men's Style)",
    Gender::Female => "Female (Women's Style)",
    Gender::Unisex => "Unisex Style",
  };
  let stats = if !profile.height.trim().is_empty() && !profile.weight.trim().is_empty() {
    format!("Height: {}cm, Weight: {}kg", profile.height.trim(), profile.weight.trim())
  } else {
    "Body stats not provided (do not invent numbers).".to_string()
  };

  format!(
    r#"Role: professional fashion stylist.

Context:
- Weather: {city}, {temperature}°C ({condition}).
- Occasion: {occasion}.
- User profile: {style}. {stats}

Inventory (JSON):
{listing}

Task: choose the SINGLE BEST OUTFIT from the inventory.

Rules:
1. Match the user's gender. Female: feminine silhouettes and proportions. Male: masculine cuts, no skirts or dresses.
2. Never state height or weight the user did not give; say "based on your shape" instead.
3. At most three main colors.
4. Dress for the temperature.

Answer in Chinese as JSON:
{{
  "selectedItemIds": ["id1", "id2"],
  "reasoning": "Title: [stylish name]. \n\nLogic: why this fits the user's gender and the occasion."
}}"#,
    city = weather.city,
    temperature = weather.temperature,
    condition = weather.condition,
  )
}

fn purchase_prompt(inventory: &[ClothingRecord], profile: &UserProfile) -> String {
  let summary: Vec<String> = inventory.iter().map(|item| format!("[{}{}]", item.color, item.category)).collect();

  format!(
    r#"角色: 理性且毒舌的资产管理顾问。
背景: 用户想买图片里的这件衣服。
用户库存: {inventory}。
用户性别/风格: {gender}。

原则: 降本增效。
1. 查重: 库存里有极为相似的单品就坚决劝退。
2. 百搭: 不能和库存中至少 3 件单品搭配的，判为低效资产。
3. 审美: 是否经得起长期审美，避免廉价感和过时款。

返回 JSON (中文):
{{
  "verdict": "买" 或 "不买",
  "score": 0-100 的推荐指数,
  "reasoning": "犀利的点评理由",
  "suggestions": "若为不买，必须给出建设性建议，例如该买什么来配现有单品"
}}"#,
    inventory = summary.join(", "),
    gender = profile.gender,
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::genai::MockGenerationBackend;
  use crate::models::{Condition, Formality, Season, Verdict};
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;

  fn record(id: &str, category: &str, color: &str) -> ClothingRecord {
    ClothingRecord {
      id: id.to_string(),
      ..ClothingRecord::new(
        "data:image/png;base64,QUJD".to_string(),
        category.to_string(),
        color.to_string(),
        Season::All,
        Formality::Casual,
        String::new(),
      )
    }
  }

  fn weather() -> WeatherSnapshot {
    WeatherSnapshot { city: "上海".to_string(), temperature: 18, condition: Condition::Cloudy, description: String::new() }
  }

  fn stylist(backend: MockGenerationBackend) -> Stylist {
    Stylist::new(Box::new(backend), "text-model", "image-model")
  }

  fn replying(text: &'static str) -> MockGenerationBackend {
    let mut backend = MockGenerationBackend::new();
    backend.expect_generate().returning(move |_, _, _| Ok(GenerationOutput::from_text(text)));
    backend
  }

  fn failing(status: u16) -> MockGenerationBackend {
    let mut backend = MockGenerationBackend::new();
    backend.expect_generate().returning(move |_, _, _| Err(GenerationError::from_status(status, "")));
    backend
  }

  #[tokio::test]
  async fn test_analyze_takes_first_array_element() {
    let stylist = stylist(replying(
      r#"[{"category":"衬衫","color":"米白","season":"春","formality":"商务休闲","description":"修身"}]"#,
    ));
    let analysis = stylist.analyze_item(&InlineImage::new("image/png", "QUJD")).await;

    assert_eq!(analysis.category, "衬衫");
    assert_eq!(analysis.season(), Some(Season::Spring));
    assert_eq!(analysis.formality(), Some(Formality::SmartCasual));
  }

  #[tokio::test]
  async fn test_analyze_sends_image_before_prompt_as_json() {
    let mut backend = MockGenerationBackend::new();
    backend
      .expect_generate()
      .withf(|model, parts, expect_json| {
        model == "text-model" && *expect_json && matches!(parts.as_slice(), [Part::Image(_), Part::Text(_)])
      })
      .times(1)
      .returning(|_, _, _| Ok(GenerationOutput::from_text(r#"{"category":"T恤","color":"白"}"#)));

    let analysis = stylist(backend).analyze_item(&InlineImage::new("image/png", "QUJD")).await;
    assert_eq!(analysis.color, "白");
  }

  #[tokio::test]
  async fn test_analyze_failure_is_empty() {
    let analysis = stylist(failing(500)).analyze_item(&InlineImage::new("image/png", "QUJD")).await;
    assert!(analysis.is_empty());

    let analysis = stylist(replying("无法识别")).analyze_item(&InlineImage::new("image/png", "QUJD")).await;
    assert!(analysis.is_empty());
  }

  #[tokio::test]
  async fn test_suggest_parses_fenced_reply() {
    let stylist = stylist(replying(
      "```json\n{\"selectedItemIds\":[\"a\",\"zz\"],\"reasoning\":\"Title: 通勤\"}\n```",
    ));
    let inventory = vec![record("a", "衬衫", "白"), record("b", "牛仔裤", "蓝")];

    let suggestion = stylist.suggest_outfit(&inventory, &weather(), None, &UserProfile::default()).await;
    let outfit = resolve_outfit(&inventory, &suggestion);

    assert_eq!(outfit.items.len(), 1);
    assert_eq!(outfit.items[0].id, "a");
    assert_eq!(outfit.reasoning, "Title: 通勤");
  }

  #[tokio::test]
  async fn test_suggest_fallbacks() {
    let inventory = vec![record("a", "衬衫", "白")];
    let profile = UserProfile::default();

    let unparseable = stylist(replying("no json")).suggest_outfit(&inventory, &weather(), None, &profile).await;
    assert_eq!(unparseable.reasoning, SUGGEST_UNPARSEABLE);
    assert!(unparseable.selected_item_ids.is_empty());

    let failed = stylist(failing(500)).suggest_outfit(&inventory, &weather(), None, &profile).await;
    assert_eq!(failed.reasoning, SUGGEST_UNAVAILABLE);
  }

  #[tokio::test(start_paused = true)]
  async fn test_suggest_retries_rate_limit_then_succeeds() {
    let calls = Arc::new(AtomicU32::new(0));
    let seen = calls.clone();
    let mut backend = MockGenerationBackend::new();
    backend.expect_generate().times(3).returning(move |_, _, _| {
      if seen.fetch_add(1, Ordering::SeqCst) < 2 {
        Err(GenerationError::from_status(429, ""))
      } else {
        Ok(GenerationOutput::from_text(r#"{"selectedItemIds":["a"],"reasoning":"ok"}"#))
      }
    });

    let inventory = vec![record("a", "衬衫", "白")];
    let suggestion =
      stylist(backend).suggest_outfit(&inventory, &weather(), Some("约会"), &UserProfile::default()).await;

    assert_eq!(suggestion.selected_item_ids, vec!["a".to_string()]);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_prompt_mentions_occasion_and_weather() {
    let mut backend = MockGenerationBackend::new();
    backend
      .expect_generate()
      .withf(|_, parts, _| match parts.as_slice() {
        [Part::Text(prompt)] => prompt.contains("约会") && prompt.contains("上海, 18°C (多云)"),
        _ => false,
      })
      .returning(|_, _, _| Ok(GenerationOutput::from_text("{}")));

    stylist(backend).suggest_outfit(&[], &weather(), Some("约会"), &UserProfile::default()).await;
  }

  #[test]
  fn test_resolve_outfit_with_nothing_matched() {
    let inventory = vec![record("a", "衬衫", "白")];
    let suggestion = OutfitSuggestion { selected_item_ids: vec!["ghost".to_string()], reasoning: String::new() };
    let outfit = resolve_outfit(&inventory, &suggestion);

    assert!(outfit.items.is_empty());
    assert_eq!(outfit.reasoning, SUGGEST_NOTHING_FITS);
  }

  #[tokio::test]
  async fn test_evaluate_fallbacks() {
    let image = InlineImage::new("image/jpeg", "QUJD");
    let profile = UserProfile::default();

    let advice = stylist(replying(r#"{"verdict":"买","score":85,"reasoning":"百搭"}"#))
      .evaluate_purchase(&image, &[], &profile)
      .await;
    assert_eq!(advice.verdict, Verdict::Buy);
    assert_eq!(advice.score, 85);

    let advice = stylist(replying("随便")).evaluate_purchase(&image, &[], &profile).await;
    assert_eq!(advice, ShoppingAdvice::declined(ADVICE_UNPARSEABLE));

    let advice = stylist(failing(403)).evaluate_purchase(&image, &[], &profile).await;
    assert_eq!(advice, ShoppingAdvice::declined(ADVICE_UNAVAILABLE));
  }

  #[tokio::test]
  async fn test_null_fields_keep_the_rest_of_the_reply() {
    let image = InlineImage::new("image/jpeg", "QUJD");
    let inventory = vec![record("a", "衬衫", "白"), record("b", "牛仔裤", "蓝")];

    let analysis = stylist(replying(r#"{"category":"卫衣","color":"灰","description":null}"#))
      .analyze_item(&image)
      .await;
    assert_eq!(analysis.category, "卫衣");
    assert_eq!(analysis.description, "");

    let suggestion = stylist(replying(r#"{"selectedItemIds":["a","b"],"reasoning":null}"#))
      .suggest_outfit(&inventory, &weather(), None, &UserProfile::default())
      .await;
    assert_eq!(suggestion.selected_item_ids, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(suggestion.reasoning, "");
  }

  #[tokio::test]
  async fn test_fractional_score_is_rounded_and_clamped() {
    let image = InlineImage::new("image/jpeg", "QUJD");
    let profile = UserProfile::default();

    let advice = stylist(replying(r#"{"verdict":"买","score":82.5,"reasoning":"百搭"}"#))
      .evaluate_purchase(&image, &[], &profile)
      .await;
    assert_eq!(advice.verdict, Verdict::Buy);
    assert_eq!(advice.score, 83);
    assert_eq!(advice.reasoning, "百搭");

    let advice = stylist(replying(r#"{"verdict":"不买","score":140,"reasoning":null}"#))
      .evaluate_purchase(&image, &[], &profile)
      .await;
    assert_eq!(advice.score, 100);
    assert_eq!(advice.reasoning, "");
  }

  #[tokio::test(start_paused = true)]
  async fn test_chat_defaults() {
    assert_eq!(stylist(replying("多穿点")).chat("冷吗", "ctx").await, "多穿点");
    assert_eq!(stylist(replying("  ")).chat("冷吗", "ctx").await, CHAT_NO_ANSWER);
    assert_eq!(stylist(failing(429)).chat("冷吗", "ctx").await, CHAT_UNAVAILABLE);
    assert_eq!(stylist(failing(500)).chat("冷吗", "ctx").await, CHAT_UNAVAILABLE);
  }

  #[test]
  fn test_chat_context_lists_first_five_categories() {
    let inventory: Vec<_> = ["T恤", "衬衫", "卫衣", "毛衣", "夹克", "大衣"]
      .iter()
      .enumerate()
      .map(|(i, c)| record(&i.to_string(), c, "黑"))
      .collect();

    assert_eq!(chat_context(&inventory), "用户有 6 件衣服，包括: T恤, 衬衫, 卫衣, 毛衣, 夹克 等。");
  }

  #[test]
  fn test_body_description_never_invents_stats() {
    let mut profile = UserProfile::default();
    assert_eq!(body_description(&profile), "Female model, Average body type");

    profile.gender = Gender::Unisex;
    profile.height = "175".to_string();
    assert_eq!(body_description(&profile), "Androgynous model, Body Stats: 175cm");

    profile.gender = Gender::Male;
    profile.weight = "70".to_string();
    assert_eq!(body_description(&profile), "Male model, Body Stats: 175cm 70kg");
  }

  #[tokio::test]
  async fn test_visualize_caps_garments_and_uses_image_model() {
    let mut backend = MockGenerationBackend::new();
    backend
      .expect_generate()
      .withf(|model, parts, expect_json| {
        let images = parts.iter().filter(|p| matches!(p, Part::Image(_))).count();
        let identity_lock = matches!(parts.last(), Some(Part::Text(t)) if t.contains("IDENTITY LOCK"));
        model == "image-model" && !*expect_json && images == 1 + MAX_TRY_ON_GARMENTS && identity_lock
      })
      .returning(|_, _, _| {
        Ok(GenerationOutput { text: None, images: vec![InlineImage::new("image/png", "UE5H")] })
      });

    let person = InlineImage::new("image/jpeg", "ME==");
    let garments = vec![InlineImage::new("image/png", "QUJD"); 5];
    let render = stylist(backend).visualize_outfit(Some(&person), &garments, &UserProfile::default()).await;

    assert_eq!(render, Some(InlineImage::new("image/png", "UE5H")));
  }

  #[tokio::test(start_paused = true)]
  async fn test_try_on_falls_back_to_flat_lay() {
    let mut backend = MockGenerationBackend::new();
    backend
      .expect_generate()
      .withf(|_, parts, _| parts.iter().any(|p| matches!(p, Part::Image(_))))
      .times(2)
      .returning(|_, _, _| Err(GenerationError::from_status(429, "")));
    backend
      .expect_generate()
      .withf(|_, parts, _| match parts.as_slice() {
        [Part::Text(prompt)] => prompt.contains("Flat lay: 白 衬衫 + 蓝 牛仔裤"),
        _ => false,
      })
      .times(1)
      .returning(|_, _, _| Ok(GenerationOutput { text: None, images: vec![InlineImage::new("image/png", "RkxBVA==")] }));

    let inventory = vec![record("a", "衬衫", "白"), record("b", "牛仔裤", "蓝")];
    let outfit: Vec<&ClothingRecord> = inventory.iter().collect();
    let render = stylist(backend).try_on(None, &outfit, &UserProfile::default()).await;

    assert_eq!(render.map(|r| r.data), Some("RkxBVA==".to_string()));
  }
}
