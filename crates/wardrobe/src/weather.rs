//! Weather lookup
//!
//! Position → city label → current conditions → advisory, with a fallback at
//! every stage. Callers always get a [`WeatherSnapshot`]; network problems are
//! logged and replaced by defaults.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::models::{Condition, WeatherSnapshot};
use crate::retry::RetryPolicy;
use crate::{Result, WardrobeError};

pub const BEIJING: Coordinates = Coordinates { latitude: 39.9042, longitude: 116.4074 };
pub const BEIJING_LABEL: &str = "北京";
/// Label used when a position cannot be named
pub const UNNAMED_PLACE_LABEL: &str = "当前位置";

const FORECAST_FAILED_MESSAGE: &str = "获取天气失败，已显示默认数据。";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub latitude: f64,
  pub longitude: f64,
}

impl Coordinates {
  pub const fn new(latitude: f64, longitude: f64) -> Self {
    Self { latitude, longitude }
  }
}

/// Raw current conditions as reported by the forecast service
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentConditions {
  pub temperature: f64,
  /// WMO weather interpretation code
  pub weather_code: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CityMatch {
  pub name: String,
  pub coordinates: Coordinates,
  /// First-level administrative area, else country, else empty
  pub admin: String,
}

/// Snapshot shown when nothing could be fetched at all
pub fn default_snapshot() -> WeatherSnapshot {
  WeatherSnapshot {
    city: BEIJING_LABEL.to_string(),
    temperature: 20,
    condition: Condition::Clear,
    description: "暂无法获取实时天气，请检查网络连接。".to_string(),
  }
}

/// Forecast and geocoding backends
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WeatherApi: Send + Sync {
  async fn current_conditions(&self, at: Coordinates) -> Result<CurrentConditions>;

  /// Human-readable place name for a position, if the service knows one
  async fn reverse_geocode(&self, at: Coordinates) -> Result<Option<String>>;

  async fn search_city(&self, query: &str) -> Result<Option<CityMatch>>;
}

/// Source of the device position
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Geolocator: Send + Sync {
  async fn locate(&self) -> Result<Coordinates>;
}

/// Position taken from configuration; `None` behaves like a denied request
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfiguredLocation(pub Option<Coordinates>);

#[async_trait]
impl Geolocator for ConfiguredLocation {
  async fn locate(&self) -> Result<Coordinates> {
    self.0.ok_or_else(|| WardrobeError::Config("no device location configured".to_string()))
  }
}

/// Map a WMO weather code onto the six display conditions
pub fn condition_for_code(code: u16) -> Condition {
  match code {
    0 => Condition::Clear,
    1..=3 => Condition::Cloudy,
    45 | 48 => Condition::Overcast,
    51..=67 | 80..=82 => Condition::Rain,
    71..=77 | 85..=86 => Condition::Snow,
    95..=99 => Condition::Rain,
    _ => Condition::Cloudy,
  }
}

/// Dressing advice for the unrounded temperature and condition
pub fn advisory(temperature: f64, condition: Condition, code: u16) -> String {
  let text = if code >= 95 {
    "有雷暴天气，请注意安全，尽量待在室内。"
  } else if condition == Condition::Rain {
    "出门记得带伞，建议穿防水鞋履。"
  } else if condition == Condition::Snow {
    "路面湿滑，建议穿着防滑保暖的靴子。"
  } else if temperature <= 5.0 {
    "寒潮来袭，请务必穿着厚羽绒或大衣保暖。"
  } else if temperature <= 12.0 {
    "天气较冷，建议“洋葱式”穿衣，搭配毛衣外套。"
  } else if temperature <= 20.0 {
    "体感舒适，早晚可能有温差，备一件薄外套。"
  } else if temperature <= 28.0 {
    "温暖舒适，适合衬衫、T恤等轻薄衣物。"
  } else {
    "天气炎热，建议穿着透气排汗的棉麻衣物。"
  };
  text.to_string()
}

pub fn snapshot_from(conditions: CurrentConditions, city: &str) -> WeatherSnapshot {
  let condition = condition_for_code(conditions.weather_code);
  WeatherSnapshot {
    city: city.to_string(),
    temperature: conditions.temperature.round() as i32,
    condition,
    description: advisory(conditions.temperature, condition, conditions.weather_code),
  }
}

/// Strip the 市/区 administrative suffixes from a place name
pub fn clean_city_label(label: &str) -> String {
  label.replace(['市', '区'], "")
}

/// Conditions at a known position. A failed fetch yields the default
/// snapshot relabelled with `city`.
pub async fn weather_at(api: &dyn WeatherApi, at: Coordinates, city: &str) -> WeatherSnapshot {
  match api.current_conditions(at).await {
    Ok(conditions) => snapshot_from(conditions, city),
    Err(e) => {
      warn!(error = %e, city, "forecast fetch failed, using fallback");
      let city = if city.is_empty() { BEIJING_LABEL } else { city };
      WeatherSnapshot {
        city: city.to_string(),
        description: FORECAST_FAILED_MESSAGE.to_string(),
        ..default_snapshot()
      }
    }
  }
}

/// Conditions where the device is, or in Beijing when the position is
/// unavailable within `wait`.
pub async fn local_weather(
  api: &dyn WeatherApi,
  locator: &dyn Geolocator,
  wait: Duration,
) -> WeatherSnapshot {
  let position = match timeout(wait, locator.locate()).await {
    Ok(Ok(position)) => position,
    Ok(Err(e)) => {
      warn!(error = %e, "geolocation failed, falling back to Beijing");
      return weather_at(api, BEIJING, BEIJING_LABEL).await;
    }
    Err(_) => {
      warn!(wait_ms = wait.as_millis() as u64, "geolocation timed out, falling back to Beijing");
      return weather_at(api, BEIJING, BEIJING_LABEL).await;
    }
  };

  let city = match api.reverse_geocode(position).await {
    Ok(Some(name)) => clean_city_label(&name),
    Ok(None) => UNNAMED_PLACE_LABEL.to_string(),
    Err(e) => {
      warn!(error = %e, "reverse geocoding failed, continuing unnamed");
      UNNAMED_PLACE_LABEL.to_string()
    }
  };
  debug!(city = %city, "resolved device position");

  weather_at(api, position, &city).await
}

/// First geocoding match for a city name; lookup failures read as no match
pub async fn search_city(api: &dyn WeatherApi, query: &str) -> Option<CityMatch> {
  match api.search_city(query).await {
    Ok(found) => found,
    Err(e) => {
      warn!(error = %e, query, "city search failed");
      None
    }
  }
}

#[derive(Debug, Clone)]
pub struct OpenMeteoConfig {
  pub forecast_url: String,
  pub geocoding_url: String,
  pub reverse_geocoding_url: String,
  pub timeout: Duration,
}

impl Default for OpenMeteoConfig {
  fn default() -> Self {
    Self {
      forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
      geocoding_url: "https://geocoding-api.open-meteo.com/v1/search".to_string(),
      reverse_geocoding_url: "https://nominatim.openstreetmap.org/reverse".to_string(),
      timeout: Duration::from_secs(10),
    }
  }
}

/// Open-Meteo forecast and geocoding plus Nominatim reverse lookups
pub struct OpenMeteoClient {
  client: Client,
  config: OpenMeteoConfig,
  retry: RetryPolicy,
}

#[derive(Deserialize)]
struct ForecastResponse {
  current_weather: Option<CurrentWeather>,
}

#[derive(Deserialize)]
struct CurrentWeather {
  temperature: f64,
  weathercode: u16,
}

#[derive(Deserialize)]
struct GeocodingResponse {
  #[serde(default)]
  results: Vec<GeocodingResult>,
}

#[derive(Deserialize)]
struct GeocodingResult {
  name: String,
  latitude: f64,
  longitude: f64,
  admin1: Option<String>,
  country: Option<String>,
}

#[derive(Deserialize)]
struct ReverseResponse {
  address: Option<ReverseAddress>,
}

#[derive(Deserialize)]
struct ReverseAddress {
  city: Option<String>,
  district: Option<String>,
  town: Option<String>,
}

impl OpenMeteoClient {
  pub fn new() -> Result<Self> {
    Self::with_config(OpenMeteoConfig::default())
  }

  pub fn with_config(config: OpenMeteoConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .user_agent(concat!("wardrobe/", env!("CARGO_PKG_VERSION")))
      .build()?;

    Ok(Self { client, config, retry: RetryPolicy::network() })
  }

  async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
    self
      .retry
      .run(
        || {
          let request = self.client.get(url).query(query);
          async move {
            let response = request.send().await?.error_for_status()?;
            Ok::<T, WardrobeError>(response.json::<T>().await?)
          }
        },
        |_: &WardrobeError| true,
      )
      .await
  }
}

#[async_trait]
impl WeatherApi for OpenMeteoClient {
  async fn current_conditions(&self, at: Coordinates) -> Result<CurrentConditions> {
    let query = [
      ("latitude", at.latitude.to_string()),
      ("longitude", at.longitude.to_string()),
      ("current_weather", "true".to_string()),
      ("timezone", "auto".to_string()),
    ];
    let response: ForecastResponse = self.get_json(&self.config.forecast_url, &query).await?;
    let current = response
      .current_weather
      .ok_or_else(|| WardrobeError::Response("forecast missing current_weather".to_string()))?;

    Ok(CurrentConditions { temperature: current.temperature, weather_code: current.weathercode })
  }

  async fn reverse_geocode(&self, at: Coordinates) -> Result<Option<String>> {
    let query = [
      ("format", "json".to_string()),
      ("lat", at.latitude.to_string()),
      ("lon", at.longitude.to_string()),
      ("zoom", "10".to_string()),
      ("accept-language", "zh-CN".to_string()),
    ];
    let response: ReverseResponse =
      self.get_json(&self.config.reverse_geocoding_url, &query).await?;

    Ok(response.address.and_then(|address| address.city.or(address.district).or(address.town)))
  }

  async fn search_city(&self, query: &str) -> Result<Option<CityMatch>> {
    let params = [
      ("name", query.to_string()),
      ("count", "1".to_string()),
      ("language", "zh".to_string()),
      ("format", "json".to_string()),
    ];
    let response: GeocodingResponse = self.get_json(&self.config.geocoding_url, &params).await?;

    Ok(response.results.into_iter().next().map(|result| CityMatch {
      name: result.name,
      coordinates: Coordinates::new(result.latitude, result.longitude),
      admin: result.admin1.or(result.country).unwrap_or_default(),
    }))
  }
}
