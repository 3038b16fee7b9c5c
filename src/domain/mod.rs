/// Domain models for the application
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

pub const DEFAULT_NDVI_WINDOW_DAYS: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ar,
    En,
}

impl Language {
    /// Anything other than an explicit "en" falls back to Arabic
    pub fn from_value(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("en") => Language::En,
            _ => Language::Ar,
        }
    }

    /// Pick the localized variant of a message
    pub fn pick<'a>(self, ar: &'a str, en: &'a str) -> &'a str {
        match self {
            Language::Ar => ar,
            Language::En => en,
        }
    }
}

/// Validated body of an analyze-from-satellite request
#[derive(Debug, Clone, PartialEq)]
pub struct SoilAnalysisRequest {
    pub field_id: String,
    pub language: Language,
    pub ndvi_window_days: f64,
}

impl SoilAnalysisRequest {
    /// Extract request parameters from a decoded JSON body.
    ///
    /// Returns `None` when `fieldId` is missing, blank or not a string. The window
    /// must be a finite number greater than 3 days, otherwise the default applies.
    pub fn from_body(body: &Value) -> Option<Self> {
        let field_id = body
            .get("fieldId")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())?
            .to_string();

        let ndvi_window_days = body
            .get("ndviWindowDays")
            .and_then(Value::as_f64)
            .filter(|days| days.is_finite() && *days > 3.0)
            .unwrap_or(DEFAULT_NDVI_WINDOW_DAYS);

        Some(Self {
            field_id,
            language: Language::from_value(body.get("language")),
            ndvi_window_days,
        })
    }

    /// Cache key shared by every request for the same field and window
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.field_id, format_days(self.ndvi_window_days))
    }
}

fn format_days(days: f64) -> String {
    if days.fract() == 0.0 && days.abs() < 1e15 {
        format!("{}", days as i64)
    } else {
        format!("{}", days)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Parent farm of a field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FarmRecord {
    pub id: String,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Row of the `fields` table joined to its farm
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldRecord {
    pub id: String,
    pub name: Option<String>,
    pub area: Option<f64>,
    pub crop_type: Option<String>,
    pub soil_type: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub centroid: Option<Value>,
    pub boundary_coordinates: Option<Value>,
    pub farm: Option<FarmRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NdviStatistics {
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// NDVI reading for a point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NdviPayload {
    pub id: Option<String>,
    pub url: String,
    pub ndvi_value: f64,
    pub statistics: Option<NdviStatistics>,
    pub date: String,
    pub source: Option<String>,
}

/// Single vegetation/soil index reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSample {
    pub index: String,
    pub value: Option<f64>,
    pub statistics: NdviStatistics,
    pub date: Option<String>,
    pub map_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    pub captured_at: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub precipitation: Option<f64>,
    pub summary: Option<String>,
}

/// Bundle of upstream readings for one field and window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SatelliteSnapshot {
    pub ndvi_payload: Option<NdviPayload>,
    pub weather_snapshots: Vec<WeatherSnapshot>,
    pub chlorophyll_sample: Option<IndexSample>,
    pub soil_moisture_sample: Option<IndexSample>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherAverages {
    pub humidity: Option<f64>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSummary {
    pub latest: WeatherSnapshot,
    pub averages: WeatherAverages,
}

/// Heuristic soil chemistry estimates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NutrientEstimates {
    pub ph: f64,
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub organic_matter: f64,
    pub moisture_percent: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSummary {
    pub id: String,
    pub name: Option<String>,
    pub crop_type: Option<String>,
    pub soil_type: Option<String>,
    pub area_feddan: Option<f64>,
    pub center: GeoPoint,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChlorophyllReading {
    pub value: Option<f64>,
    pub captured_at: Option<String>,
    pub map_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SoilMoistureReading {
    pub value: Option<f64>,
    pub captured_at: Option<String>,
    pub source_raw: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SatelliteReadings {
    pub ndvi_value: Option<f64>,
    pub ndvi_mean: Option<f64>,
    pub chlorophyll: ChlorophyllReading,
    pub soil_moisture: SoilMoistureReading,
    pub captured_at: String,
    pub image_url: Option<String>,
    pub statistics: Option<NdviStatistics>,
}

#[derive(Debug, Serialize)]
pub struct DerivedAnalysis {
    pub ph_level: f64,
    pub nitrogen_ppm: f64,
    pub phosphorus_ppm: f64,
    pub potassium_ppm: f64,
    pub organic_matter_percent: f64,
    pub moisture_percent: f64,
    pub chlorophyll_index: Option<f64>,
    pub summary: String,
    pub recommendations: Vec<String>,
    pub monitoring: Vec<String>,
    pub advisory: Option<String>,
    pub confidence: f64,
    pub source: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    #[serde(serialize_with = "millis_timestamp")]
    pub generated_at: DateTime<Utc>,
    #[serde(serialize_with = "millis_timestamp")]
    pub snapshot_generated_at: DateTime<Utc>,
    pub cache_hit: bool,
    pub language: Language,
}

/// RFC 3339 with millisecond precision and a `Z` suffix
fn millis_timestamp<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Full analyze-from-satellite response
#[derive(Debug, Serialize)]
pub struct SoilAnalysisReport {
    pub field: FieldSummary,
    pub satellite: SatelliteReadings,
    pub weather: Option<WeatherSummary>,
    pub analysis: DerivedAnalysis,
    pub metadata: AnalysisMetadata,
}

/// Health check response
#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub now: DateTime<Utc>,
}
