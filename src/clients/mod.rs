/// External API clients module
pub mod rate_limiter;
pub mod synthetic;

use crate::config::EosdaConfig;
use crate::domain::{GeoPoint, IndexSample, NdviPayload, NdviStatistics, WeatherSnapshot};
use crate::errors::EosdaError;
use crate::utils::num;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rate_limiter::{EndpointClass, RateLimiter};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, warn};

const NDVI_POLL_ATTEMPTS: u32 = 10;
const TINY_POLYGON_DELTA: f64 = 0.01;

/// HTTP client wrapper with common configuration
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, EosdaError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("soil-automation-service/1.0")
            .build()?;
        Ok(Self { client })
    }

    pub fn get_client(&self) -> &Client {
        &self.client
    }
}

/// Point and date range a satellite query covers
#[derive(Debug, Clone, Copy)]
pub struct SceneWindow {
    pub center: GeoPoint,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Source of satellite and weather readings
#[async_trait]
pub trait SatelliteProvider: Send + Sync {
    async fn fetch_ndvi(&self, window: &SceneWindow) -> Result<NdviPayload, EosdaError>;

    async fn fetch_weather_snapshots(
        &self,
        center: GeoPoint,
        hours: u32,
    ) -> Result<Vec<WeatherSnapshot>, EosdaError>;

    async fn fetch_chlorophyll(&self, window: &SceneWindow) -> Result<IndexSample, EosdaError>;

    async fn fetch_soil_moisture(&self, window: &SceneWindow) -> Result<IndexSample, EosdaError>;
}

/// Index queried by slug, with alternates and synthetic tuning
struct IndexSpec {
    index: &'static str,
    aliases: &'static [&'static str],
    synthetic_offset: f64,
    synthetic_scale: f64,
}

const CHLOROPHYLL: IndexSpec = IndexSpec {
    index: "chlorophyll",
    aliases: &["chl", "chlorophyll_content"],
    synthetic_offset: 5.0,
    synthetic_scale: 1.0,
};

const SOIL_MOISTURE: IndexSpec = IndexSpec {
    index: "soil_moisture",
    aliases: &["msavi", "ndmi", "ndwi"],
    synthetic_offset: 11.0,
    synthetic_scale: 0.4,
};

/// EOS Data Analytics client
pub struct EosdaClient {
    http_client: HttpClient,
    config: EosdaConfig,
    limiter: RateLimiter,
    poll_interval: Duration,
}

impl EosdaClient {
    pub fn new(config: EosdaConfig) -> Result<Self, EosdaError> {
        Ok(Self {
            http_client: HttpClient::new(config.timeout)?,
            config,
            limiter: RateLimiter::new(),
            poll_interval: Duration::from_secs(1),
        })
    }

    /// Whether readings come from synthetic data rather than the API
    pub fn is_synthetic(&self) -> bool {
        !self.config.is_live()
    }

    /// Versioned URL, except for `api/...` paths which are served unversioned
    pub fn build_url(&self, path: &str) -> String {
        let base = self.config.api_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.starts_with("api/") {
            format!("{}/{}", base, path)
        } else {
            format!(
                "{}/{}/{}",
                base,
                self.config.api_version.trim_matches('/'),
                path
            )
        }
    }

    async fn request(
        &self,
        class: EndpointClass,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, EosdaError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(EosdaError::NotConfigured)?;

        if !self.limiter.check(class) {
            return Err(EosdaError::RateLimited(class.as_str()));
        }

        let url = self.build_url(path);
        debug!(
            "EOSDA {} {} ({} {} requests left this minute)",
            method,
            url,
            self.limiter.remaining(class),
            class.as_str()
        );
        let mut req = self
            .http_client
            .get_client()
            .request(method, &url)
            .header("Accept", "application/json")
            .header("X-Api-Key", api_key);

        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            error!("EOSDA request to {} failed [{}]: {}", url, status, snippet);
            return Err(EosdaError::Status {
                status: status.as_u16(),
                body: snippet,
            });
        }

        Ok(resp.json().await?)
    }

    async fn run_ndvi_task(&self, window: &SceneWindow) -> Result<NdviPayload, EosdaError> {
        let body = json!({
            "type": "mt_stats",
            "params": {
                "bm_type": ["NDVI"],
                "date_start": window.start.format("%Y-%m-%d").to_string(),
                "date_end": window.end.format("%Y-%m-%d").to_string(),
                "geometry": tiny_polygon_around(window.center),
                "sensors": ["sentinel2"],
                "limit": 10,
                "reference": format!("ndvi_task_{}", Utc::now().timestamp_millis()),
            }
        });

        let created = self
            .request(EndpointClass::Statistics, Method::POST, "/api/gdw/api", &[], Some(&body))
            .await?;
        let task_id = created
            .get("task_id")
            .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_i64().map(|n| n.to_string())))
            .ok_or_else(|| EosdaError::TaskFailed("NDVI task creation failed".to_string()))?;
        debug!("Created EOSDA NDVI task {}", task_id);

        for _ in 0..NDVI_POLL_ATTEMPTS {
            tokio::time::sleep(self.poll_interval).await;

            let result = self
                .request(
                    EndpointClass::Statistics,
                    Method::GET,
                    &format!("/api/gdw/api/{}", task_id),
                    &[],
                    None,
                )
                .await?;
            if let Some(payload) = parse_ndvi_task(&result)? {
                return Ok(payload);
            }
        }

        Err(EosdaError::TaskTimedOut)
    }

    async fn request_weather(
        &self,
        center: GeoPoint,
        hours: u32,
    ) -> Result<Vec<WeatherSnapshot>, EosdaError> {
        let resp = self
            .request(
                EndpointClass::Default,
                Method::GET,
                "/weather",
                &[
                    ("lat", center.latitude.to_string()),
                    ("lon", center.longitude.to_string()),
                    ("hours", hours.to_string()),
                ],
                None,
            )
            .await?;

        let snapshots = resp
            .get("data")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(parse_weather_entry).collect())
            .unwrap_or_default();
        Ok(snapshots)
    }

    /// Try `/statistics/{slug}` then `/indices/{slug}` for every alias, settling on
    /// synthetic data when all of them fail
    async fn fetch_index_sample(&self, window: &SceneWindow, spec: &IndexSpec) -> IndexSample {
        if !self.is_synthetic() {
            let payload = json!({
                "geometry": {
                    "type": "Point",
                    "coordinates": [window.center.longitude, window.center.latitude],
                },
                "datetime": format!("{}/{}", iso(window.start), iso(window.end)),
                "collections": ["sentinel-2-l2a"],
            });

            let slugs = std::iter::once(spec.index).chain(spec.aliases.iter().copied());
            for slug in slugs {
                for prefix in ["statistics", "indices"] {
                    let path = format!("/{}/{}", prefix, slug);
                    match self
                        .request(EndpointClass::Statistics, Method::POST, &path, &[], Some(&payload))
                        .await
                    {
                        Ok(resp) => return parse_index_sample(slug, &resp, window.start),
                        Err(e) => debug!("EOSDA index {} via {} failed: {}", slug, prefix, e),
                    }
                }
            }
            warn!("All EOSDA slugs failed for {}, using synthetic sample", spec.index);
        }

        synthetic::index_sample(
            spec.index,
            window.center,
            window.start,
            spec.synthetic_offset,
            spec.synthetic_scale,
        )
    }
}

#[async_trait]
impl SatelliteProvider for EosdaClient {
    async fn fetch_ndvi(&self, window: &SceneWindow) -> Result<NdviPayload, EosdaError> {
        if self.is_synthetic() {
            return Ok(synthetic::ndvi(window.center, window.end));
        }

        match self.run_ndvi_task(window).await {
            Ok(payload) => Ok(payload),
            Err(e) if e.is_network() => {
                warn!("EOSDA unreachable for NDVI, using synthetic data: {}", e);
                Ok(synthetic::ndvi(window.center, window.end))
            }
            Err(e) => {
                error!("EOSDA NDVI error at {:?}: {}", window.center, e);
                Err(e)
            }
        }
    }

    async fn fetch_weather_snapshots(
        &self,
        center: GeoPoint,
        hours: u32,
    ) -> Result<Vec<WeatherSnapshot>, EosdaError> {
        if self.is_synthetic() {
            return Ok(synthetic::weather_snapshots(center, hours, Utc::now()));
        }

        match self.request_weather(center, hours).await {
            Ok(snapshots) => Ok(snapshots),
            Err(e) if e.is_network() => {
                warn!("EOSDA unreachable for weather, using synthetic data: {}", e);
                Ok(synthetic::weather_snapshots(center, hours, Utc::now()))
            }
            Err(e) => {
                error!("EOSDA weather snapshots error: {}", e);
                Err(e)
            }
        }
    }

    async fn fetch_chlorophyll(&self, window: &SceneWindow) -> Result<IndexSample, EosdaError> {
        Ok(self.fetch_index_sample(window, &CHLOROPHYLL).await)
    }

    async fn fetch_soil_moisture(&self, window: &SceneWindow) -> Result<IndexSample, EosdaError> {
        Ok(self.fetch_index_sample(window, &SOIL_MOISTURE).await)
    }
}

fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Closed square ring around a point, `[lng, lat]` ordered
fn tiny_polygon_around(center: GeoPoint) -> Value {
    let (lat, lon, d) = (center.latitude, center.longitude, TINY_POLYGON_DELTA);
    json!({
        "type": "Polygon",
        "coordinates": [[
            [lon - d, lat - d],
            [lon + d, lat - d],
            [lon + d, lat + d],
            [lon - d, lat + d],
            [lon - d, lat - d],
        ]]
    })
}

fn parse_statistics(v: Option<&Value>) -> NdviStatistics {
    let field = |key: &str| v.and_then(|s| s.get(key)).and_then(num);
    NdviStatistics {
        mean: field("mean"),
        min: field("min"),
        max: field("max"),
    }
}

/// Interpret one poll of a GDW task: `Ok(None)` means keep polling
fn parse_ndvi_task(result: &Value) -> Result<Option<NdviPayload>, EosdaError> {
    let status = result.get("status").and_then(Value::as_str);
    let finished = status == Some("finished");

    if finished || result.get("result").is_some() {
        let entry = result.get("result").and_then(|r| r.get(0));
        let stats = entry
            .and_then(|e| e.get("indexes"))
            .and_then(|i| i.get("NDVI"));
        let average = stats.and_then(|s| s.get("average")).and_then(Value::as_f64);

        match average {
            Some(average) => {
                let date = entry
                    .and_then(|e| e.get("date"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                return Ok(Some(NdviPayload {
                    id: date.clone(),
                    url: String::new(),
                    ndvi_value: average,
                    statistics: Some(NdviStatistics {
                        mean: Some(average),
                        min: stats.and_then(|s| s.get("min")).and_then(Value::as_f64),
                        max: stats.and_then(|s| s.get("max")).and_then(Value::as_f64),
                    }),
                    date: date.unwrap_or_else(|| iso(Utc::now())),
                    source: None,
                }));
            }
            None if finished => {
                return Err(EosdaError::EmptyResult(
                    "NDVI analysis finished but returned no data",
                ))
            }
            None => {}
        }
    }

    let errors = result
        .get("errors")
        .and_then(Value::as_array)
        .filter(|errs| !errs.is_empty());
    if status == Some("error") || errors.is_some() {
        let detail = result.get("errors").cloned().unwrap_or(Value::Null);
        return Err(EosdaError::TaskFailed(detail.to_string()));
    }

    Ok(None)
}

fn parse_index_sample(slug: &str, resp: &Value, fallback_date: DateTime<Utc>) -> IndexSample {
    let data = resp.get("data");
    let raw_stats = data.and_then(|d| d.get("statistics"));
    let statistics = parse_statistics(raw_stats);
    let value = statistics
        .mean
        .or_else(|| raw_stats.and_then(|s| s.get("value")).and_then(num));
    let map_url = data
        .and_then(|d| {
            d.get("map_url")
                .or_else(|| d.get(format!("{}_map_url", slug).as_str()))
        })
        .and_then(Value::as_str)
        .map(str::to_string);
    let date = data
        .and_then(|d| d.get("datetime"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| iso(fallback_date));

    IndexSample {
        index: slug.to_string(),
        value,
        statistics,
        date: Some(date),
        map_url,
    }
}

fn parse_weather_entry(entry: &Value) -> WeatherSnapshot {
    let number = |key: &str| entry.get(key).and_then(num);
    WeatherSnapshot {
        captured_at: entry
            .get("datetime")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        temperature: number("temp"),
        humidity: number("humidity"),
        wind_speed: number("wind_speed"),
        precipitation: number("precipitation"),
        summary: entry
            .get("condition")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> SceneWindow {
        let end = Utc::now();
        SceneWindow {
            center: GeoPoint {
                latitude: 25.3,
                longitude: 32.55,
            },
            start: end - chrono::Duration::days(30),
            end,
        }
    }

    fn client(config: EosdaConfig) -> EosdaClient {
        EosdaClient::new(config).unwrap()
    }

    #[test]
    fn test_build_url_versions_non_api_paths() {
        let c = client(EosdaConfig {
            api_url: "https://api-connect.eos.com/".to_string(),
            ..Default::default()
        });
        assert_eq!(c.build_url("/weather"), "https://api-connect.eos.com/v1/weather");
        assert_eq!(
            c.build_url("/api/gdw/api/42"),
            "https://api-connect.eos.com/api/gdw/api/42"
        );
    }

    #[tokio::test]
    async fn unconfigured_client_serves_synthetic_data() {
        let c = client(EosdaConfig::default());
        assert!(c.is_synthetic());

        let w = window();
        let ndvi = c.fetch_ndvi(&w).await.unwrap();
        assert_eq!(ndvi.source.as_deref(), Some(synthetic::SYNTHETIC_SOURCE));
        assert_eq!(ndvi, c.fetch_ndvi(&w).await.unwrap());

        let moisture = c.fetch_soil_moisture(&w).await.unwrap();
        assert_eq!(moisture.index, "soil_moisture");
        assert!(moisture.value.unwrap() <= 0.4);

        let weather = c.fetch_weather_snapshots(w.center, 48).await.unwrap();
        assert!(!weather.is_empty());
    }

    #[test]
    fn test_parse_ndvi_task_finished() {
        let result = json!({
            "status": "finished",
            "result": [{"date": "2025-02-10", "indexes": {"NDVI": {"average": 0.62, "min": 0.3, "max": 0.8}}}]
        });
        let payload = parse_ndvi_task(&result).unwrap().unwrap();
        assert_eq!(payload.ndvi_value, 0.62);
        assert_eq!(payload.date, "2025-02-10");
        assert_eq!(payload.statistics.unwrap().max, Some(0.8));
    }

    #[test]
    fn test_parse_ndvi_task_pending_and_failures() {
        assert!(parse_ndvi_task(&json!({"status": "created"})).unwrap().is_none());
        assert!(matches!(
            parse_ndvi_task(&json!({"status": "finished", "result": []})),
            Err(EosdaError::EmptyResult(_))
        ));
        assert!(matches!(
            parse_ndvi_task(&json!({"status": "error", "errors": ["cloudy"]})),
            Err(EosdaError::TaskFailed(_))
        ));
    }

    #[test]
    fn test_parse_index_sample_prefers_mean() {
        let resp = json!({"data": {
            "statistics": {"mean": 0.52, "min": 0.1},
            "datetime": "2025-02-01T00:00:00Z",
            "chl_map_url": "https://tiles/chl.png"
        }});
        let sample = parse_index_sample("chl", &resp, Utc::now());
        assert_eq!(sample.value, Some(0.52));
        assert_eq!(sample.map_url.as_deref(), Some("https://tiles/chl.png"));
        assert_eq!(sample.date.as_deref(), Some("2025-02-01T00:00:00Z"));

        let fallback = parse_index_sample("ndmi", &json!({"data": {"statistics": {"value": 0.33}}}), Utc::now());
        assert_eq!(fallback.value, Some(0.33));
    }

    #[test]
    fn test_parse_weather_entry() {
        let snap = parse_weather_entry(&json!({
            "datetime": "2025-02-01T06:00:00Z",
            "temp": 21.5,
            "humidity": 64,
            "precipitation": 3.2,
            "condition": "Showers"
        }));
        assert_eq!(snap.temperature, Some(21.5));
        assert_eq!(snap.humidity, Some(64.0));
        assert_eq!(snap.precipitation, Some(3.2));
        assert_eq!(snap.summary.as_deref(), Some("Showers"));
    }
}
