/// Business logic services layer
use crate::analysis::{
    build_monitoring_checklist, build_satellite_recommendations, build_satellite_summary,
    calculate_confidence, derive_nutrient_estimates, normalize_soil_moisture, summarise_weather,
    CropProfile, Readings,
};
use crate::cache::{CacheLookup, SatelliteCache};
use crate::clients::{SatelliteProvider, SceneWindow};
use crate::domain::{
    AnalysisMetadata, ChlorophyllReading, DerivedAnalysis, FieldRecord, FieldSummary, GeoPoint,
    Language, SatelliteReadings, SatelliteSnapshot, SoilAnalysisReport, SoilAnalysisRequest,
    SoilMoistureReading,
};
use crate::errors::{ApiError, ApiResult, SnapshotError};
use crate::repo::FieldRepository;
use crate::utils::{resolve_field_coordinates, round_to};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Hours of weather history requested alongside each snapshot
pub const WEATHER_HOURS: u32 = 48;

const MS_PER_DAY: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

/// Fetch all four signals concurrently.
///
/// NDVI is mandatory; weather, chlorophyll and soil moisture degrade to empty values
/// when their requests fail.
pub async fn load_satellite_snapshot(
    provider: &dyn SatelliteProvider,
    window: SceneWindow,
) -> Result<SatelliteSnapshot, SnapshotError> {
    let (ndvi, weather, chlorophyll, soil_moisture) = tokio::join!(
        provider.fetch_ndvi(&window),
        provider.fetch_weather_snapshots(window.center, WEATHER_HOURS),
        provider.fetch_chlorophyll(&window),
        provider.fetch_soil_moisture(&window),
    );

    let ndvi = ndvi.map_err(|e| {
        error!("NDVI fetch failed: {}", e);
        SnapshotError::Ndvi(e.to_string())
    })?;

    let weather_snapshots = weather.unwrap_or_else(|e| {
        warn!("Weather fetch failed: {}", e);
        Vec::new()
    });
    let chlorophyll_sample = chlorophyll
        .map_err(|e| warn!("Chlorophyll fetch failed: {}", e))
        .ok();
    let soil_moisture_sample = soil_moisture
        .map_err(|e| warn!("Soil moisture fetch failed: {}", e))
        .ok();

    Ok(SatelliteSnapshot {
        ndvi_payload: Some(ndvi),
        weather_snapshots,
        chlorophyll_sample,
        soil_moisture_sample,
        generated_at: Utc::now(),
    })
}

/// Satellite-driven soil analysis pipeline
pub struct SoilAnalysisService {
    fields: Arc<dyn FieldRepository>,
    provider: Arc<dyn SatelliteProvider>,
    cache: SatelliteCache,
    use_cache: bool,
}

impl SoilAnalysisService {
    pub fn new(
        fields: Arc<dyn FieldRepository>,
        provider: Arc<dyn SatelliteProvider>,
        cache: SatelliteCache,
        use_cache: bool,
    ) -> Self {
        Self {
            fields,
            provider,
            cache,
            use_cache,
        }
    }

    pub fn cache(&self) -> &SatelliteCache {
        &self.cache
    }

    /// Run the pipeline for one field
    pub async fn analyze(&self, request: &SoilAnalysisRequest) -> ApiResult<SoilAnalysisReport> {
        let field = self
            .fields
            .find_field(&request.field_id)
            .await?
            .ok_or_else(|| ApiError::FieldNotFound(request.field_id.clone()))?;

        let center = resolve_field_coordinates(&field)
            .ok_or_else(|| ApiError::MissingCoordinates(request.field_id.clone()))?;

        let end = Utc::now();
        let start = window_start(end, request.ndvi_window_days).ok_or_else(|| {
            warn!(
                "NDVI window of {} days reaches past the supported date range",
                request.ndvi_window_days
            );
            SnapshotError::Ndvi(format!(
                "NDVI window of {} days is out of range",
                request.ndvi_window_days
            ))
        })?;
        let window = SceneWindow { center, start, end };

        let lookup = self.snapshot(&request.cache_key(), window).await?;
        debug!(
            "Snapshot for {} (cache hit: {})",
            request.cache_key(),
            lookup.cache_hit
        );

        let report = build_report(
            &request.field_id,
            &field,
            center,
            &lookup.snapshot,
            lookup.cache_hit,
            request.language,
        );
        info!(
            "Soil analysis for field {} done (confidence {})",
            request.field_id, report.analysis.confidence
        );
        Ok(report)
    }

    async fn snapshot(&self, key: &str, window: SceneWindow) -> Result<CacheLookup, SnapshotError> {
        let provider = Arc::clone(&self.provider);
        let loader = move || async move { load_satellite_snapshot(provider.as_ref(), window).await };

        if self.use_cache {
            return self.cache.get_or_load(key, loader).await;
        }

        let snapshot = loader().await?;
        Ok(CacheLookup {
            snapshot: Arc::new(snapshot),
            cache_hit: false,
        })
    }
}

/// Start of a window of `days` ending at `end`, or `None` past the representable dates
pub fn window_start(end: DateTime<Utc>, days: f64) -> Option<DateTime<Utc>> {
    let millis = days * MS_PER_DAY;
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(millis as i64).and_then(|span| end.checked_sub_signed(span))
}

/// Assemble the response body from a field and its snapshot
pub fn build_report(
    field_id: &str,
    field: &FieldRecord,
    center: GeoPoint,
    snapshot: &SatelliteSnapshot,
    cache_hit: bool,
    language: Language,
) -> SoilAnalysisReport {
    let ndvi_payload = snapshot.ndvi_payload.as_ref();
    let ndvi_value = ndvi_payload.map(|p| p.ndvi_value);
    let ndvi_mean = ndvi_payload
        .and_then(|p| p.statistics.as_ref())
        .and_then(|s| s.mean);

    let chlorophyll_sample = snapshot.chlorophyll_sample.as_ref();
    let moisture_sample = snapshot.soil_moisture_sample.as_ref();

    let chlorophyll = chlorophyll_sample
        .and_then(|s| s.value)
        .map(|v| round_to(v, 2));
    let moisture_raw = moisture_sample.and_then(|s| s.value).map(|v| round_to(v, 3));
    let moisture_percent = moisture_raw.map(normalize_soil_moisture);

    let weather = summarise_weather(&snapshot.weather_snapshots);
    let crop_label = field.crop_type.as_deref();
    let crop = CropProfile::classify(crop_label);

    // summary, nutrients and confidence accept the mean when no point value exists
    let blended = Readings {
        ndvi: ndvi_value.or(ndvi_mean),
        chlorophyll,
        moisture_percent,
    };
    let direct = Readings {
        ndvi: ndvi_value,
        ..blended
    };

    let nutrients = derive_nutrient_estimates(blended, crop);

    let analysis = DerivedAnalysis {
        ph_level: nutrients.ph,
        nitrogen_ppm: nutrients.nitrogen,
        phosphorus_ppm: nutrients.phosphorus,
        potassium_ppm: nutrients.potassium,
        organic_matter_percent: nutrients.organic_matter,
        moisture_percent: nutrients.moisture_percent,
        chlorophyll_index: chlorophyll,
        summary: build_satellite_summary(language, blended, crop_label),
        recommendations: build_satellite_recommendations(language, direct, weather.as_ref()),
        monitoring: build_monitoring_checklist(language, direct),
        advisory: None,
        confidence: calculate_confidence(blended, weather.as_ref()),
        source: "satellite-derived",
    };

    let satellite = SatelliteReadings {
        ndvi_value,
        ndvi_mean,
        chlorophyll: ChlorophyllReading {
            value: chlorophyll,
            captured_at: chlorophyll_sample.and_then(|s| s.date.clone()),
            map_url: chlorophyll_sample.and_then(|s| s.map_url.clone()),
        },
        soil_moisture: SoilMoistureReading {
            value: moisture_percent,
            captured_at: moisture_sample.and_then(|s| s.date.clone()),
            source_raw: moisture_raw,
        },
        captured_at: ndvi_payload.map(|p| p.date.clone()).unwrap_or_else(|| {
            snapshot
                .generated_at
                .to_rfc3339_opts(SecondsFormat::Millis, true)
        }),
        image_url: ndvi_payload.map(|p| p.url.clone()),
        statistics: ndvi_payload.and_then(|p| p.statistics.clone()),
    };

    SoilAnalysisReport {
        field: FieldSummary {
            id: field_id.to_string(),
            name: field.name.clone(),
            crop_type: field.crop_type.clone(),
            soil_type: field.soil_type.clone(),
            area_feddan: field.area,
            center,
        },
        satellite,
        weather,
        analysis,
        metadata: AnalysisMetadata {
            generated_at: Utc::now(),
            snapshot_generated_at: snapshot.generated_at,
            cache_hit,
            language,
        },
    }
}
