//! In-memory stand-ins for the provider and repository seams.

use crate::clients::{SatelliteProvider, SceneWindow};
use crate::domain::{
    FarmRecord, FieldRecord, GeoPoint, IndexSample, NdviPayload, NdviStatistics, WeatherSnapshot,
};
use crate::errors::EosdaError;
use crate::repo::FieldRepository;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn upstream_down() -> EosdaError {
    EosdaError::Status {
        status: 503,
        body: "unavailable".to_string(),
    }
}

#[derive(Default)]
pub struct FakeProvider {
    pub ndvi_fails: bool,
    pub weather_fails: bool,
    pub chlorophyll_fails: bool,
    pub moisture_fails: bool,
    pub delay: Duration,
    pub ndvi_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn ndvi_calls(&self) -> usize {
        self.ndvi_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl SatelliteProvider for FakeProvider {
    async fn fetch_ndvi(&self, _window: &SceneWindow) -> Result<NdviPayload, EosdaError> {
        self.ndvi_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.ndvi_fails {
            return Err(upstream_down());
        }
        Ok(NdviPayload {
            id: Some("2025-03-01".to_string()),
            url: "https://tiles/ndvi.png".to_string(),
            ndvi_value: 0.62,
            statistics: Some(NdviStatistics {
                mean: Some(0.6),
                min: Some(0.31),
                max: Some(0.82),
            }),
            date: "2025-03-01".to_string(),
            source: None,
        })
    }

    async fn fetch_weather_snapshots(
        &self,
        _center: GeoPoint,
        _hours: u32,
    ) -> Result<Vec<WeatherSnapshot>, EosdaError> {
        self.pause().await;
        if self.weather_fails {
            return Err(upstream_down());
        }
        Ok(vec![WeatherSnapshot {
            captured_at: "2025-03-01T06:00:00Z".to_string(),
            temperature: Some(24.0),
            humidity: Some(58.0),
            wind_speed: Some(3.1),
            precipitation: None,
            summary: Some("Mild conditions".to_string()),
        }])
    }

    async fn fetch_chlorophyll(&self, _window: &SceneWindow) -> Result<IndexSample, EosdaError> {
        self.pause().await;
        if self.chlorophyll_fails {
            return Err(upstream_down());
        }
        Ok(sample("chlorophyll", 0.514))
    }

    async fn fetch_soil_moisture(&self, _window: &SceneWindow) -> Result<IndexSample, EosdaError> {
        self.pause().await;
        if self.moisture_fails {
            return Err(upstream_down());
        }
        Ok(sample("soil_moisture", 0.4231))
    }
}

fn sample(index: &str, value: f64) -> IndexSample {
    IndexSample {
        index: index.to_string(),
        value: Some(value),
        statistics: NdviStatistics {
            mean: Some(value),
            min: None,
            max: None,
        },
        date: Some("2025-03-01".to_string()),
        map_url: None,
    }
}

#[derive(Default)]
pub struct FakeFields {
    pub fields: HashMap<String, FieldRecord>,
    pub fail: bool,
}

impl FakeFields {
    pub fn with(fields: impl IntoIterator<Item = FieldRecord>) -> Self {
        Self {
            fields: fields.into_iter().map(|f| (f.id.clone(), f)).collect(),
            fail: false,
        }
    }
}

#[async_trait]
impl FieldRepository for FakeFields {
    async fn find_field(&self, field_id: &str) -> Result<Option<FieldRecord>, sqlx::Error> {
        if self.fail {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(self.fields.get(field_id).cloned())
    }
}

/// Wheat field located through its parent farm
pub fn farm_located_field(id: &str) -> FieldRecord {
    FieldRecord {
        id: id.to_string(),
        name: Some("North plot".to_string()),
        area: Some(12.5),
        crop_type: Some("Wheat".to_string()),
        soil_type: Some("clay".to_string()),
        farm: Some(FarmRecord {
            id: "farm-1".to_string(),
            name: Some("Delta farm".to_string()),
            latitude: Some(30.05),
            longitude: Some(31.25),
        }),
        ..Default::default()
    }
}

/// Field with no usable location at all
pub fn unlocated_field(id: &str) -> FieldRecord {
    FieldRecord {
        id: id.to_string(),
        centroid: Some(json!({"type": "Point", "coordinates": []})),
        boundary_coordinates: Some(json!({"type": "Polygon", "coordinates": []})),
        ..Default::default()
    }
}
