//! Deterministic stand-in readings used when EOSDA is not configured or unreachable.
//!
//! Values are seeded from the coordinates so the same field always sees the same
//! numbers.

use crate::domain::{GeoPoint, IndexSample, NdviPayload, NdviStatistics, WeatherSnapshot};
use crate::utils::{clamp_number, round_to};
use chrono::{DateTime, Duration, SecondsFormat, Utc};

pub const SYNTHETIC_IMAGE_URL: &str = "/tile.png";
pub const SYNTHETIC_SOURCE: &str = "synthetic";

/// Pseudo-random value in `[0, 1)` derived from a point and an offset
pub fn seeded_random(latitude: f64, longitude: f64, offset: f64) -> f64 {
    let seed = (latitude * 12.9898 + longitude * 78.233 + offset * 37.719).sin() * 43758.5453;
    seed - seed.floor()
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn ndvi(center: GeoPoint, end: DateTime<Utc>) -> NdviPayload {
    let base = 0.35 + seeded_random(center.latitude, center.longitude, 0.0) * 0.4;
    let mean = round_to(clamp_number(base, 0.1, 0.9), 3);
    let min = round_to(clamp_number(mean - 0.18, 0.05, 0.95), 3);
    let max = round_to(clamp_number(mean + 0.18, 0.1, 0.98), 3);
    let date = timestamp(end);

    NdviPayload {
        id: Some(format!("synthetic-ndvi-{}", date)),
        url: SYNTHETIC_IMAGE_URL.to_string(),
        ndvi_value: mean,
        statistics: Some(NdviStatistics {
            mean: Some(mean),
            min: Some(min),
            max: Some(max),
        }),
        date,
        source: Some(SYNTHETIC_SOURCE.to_string()),
    }
}

pub fn index_sample(
    index: &str,
    center: GeoPoint,
    captured: DateTime<Utc>,
    offset: f64,
    scale: f64,
) -> IndexSample {
    let raw = seeded_random(center.latitude, center.longitude, offset);
    let value = round_to(clamp_number(raw * scale, 0.0, 1.0), 2);

    IndexSample {
        index: index.to_string(),
        value: Some(value),
        statistics: NdviStatistics {
            mean: Some(value),
            min: None,
            max: None,
        },
        date: Some(timestamp(captured)),
        map_url: Some(SYNTHETIC_IMAGE_URL.to_string()),
    }
}

/// One reading every three hours covering the last `hours` (clamped to 6..=72)
pub fn weather_snapshots(center: GeoPoint, hours: u32, now: DateTime<Utc>) -> Vec<WeatherSnapshot> {
    let total = hours.clamp(6, 72);

    (0..=total)
        .rev()
        .step_by(3)
        .map(|h| {
            let seed = seeded_random(center.latitude, center.longitude, h as f64);
            let temperature = round_to(18.0 + seed * 12.0, 1);
            let humidity = clamp_number(40.0 + seed * 50.0, 25.0, 95.0).round();
            let precipitation = round_to(clamp_number(seed * 5.0 - 1.0, 0.0, 6.0), 1);
            let summary = if humidity > 80.0 {
                "Rain likely"
            } else if temperature > 28.0 {
                "Hot and dry"
            } else if temperature < 15.0 {
                "Cool and calm"
            } else {
                "Mild conditions"
            };

            WeatherSnapshot {
                captured_at: timestamp(now - Duration::hours(h as i64)),
                temperature: Some(temperature),
                humidity: Some(humidity),
                wind_speed: Some(round_to(2.0 + seed * 4.0, 1)),
                precipitation: (precipitation > 0.5).then_some(precipitation),
                summary: Some(summary.to_string()),
            }
        })
        .collect()
}
