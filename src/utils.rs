/// Utility functions
use crate::domain::{FieldRecord, GeoPoint};
use serde_json::Value;

/// Extract number from JSON value
pub fn num(v: &Value) -> Option<f64> {
    if let Some(x) = v.as_f64() {
        return Some(x);
    }
    if let Some(s) = v.as_str() {
        return s.parse::<f64>().ok();
    }
    None
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Clamp into `[min, max]`; NaN collapses to `min`
pub fn clamp_number(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return min;
    }
    value.max(min).min(max)
}

/// Resolve a single point for a field.
///
/// Tried in order: explicit latitude/longitude, centroid `[lng, lat]`, parent farm
/// coordinates, then the mean of the first boundary ring.
pub fn resolve_field_coordinates(field: &FieldRecord) -> Option<GeoPoint> {
    if let (Some(latitude), Some(longitude)) = (field.latitude, field.longitude) {
        return Some(GeoPoint {
            latitude,
            longitude,
        });
    }

    if let Some(point) = field.centroid.as_ref().and_then(centroid_point) {
        return Some(point);
    }

    if let Some(farm) = &field.farm {
        if let (Some(latitude), Some(longitude)) = (farm.latitude, farm.longitude) {
            return Some(GeoPoint {
                latitude,
                longitude,
            });
        }
    }

    field.boundary_coordinates.as_ref().and_then(ring_centroid)
}

fn centroid_point(centroid: &Value) -> Option<GeoPoint> {
    let coords = centroid.get("coordinates")?.as_array()?;
    if coords.len() < 2 {
        return None;
    }
    Some(GeoPoint {
        longitude: coords[0].as_f64()?,
        latitude: coords[1].as_f64()?,
    })
}

/// Arithmetic mean of the first polygon ring. Malformed points add nothing but
/// still count towards the divisor.
fn ring_centroid(boundary: &Value) -> Option<GeoPoint> {
    let ring = boundary.get("coordinates")?.get(0)?.as_array()?;
    if ring.is_empty() {
        return None;
    }

    let (lng_sum, lat_sum) = ring
        .iter()
        .filter_map(|point| {
            let pair = point.as_array()?;
            if pair.len() < 2 {
                return None;
            }
            Some((pair[0].as_f64()?, pair[1].as_f64()?))
        })
        .fold((0.0, 0.0), |(lng, lat), (x, y)| (lng + x, lat + y));

    let n = ring.len() as f64;
    Some(GeoPoint {
        latitude: lat_sum / n,
        longitude: lng_sum / n,
    })
}
