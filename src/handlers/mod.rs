/// HTTP request handlers
use crate::config::{FeatureFlag, FeatureFlags};
use crate::domain::{Health, SoilAnalysisReport, SoilAnalysisRequest};
use crate::errors::{ApiError, ApiResult};
use crate::services::SoilAnalysisService;
use axum::{body::Bytes, extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

#[cfg(test)]
mod tests;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub soil_service: Arc<SoilAnalysisService>,
    pub flags: FeatureFlags,
}

/// Successful response wrapper
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub ok: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { ok: true, data }
    }
}

/// Health check handler
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        now: Utc::now(),
    })
}

/// Current feature flag values
pub async fn feature_flags(State(state): State<AppState>) -> Json<SuccessResponse<FeatureFlags>> {
    Json(SuccessResponse::new(state.flags))
}

/// Run the satellite soil pipeline for one field.
///
/// The body is decoded by hand so malformed JSON gets the same error envelope as
/// every other failure.
pub async fn analyze_from_satellite(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<SoilAnalysisReport>> {
    if !state.flags.is_enabled(FeatureFlag::SoilAnalysisAutomation) {
        return Err(ApiError::FeatureDisabled(
            FeatureFlag::SoilAnalysisAutomation,
        ));
    }

    let request = parse_request(&body)?;
    info!(
        "Satellite soil analysis requested for field {} ({} day window)",
        request.field_id, request.ndvi_window_days
    );
    let report = state.soil_service.analyze(&request).await?;
    Ok(Json(report))
}

#[derive(Serialize)]
pub struct CacheEviction {
    pub key: String,
    pub removed: bool,
}

/// Drop the cached snapshot for a field and window so the next analysis refetches it
pub async fn invalidate_snapshot(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<SuccessResponse<CacheEviction>>> {
    let request = parse_request(&body)?;
    let key = request.cache_key();
    let removed = state.soil_service.cache().invalidate(&key);
    info!("Satellite cache entry {} invalidated (present: {})", key, removed);
    Ok(Json(SuccessResponse::new(CacheEviction { key, removed })))
}

fn parse_request(body: &[u8]) -> ApiResult<SoilAnalysisRequest> {
    let body: Value =
        serde_json::from_slice(body).map_err(|e| ApiError::InvalidJson(e.to_string()))?;
    SoilAnalysisRequest::from_body(&body).ok_or(ApiError::MissingFieldId)
}
