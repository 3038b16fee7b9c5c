/// Unified error handling module
use crate::config::FeatureFlag;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Unified error response format
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<&'static str>,
}

impl ErrorResponse {
    fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            flag: None,
            action: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("feature {} is disabled", .0.env_key())]
    FeatureDisabled(FeatureFlag),
    #[error("invalid JSON body: {0}")]
    InvalidJson(String),
    #[error("fieldId is required")]
    MissingFieldId,
    #[error("field {0} not found")]
    FieldNotFound(String),
    #[error("field {0} is missing valid coordinates")]
    MissingCoordinates(String),
    #[error("upstream error: {0}")]
    Upstream(#[from] SnapshotError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::FeatureDisabled(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InvalidJson(_) | ApiError::MissingFieldId => StatusCode::BAD_REQUEST,
            ApiError::FieldNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MissingCoordinates(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::FeatureDisabled(flag) => ErrorResponse {
                error: "Soil analysis automation is currently disabled".to_string(),
                details: None,
                flag: Some(flag.env_key()),
                action: Some("Enable the feature flag in your environment to activate this endpoint."),
            },
            ApiError::InvalidJson(details) => ErrorResponse {
                details: Some(details.clone()),
                ..ErrorResponse::message("Invalid JSON body")
            },
            ApiError::MissingFieldId => ErrorResponse::message("fieldId is required"),
            ApiError::FieldNotFound(_) => ErrorResponse::message("Field not found"),
            ApiError::MissingCoordinates(_) => {
                ErrorResponse::message("Field is missing valid coordinates")
            }
            ApiError::Upstream(e) => {
                error!("Satellite snapshot failed: {}", e);
                ErrorResponse::message("Unable to fetch EOSDA metrics")
            }
            ApiError::Database(e) => {
                error!("Field lookup failed: {}", e);
                ErrorResponse::message("Failed to load field")
            }
            ApiError::Internal(msg) => {
                error!("Unexpected soil pipeline failure: {}", msg);
                ErrorResponse::message("Failed to run satellite soil pipeline")
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

/// Failures of the EOSDA provider client
#[derive(Debug, Error)]
pub enum EosdaError {
    #[error("EOSDA API key not configured")]
    NotConfigured,
    #[error("EOSDA rate limit exceeded for {0}")]
    RateLimited(&'static str),
    #[error("EOSDA API request failed: {status} {body}")]
    Status { status: u16, body: String },
    #[error("EOSDA transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("NDVI task failed: {0}")]
    TaskFailed(String),
    #[error("NDVI task timed out")]
    TaskTimedOut,
    #[error("{0}")]
    EmptyResult(&'static str),
}

impl EosdaError {
    /// Connection-level failures (DNS, refused) where synthetic data may stand in
    pub fn is_network(&self) -> bool {
        matches!(self, EosdaError::Transport(e) if e.is_connect())
    }
}

/// Failure of a whole snapshot load. Cloneable so coalesced waiters can share it.
#[derive(Debug, Clone, Error)]
pub enum SnapshotError {
    #[error("Unable to fetch NDVI data from EOSDA: {0}")]
    Ndvi(String),
}
