use super::*;
use crate::cache::SatelliteCache;
use crate::routes::build_router;
use crate::test_support::{farm_located_field, unlocated_field, FakeFields, FakeProvider};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use std::time::Duration;
use tower::ServiceExt;

const ANALYZE: &str = "/api/soil-analysis/analyze-from-satellite";

fn app_with(provider: FakeProvider, fields: FakeFields, flags: FeatureFlags) -> Router {
    let service = SoilAnalysisService::new(
        Arc::new(fields),
        Arc::new(provider),
        SatelliteCache::with_limits(Duration::from_secs(900), 64),
        flags.satellite_cache,
    );
    build_router(AppState {
        soil_service: Arc::new(service),
        flags,
    })
}

fn app(provider: FakeProvider) -> Router {
    app_with(
        provider,
        FakeFields::with([farm_located_field("f-1"), unlocated_field("f-2")]),
        FeatureFlags::default(),
    )
}

async fn post(app: Router, body: &str) -> (StatusCode, Value) {
    send(app, "POST", ANALYZE, body).await
}

async fn send(app: Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn disabled_flag_returns_503_naming_the_flag() {
    let mut flags = FeatureFlags::default();
    flags.set(FeatureFlag::SoilAnalysisAutomation, false);
    let app = app_with(FakeProvider::default(), FakeFields::default(), flags);

    let (status, body) = post(app, "not even json").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["flag"], "NEXT_PUBLIC_FEATURE_SOIL_ANALYSIS_AUTOMATION");
    assert!(body["action"].is_string());
}

#[tokio::test]
async fn malformed_json_returns_400_with_details() {
    let (status, body) = post(app(FakeProvider::default()), "{fieldId:").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid JSON body");
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn missing_or_blank_field_id_returns_400() {
    for payload in [r#"{}"#, r#"{"fieldId": "   "}"#, r#"{"fieldId": 12}"#, "null"] {
        let (status, body) = post(app(FakeProvider::default()), payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "payload {payload}");
        assert_eq!(body["error"], "fieldId is required");
    }
}

#[tokio::test]
async fn unknown_field_returns_404() {
    let (status, body) = post(app(FakeProvider::default()), r#"{"fieldId": "nope"}"#).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Field not found");
}

#[tokio::test]
async fn field_without_location_returns_422() {
    let (status, body) = post(app(FakeProvider::default()), r#"{"fieldId": "f-2"}"#).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Field is missing valid coordinates");
}

#[tokio::test]
async fn database_failure_returns_500() {
    let fields = FakeFields {
        fail: true,
        ..Default::default()
    };
    let app = app_with(FakeProvider::default(), fields, FeatureFlags::default());

    let (status, body) = post(app, r#"{"fieldId": "f-1"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to load field");
}

#[tokio::test]
async fn ndvi_failure_returns_502() {
    let provider = FakeProvider {
        ndvi_fails: true,
        ..Default::default()
    };
    let (status, body) = post(app(provider), r#"{"fieldId": "f-1"}"#).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Unable to fetch EOSDA metrics");
}

#[tokio::test]
async fn oversized_window_returns_502_without_fetching() {
    let provider = Arc::new(FakeProvider::default());
    let service = SoilAnalysisService::new(
        Arc::new(FakeFields::with([farm_located_field("f-1")])),
        provider.clone(),
        SatelliteCache::with_limits(Duration::from_secs(900), 64),
        true,
    );
    let app = build_router(AppState {
        soil_service: Arc::new(service),
        flags: FeatureFlags::default(),
    });

    let (status, body) = post(app.clone(), r#"{"fieldId": "f-1", "ndviWindowDays": 100000000}"#).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Unable to fetch EOSDA metrics");
    assert_eq!(provider.ndvi_calls(), 0);

    let (status, _) = post(app, r#"{"fieldId": "f-1", "ndviWindowDays": 1e300}"#).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn secondary_failures_still_succeed() {
    let provider = FakeProvider {
        weather_fails: true,
        chlorophyll_fails: true,
        moisture_fails: true,
        ..Default::default()
    };
    let (status, body) = post(app(provider), r#"{"fieldId": "f-1", "language": "en"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["weather"].is_null());
    assert!(body["satellite"]["chlorophyll"]["value"].is_null());
    assert!(body["satellite"]["soilMoisture"]["value"].is_null());
    assert!(body["analysis"]["chlorophyll_index"].is_null());
    assert_eq!(body["satellite"]["ndviValue"], 0.62);
}

#[tokio::test]
async fn success_body_shape() {
    let (status, body) = post(
        app(FakeProvider::default()),
        r#"{"fieldId": " f-1 ", "language": "en", "ndviWindowDays": 14}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(body["field"]["id"], "f-1");
    assert_eq!(body["field"]["cropType"], "Wheat");
    assert_eq!(body["field"]["areaFeddan"], 12.5);
    assert_eq!(body["field"]["center"]["latitude"], 30.05);
    assert_eq!(body["satellite"]["capturedAt"], "2025-03-01");
    assert_eq!(body["satellite"]["imageUrl"], "https://tiles/ndvi.png");
    assert_eq!(body["satellite"]["soilMoisture"]["sourceRaw"], 0.423);
    assert_eq!(body["weather"]["averages"]["humidity"], 58.0);
    assert_eq!(body["analysis"]["source"], "satellite-derived");
    assert!(body["analysis"]["advisory"].is_null());
    assert!(body["analysis"]["recommendations"].is_array());
    assert_eq!(body["metadata"]["cacheHit"], false);
    assert_eq!(body["metadata"]["language"], "en");
    for key in ["generatedAt", "snapshotGeneratedAt"] {
        let stamp = body["metadata"][key].as_str().unwrap();
        assert_eq!(stamp.len(), "2025-03-01T06:00:00.000Z".len(), "{key}: {stamp}");
        assert!(stamp.ends_with('Z'));
    }
}

#[tokio::test]
async fn language_defaults_to_arabic() {
    let (status, body) = post(app(FakeProvider::default()), r#"{"fieldId": "f-1"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["language"], "ar");
}

#[tokio::test]
async fn repeated_request_is_served_from_cache() {
    let app = app(FakeProvider::default());

    let (_, first) = post(app.clone(), r#"{"fieldId": "f-1"}"#).await;
    let (_, second) = post(app.clone(), r#"{"fieldId": "f-1"}"#).await;
    let (_, other_window) = post(app, r#"{"fieldId": "f-1", "ndviWindowDays": 10}"#).await;

    assert_eq!(first["metadata"]["cacheHit"], false);
    assert_eq!(second["metadata"]["cacheHit"], true);
    assert_eq!(
        first["metadata"]["snapshotGeneratedAt"],
        second["metadata"]["snapshotGeneratedAt"]
    );
    assert_eq!(other_window["metadata"]["cacheHit"], false);
}

#[tokio::test]
async fn invalidated_snapshot_is_refetched() {
    let app = app(FakeProvider::default());
    let cache_uri = "/api/soil-analysis/satellite-cache";

    post(app.clone(), r#"{"fieldId": "f-1"}"#).await;
    let (status, evicted) = send(app.clone(), "DELETE", cache_uri, r#"{"fieldId": "f-1"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(evicted["key"], "f-1:30");
    assert_eq!(evicted["removed"], true);

    let (_, again) = post(app.clone(), r#"{"fieldId": "f-1"}"#).await;
    assert_eq!(again["metadata"]["cacheHit"], false);

    let (status, _) = send(app, "DELETE", cache_uri, "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn feature_flags_endpoint_lists_every_flag() {
    let mut flags = FeatureFlags::default();
    flags.set(FeatureFlag::SatelliteCache, false);
    let app = app_with(FakeProvider::default(), FakeFields::default(), flags);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/feature-flags")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["satelliteCache"], false);
    assert_eq!(body["soilAnalysisAutomation"], true);
}
