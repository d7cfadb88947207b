use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{config::Config, error::ApiResult, main_lib::AppState};
use ratesnap_core::snapshot::SnapshotOutcome;

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn readyz() -> &'static str {
    "ok"
}

async fn home() -> impl IntoResponse {
    Json(json!({ "message": "Hello from the ratesnap backend!" }))
}

async fn data() -> impl IntoResponse {
    Json(json!({ "message": "This is a response from the backend!" }))
}

/// Run the snapshot job once. No request body is consumed; the response
/// names the outcome so callers can tell a stored snapshot from a
/// recorded upstream failure.
async fn run_snapshot(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let outcome = state.snapshots.run().await?;

    Ok(match outcome {
        SnapshotOutcome::Uploaded {
            object_name,
            base_code,
        } => (
            StatusCode::OK,
            Json(json!({
                "status": "uploaded",
                "object": object_name,
                "baseCode": base_code,
            })),
        ),
        SnapshotOutcome::UpstreamErrorRecorded {
            object_name,
            error_type,
        } => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "status": "upstream_error",
                "errorType": error_type,
                "recorded": true,
                "object": object_name,
            })),
        ),
        SnapshotOutcome::UpstreamErrorSkipped { error_type } => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "status": "upstream_error",
                "errorType": error_type,
                "recorded": false,
            })),
        ),
    })
}

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    let cors = if config.cors_allow.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = config
            .cors_allow
            .iter()
            .map(|o| o.parse().unwrap())
            .collect::<Vec<_>>();
        CorsLayer::new().allow_origin(origins)
    };

    let api = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/snapshots/run", post(run_snapshot));

    Router::new()
        .route("/", get(home))
        .route("/api/data", get(data))
        .nest("/api/v1", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.request_timeout))
        .with_state(state)
}
