use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;
use shoreline::workflows::cleanup::{cleanup_router, AnalysisRepository, BlobStore, CleanupService};
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;

/// Cleanup API plus operational endpoints and the stored image directory.
pub(crate) fn with_service_routes<R, B>(
    service: Arc<CleanupService<R, B>>,
    upload_dir: &Path,
) -> axum::Router
where
    R: AnalysisRepository + 'static,
    B: BlobStore + 'static,
{
    cleanup_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .nest_service("/uploads", ServeDir::new(upload_dir))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
