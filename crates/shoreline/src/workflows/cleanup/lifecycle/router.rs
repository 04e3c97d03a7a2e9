use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::repository::AnalysisRepository;
use super::service::{CleanupService, CleanupServiceError, ImageUpload};
use super::views::RecruitmentListView;
use crate::workflows::cleanup::blob::BlobStore;
use crate::workflows::cleanup::detection::DetectorError;
use crate::workflows::cleanup::domain::{AnalysisId, AnalysisStatus, EventDetails};

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

type SharedService<R, B> = Arc<CleanupService<R, B>>;

/// Router builder exposing analysis and recruitment endpoints.
pub fn cleanup_router<R, B>(service: SharedService<R, B>) -> Router
where
    R: AnalysisRepository + 'static,
    B: BlobStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/analysis/image",
            post(analyze_handler::<R, B>).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/v1/analysis/:analysis_id", get(analysis_handler::<R, B>))
        .route(
            "/api/v1/recruitment/from-analysis/:analysis_id",
            post(compose_handler::<R, B>),
        )
        .route("/api/v1/recruitment", get(list_handler::<R, B>))
        .route("/api/v1/recruitment/:analysis_id", get(recruitment_handler::<R, B>))
        .route(
            "/api/v1/recruitment/:analysis_id/publish",
            post(publish_handler::<R, B>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListParams {
    status: Option<String>,
}

pub(crate) async fn analyze_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    multipart: Multipart,
) -> Response
where
    R: AnalysisRepository + 'static,
    B: BlobStore + 'static,
{
    let (upload, location) = match read_upload(multipart).await {
        Ok(form) => form,
        Err(message) => return validation_response(&message),
    };

    let outcome = tokio::task::spawn_blocking(move || service.analyze(upload, location)).await;
    match outcome {
        Ok(Ok(record)) => (StatusCode::CREATED, axum::Json(record.summary_view())).into_response(),
        Ok(Err(err)) => service_error_response(err),
        Err(join) => task_failure_response(join),
    }
}

pub(crate) async fn analysis_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    Path(analysis_id): Path<String>,
) -> Response
where
    R: AnalysisRepository + 'static,
    B: BlobStore + 'static,
{
    let id = match parse_id(&analysis_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match service.get(id) {
        Ok(record) => (StatusCode::OK, axum::Json(record.detail_view())).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn compose_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    Path(analysis_id): Path<String>,
    payload: Result<axum::Json<EventDetails>, JsonRejection>,
) -> Response
where
    R: AnalysisRepository + 'static,
    B: BlobStore + 'static,
{
    let id = match parse_id(&analysis_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let event = match payload {
        Ok(axum::Json(event)) => event,
        Err(rejection) => return validation_response(&rejection.body_text()),
    };

    let outcome =
        tokio::task::spawn_blocking(move || service.generate_recruitment(id, event)).await;
    match outcome {
        Ok(Ok(draft)) => {
            let view = draft.record.draft_view(
                draft.text.value(),
                &draft.event,
                draft.text.is_degraded(),
            );
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Ok(Err(err)) => service_error_response(err),
        Err(join) => task_failure_response(join),
    }
}

pub(crate) async fn list_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    Query(params): Query<ListParams>,
) -> Response
where
    R: AnalysisRepository + 'static,
    B: BlobStore + 'static,
{
    let status = match params.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match AnalysisStatus::parse(raw) {
            Some(status) => Some(status),
            None => return validation_response(&format!("unknown status '{raw}'")),
        },
    };

    match service.recruitments(status) {
        Ok(records) => {
            let view = RecruitmentListView {
                recruitments: records.iter().filter_map(|record| record.list_item()).collect(),
            };
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn recruitment_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    Path(analysis_id): Path<String>,
) -> Response
where
    R: AnalysisRepository + 'static,
    B: BlobStore + 'static,
{
    let id = match parse_id(&analysis_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match service.recruitment(id) {
        Ok(record) => (StatusCode::OK, axum::Json(record.recruitment_view())).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn publish_handler<R, B>(
    State(service): State<SharedService<R, B>>,
    Path(analysis_id): Path<String>,
) -> Response
where
    R: AnalysisRepository + 'static,
    B: BlobStore + 'static,
{
    let id = match parse_id(&analysis_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match service.publish(id) {
        Ok(record) => (StatusCode::OK, axum::Json(record.recruitment_view())).into_response(),
        Err(err) => service_error_response(err),
    }
}

async fn read_upload(mut multipart: Multipart) -> Result<(ImageUpload, Option<String>), String> {
    let mut upload = None;
    let mut location = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| format!("malformed multipart body: {err}"))?
    {
        match field.name() {
            Some("image") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| format!("failed to read image: {err}"))?;
                upload = Some(ImageUpload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            Some("location") => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| format!("failed to read location: {err}"))?;
                location = Some(text);
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| "image file is required".to_string())?;
    Ok((upload, location))
}

fn parse_id(raw: &str) -> Result<AnalysisId, Response> {
    match raw.parse::<u64>() {
        Ok(id) if id > 0 => Ok(AnalysisId(id)),
        _ => Err(validation_response(&format!(
            "analysis id must be a positive integer, got '{raw}'"
        ))),
    }
}

fn validation_response(message: &str) -> Response {
    let payload = json!({
        "error": message,
    });
    (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
}

pub(crate) fn service_error_response(err: CleanupServiceError) -> Response {
    let status = match &err {
        CleanupServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        CleanupServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CleanupServiceError::InvalidTransition { .. } => StatusCode::CONFLICT,
        CleanupServiceError::Detector(DetectorError::InvalidImage(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        CleanupServiceError::Detector(DetectorError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        CleanupServiceError::Detector(_)
        | CleanupServiceError::Blob(_)
        | CleanupServiceError::Repository(_) => {
            error!(error = %err, "cleanup request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({
        "error": err.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

fn task_failure_response(join: tokio::task::JoinError) -> Response {
    error!(error = %join, "pipeline task failed");
    let payload = json!({
        "error": "analysis task failed",
    });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
}
