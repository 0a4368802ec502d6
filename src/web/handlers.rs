//! JSON API handlers: probe, start, poll, cancel, health and metrics.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::core::error::{AppError, AppResult};
use crate::core::metrics;
use crate::core::validation::validate_media_url;
use crate::download::format::DownloadOptions;
use crate::download::metadata::MediaInfo;
use crate::tasks::TaskSnapshot;
use crate::web::SharedState;

/// Body of `POST /api/info`
#[derive(Debug, Deserialize)]
pub struct InfoRequest {
    #[serde(default)]
    pub url: String,
}

/// Body of `POST /api/download`
#[derive(Debug, Deserialize)]
pub struct DownloadRequestBody {
    #[serde(default)]
    pub url: String,
    #[serde(flatten)]
    pub options: DownloadOptions,
}

/// Unwraps a JSON body, turning extractor rejections into a 400 with our error shape.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// Validates, probes and registers a task. Live streams are refused.
pub(crate) async fn start_task(state: &SharedState, url: &str, options: DownloadOptions) -> AppResult<TaskSnapshot> {
    let media = validate_media_url(url)?;
    let source = state.runner.sources().resolve_or_err(&media)?;
    let info = source.probe(&media).await?;
    if info.is_live {
        return Err(AppError::Validation("Live streams cannot be downloaded".to_string()));
    }

    state.runner.start(media, options, Some(info.title)).await
}

fn task_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Task {} not found", id))
}

/// POST /api/info
pub async fn info_handler(
    State(state): State<SharedState>,
    payload: Result<Json<InfoRequest>, JsonRejection>,
) -> AppResult<Json<MediaInfo>> {
    let body = json_body(payload)?;
    let media = validate_media_url(&body.url)?;
    let source = state.runner.sources().resolve_or_err(&media)?;
    log::debug!("Probing {} via {}", media.url, source.name());

    Ok(Json(source.probe(&media).await?))
}

/// POST /api/download
pub async fn start_download_handler(
    State(state): State<SharedState>,
    payload: Result<Json<DownloadRequestBody>, JsonRejection>,
) -> AppResult<Response> {
    let body = json_body(payload)?;
    let snapshot = start_task(&state, &body.url, body.options).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "task_id": snapshot.id, "status": snapshot.status })),
    )
        .into_response())
}

/// GET /api/tasks/{id}
pub async fn task_handler(State(state): State<SharedState>, Path(id): Path<String>) -> AppResult<Json<TaskSnapshot>> {
    state.registry().get(&id).map(Json).ok_or_else(|| task_not_found(&id))
}

/// DELETE /api/tasks/{id}
pub async fn cancel_handler(State(state): State<SharedState>, Path(id): Path<String>) -> AppResult<StatusCode> {
    if state.registry().cancel(&id).await {
        log::info!("Task {} cancelled by client", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(task_not_found(&id))
    }
}

/// GET /health
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "active_tasks": state.registry().len(),
    }))
}

/// GET /metrics
pub async fn metrics_handler() -> AppResult<Response> {
    let (content_type, body) = metrics::gather_text().map_err(anyhow::Error::from)?;
    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}
