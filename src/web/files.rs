//! Serving finished files.
//!
//! A file is handed out once. The reservation (`ServedFile`) travels inside the
//! body stream, so when the body is finished or the client goes away the work
//! dir is deleted and the task evicted.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;

use crate::core::error::{AppError, AppResult};
use crate::core::metrics;
use crate::core::utils::{content_disposition, format_bytes, mime_for_path};
use crate::download::format::DownloadOptions;
use crate::tasks::{ServeRejection, ServedFile, TaskStatus};
use crate::web::events::snapshot_stream;
use crate::web::handlers::start_task;
use crate::web::SharedState;

impl IntoResponse for ServeRejection {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ServeRejection::NotFound => (StatusCode::NOT_FOUND, json!({ "error": "Task not found" })),
            ServeRejection::NotReady(status) => (
                StatusCode::CONFLICT,
                json!({ "error": "File is not ready yet", "status": status }),
            ),
            ServeRejection::Failed(message) => (
                StatusCode::CONFLICT,
                json!({ "error": message, "status": TaskStatus::Error }),
            ),
            ServeRejection::AlreadyServed => (
                StatusCode::CONFLICT,
                json!({ "error": "File has already been fetched", "status": TaskStatus::Done }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// Streams a reserved file as an attachment.
pub async fn serve_file(served: ServedFile) -> AppResult<Response> {
    let file = tokio::fs::File::open(&served.path).await?;
    let length = match served.file_size {
        Some(size) => size,
        None => file.metadata().await?.len(),
    };
    let content_type = mime_for_path(&served.path).to_string();
    let disposition = content_disposition(&served.display_name);
    log::info!("Serving {} ({})", served.display_name, format_bytes(length));

    // The closure owns the reservation; dropping the body drops it
    let body = ReaderStream::new(file).map(move |chunk| {
        let _reserved = &served;
        if let Ok(bytes) = &chunk {
            metrics::BYTES_SERVED_TOTAL.inc_by(bytes.len() as f64);
        }
        chunk
    });

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, length.to_string()),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

/// GET /api/tasks/{id}/file
pub async fn file_handler(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    match state.registry().take_for_serving(&id) {
        Ok(served) => serve_file(served).await.into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

/// Body of the legacy `POST /download`
#[derive(Debug, Deserialize)]
pub struct LegacyDownloadRequest {
    pub url: Option<String>,
}

/// POST /download
///
/// Synchronous variant: waits for the job and answers with the file itself.
/// Errors are `{ "error": ... }` with 400 for a missing URL and 500 otherwise.
pub async fn legacy_download_handler(
    State(state): State<SharedState>,
    payload: Result<Json<LegacyDownloadRequest>, JsonRejection>,
) -> Response {
    let url = payload
        .ok()
        .and_then(|Json(body)| body.url)
        .filter(|url| !url.trim().is_empty());
    let Some(url) = url else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "URL is required" }))).into_response();
    };

    match download_and_serve(&state, &url).await {
        Ok(response) => response,
        Err(e) => {
            log::error!("Legacy download of {} failed: {}", url, e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

async fn download_and_serve(state: &SharedState, url: &str) -> AppResult<Response> {
    let snapshot = start_task(state, url, DownloadOptions::default()).await?;
    let id = snapshot.id;
    let rx = state
        .registry()
        .subscribe(&id)
        .ok_or_else(|| AppError::NotFound(format!("Task {} not found", id)))?;

    let last = snapshot_stream(rx).fold(None, |_, snap| async move { Some(snap) }).await;
    match last {
        Some(snap) if snap.status == TaskStatus::Done => {}
        Some(snap) if snap.status == TaskStatus::Error => {
            // Nobody polls a legacy task, keep nothing around
            state.registry().evict(&id).await;
            return Err(AppError::Download(
                snap.error.unwrap_or_else(|| "Download failed".to_string()).into(),
            ));
        }
        _ => return Err(AppError::NotFound(format!("Task {} disappeared", id))),
    }

    let served = state
        .registry()
        .take_for_serving(&id)
        .map_err(|_| AppError::Conflict("File has already been fetched".to_string()))?;
    serve_file(served).await
}
