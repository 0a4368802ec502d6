use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

use crate::download::error::DownloadError;

/// Centralized error types for the application
///
/// Every fallible path in the service ends up here, and the web layer turns it
/// into a `{ "error": message }` body with a matching status code.
///
/// # Example
///
/// ```
/// use doraweb::core::error::AppError;
///
/// let err = AppError::Validation("URL is required".to_string());
/// assert_eq!(err.to_string(), "URL is required");
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed client input
    #[error("{0}")]
    Validation(String),

    /// Well-formed URL on a host we do not handle
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Unknown or evicted task
    #[error("{0}")]
    NotFound(String),

    /// Request conflicts with the task's current state
    #[error("{0}")]
    Conflict(String),

    /// Download/yt-dlp errors
    #[error("{0}")]
    Download(#[from] DownloadError),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// HTTP status this error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::UnsupportedPlatform(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Download(DownloadError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Download(DownloadError::YtDlp(_)) | AppError::Download(DownloadError::Instagram(_)) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Download(_)
            | AppError::Http(_)
            | AppError::Io(_)
            | AppError::Json(_)
            | AppError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed ({}): {}", status, self);
        } else {
            log::debug!("Request rejected ({}): {}", status, self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
