//! HTTP endpoint modules.
//!
//! Shared error shape and helpers live here; each sub-module owns one
//! surface (health, upload intake, processing, queue, settings).

pub mod doc;
mod health;
mod process;
mod queue;
mod settings;
mod upload;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use intake_ingest::IngestError;

use crate::files::FileError;

// ── Shared types ─────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<T, ApiError>;

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            status: status.as_u16(),
        }),
    )
}

pub(crate) fn bad_request(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, message)
}

pub(crate) fn internal_error(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, message)
}

pub(crate) fn ingest_error(e: IngestError) -> ApiError {
    let status =
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    api_error(status, e.to_string())
}

pub(crate) fn file_error(e: FileError) -> ApiError {
    match e {
        FileError::InvalidUpload(msg) => bad_request(msg),
        FileError::NotFound(msg) => api_error(StatusCode::NOT_FOUND, msg),
        other => internal_error(other.to_string()),
    }
}

/// Run blocking store work off the async runtime.
pub(crate) async fn run_blocking<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| internal_error(format!("background task failed: {e}")))?
}

/// Parse a raw request body as JSON, mapping failure to the
/// "Invalid JSON format." 400 that intake clients expect.
pub(crate) fn parse_json_body(body: &[u8]) -> ApiResult<serde_json::Value> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(error = %e, "request body is not valid JSON");
        bad_request("Invalid JSON format.")
    })
}

// ── Re-exports ───────────────────────────────────────────────────

pub use health::health;
pub use process::process;
pub use queue::{queue_list, queue_process_many, queue_process_one};
pub use settings::{
    import_settings_get, import_settings_put, site_file_upload, site_settings_get,
    site_settings_put,
};
pub use upload::upload;
