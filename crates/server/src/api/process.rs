//! Processing trigger: run an ingestion over a previously uploaded file.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::state::AppState;

use super::{bad_request, file_error, ingest_error, internal_error, parse_json_body, ApiResult};

#[derive(Debug, Serialize, ToSchema)]
pub struct ProcessResponse {
    pub message: String,
    pub status: u16,
    pub enqueued: u64,
    pub skipped: u64,
    pub malformed: u64,
    pub limit: u32,
    pub limit_reached: bool,
}

/// Enqueue the rows of an uploaded CSV file
///
/// Body: `{"file_url": "..."}` as returned by `POST /upload`. The file is
/// looked up by the basename of the URL path. Rows are deduplicated against
/// existing records and earlier rows, and at most the configured import
/// limit are enqueued.
#[utoipa::path(
    post,
    path = "/process",
    tag = "Intake",
    request_body(content_type = "application/json", description = "`{\"file_url\": string}`"),
    responses(
        (status = 200, description = "Rows enqueued", body = ProcessResponse),
        (status = 400, description = "Invalid JSON, missing file_url, unknown file, or no import limit", body = super::ErrorResponse)
    )
)]
pub async fn process(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<ProcessResponse>> {
    let data = parse_json_body(&body)?;
    let file_url = data
        .get("file_url")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_request("File URL is required."))?
        .to_string();

    let run_state = state.clone();
    let (report, file, limit) = super::run_blocking(move || {
        let (limit, _) = run_state
            .settings
            .import_limit()
            .map_err(|e| internal_error(e.to_string()))?;
        let limit = limit.ok_or_else(|| bad_request("Import limit is not configured."))?;

        let file = run_state
            .files
            .resolve_url(&file_url)
            .map_err(file_error)?
            .ok_or_else(|| {
                warn!(file_url = %file_url, "file could not be resolved");
                bad_request("Could not process file.")
            })?;

        let path = run_state.files.path_of(&file);
        let report = run_state
            .pipeline()
            .ingest(&path, limit)
            .map_err(ingest_error)?;
        let file = run_state.files.set_permanent(file.id).map_err(file_error)?;
        Ok((report, file, limit))
    })
    .await?;

    info!(
        file_id = %file.id,
        enqueued = report.enqueued,
        skipped = report.skipped,
        malformed = report.malformed,
        "process request complete"
    );

    Ok(Json(ProcessResponse {
        message: "CSV file items enqueued successfully for processing.".to_string(),
        status: 200,
        enqueued: report.enqueued,
        skipped: report.skipped,
        malformed: report.malformed,
        limit: limit.get(),
        limit_reached: report.limit_reached,
    }))
}
