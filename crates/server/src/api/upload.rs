//! Upload intake: accept a CSV file and store it at the public root.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::files::{extension_of, Visibility};
use crate::state::AppState;

use super::{bad_request, file_error, ApiResult};

/// Extension the intake accepts, compared case-insensitively.
const CSV_EXTENSION: &str = "csv";

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub file_url: String,
    pub status: u16,
}

/// Upload a CSV file
///
/// Accepts multipart/form-data with a `file` field. The file is stored under
/// the public root (replacing any file of the same name) and its absolute URL
/// returned for use with `POST /process`.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "Intake",
    request_body(content_type = "multipart/form-data", description = "CSV file in field `file`"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "Missing file or not a CSV", body = super::ErrorResponse)
    )
)]
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = match field.file_name() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => return Err(bad_request("Invalid file upload.")),
        };
        if extension_of(&filename).as_deref() != Some(CSV_EXTENSION) {
            warn!(filename = %filename, "rejected non-CSV upload");
            return Err(bad_request("The uploaded file is not a CSV file."));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("Failed to read file: {e}")))?;

        let saved_state = state.clone();
        let file = super::run_blocking(move || {
            saved_state
                .files
                .save(Visibility::Public, None, &filename, &bytes)
                .map_err(file_error)
        })
        .await?;

        let file_url = state.files.url_of(&file);
        info!(file_id = %file.id, uri = %file.uri, size = file.size, "CSV upload stored");
        return Ok(Json(UploadResponse {
            message: "Your CSV file has been uploaded successfully.".to_string(),
            file_url,
            status: 200,
        }));
    }

    Err(bad_request("Invalid file upload."))
}
