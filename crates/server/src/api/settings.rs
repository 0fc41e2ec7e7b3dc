//! Import settings and site settings (including the site file fields).

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use intake_ingest::ImportLimit;

use crate::files::{extension_of, Visibility};
use crate::settings::{LimitSource, SiteSettings};
use crate::state::AppState;

use super::{bad_request, file_error, internal_error, parse_json_body, ApiResult};

/// Extensions accepted by the site file fields.
const SITE_FILE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "pdf"];

/// Site files live in this sub-directory of their storage root.
const SITE_UPLOAD_DIR: &str = "uploads";

// ── Import settings ───────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct ImportSettingsResponse {
    pub limit: Option<u32>,
    pub source: LimitSource,
}

fn import_settings_view(state: &AppState) -> ApiResult<ImportSettingsResponse> {
    let (limit, source) = state
        .settings
        .import_limit()
        .map_err(|e| internal_error(e.to_string()))?;
    Ok(ImportSettingsResponse {
        limit: limit.map(ImportLimit::get),
        source,
    })
}

/// Current import limit and where it comes from
#[utoipa::path(
    get,
    path = "/settings/import",
    tag = "Settings",
    responses((status = 200, description = "Effective import limit", body = ImportSettingsResponse))
)]
pub async fn import_settings_get(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ImportSettingsResponse>> {
    super::run_blocking(move || import_settings_view(&state).map(Json)).await
}

/// Set the maximum rows enqueued per ingestion run
#[utoipa::path(
    put,
    path = "/settings/import",
    tag = "Settings",
    request_body(content_type = "application/json", description = "`{\"limit\": positive integer}`"),
    responses(
        (status = 200, description = "Saved", body = ImportSettingsResponse),
        (status = 400, description = "Limit missing or not a positive integer", body = super::ErrorResponse)
    )
)]
pub async fn import_settings_put(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<ImportSettingsResponse>> {
    let data = parse_json_body(&body)?;
    let limit = data
        .get("limit")
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
        .and_then(ImportLimit::new)
        .ok_or_else(|| bad_request("Limit must be a positive integer."))?;

    let view = super::run_blocking(move || {
        state
            .settings
            .set_import_limit(limit)
            .map_err(|e| internal_error(e.to_string()))?;
        import_settings_view(&state)
    })
    .await?;
    info!(limit = limit.get(), "import limit updated");
    Ok(Json(view))
}

// ── Site settings ─────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct SiteSettingsInput {
    pub text_field_1: String,
}

/// Current site settings
#[utoipa::path(
    get,
    path = "/settings/site",
    tag = "Settings",
    responses((status = 200, description = "Site settings", body = SiteSettings))
)]
pub async fn site_settings_get(State(state): State<Arc<AppState>>) -> ApiResult<Json<SiteSettings>> {
    super::run_blocking(move || {
        state
            .settings
            .site()
            .map(Json)
            .map_err(|e| internal_error(e.to_string()))
    })
    .await
}

/// Update the editable site text field
///
/// `text_field_2` is read-only and always reflects the environment.
#[utoipa::path(
    put,
    path = "/settings/site",
    tag = "Settings",
    request_body = SiteSettingsInput,
    responses(
        (status = 200, description = "Saved", body = SiteSettings),
        (status = 400, description = "Invalid body", body = super::ErrorResponse)
    )
)]
pub async fn site_settings_put(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<SiteSettings>> {
    let data = parse_json_body(&body)?;
    let input: SiteSettingsInput = serde_json::from_value(data)
        .map_err(|e| bad_request(format!("Invalid site settings: {e}")))?;

    super::run_blocking(move || {
        state
            .settings
            .update_site(|site| site.text_field_1 = input.text_field_1)
            .map(Json)
            .map_err(|e| internal_error(e.to_string()))
    })
    .await
}

/// Upload a public or private site file
///
/// Multipart field `file`; png, jpg, jpeg or pdf. The file is made permanent
/// and its id and absolute URL recorded in the site settings.
#[utoipa::path(
    post,
    path = "/settings/site/files/{visibility}",
    tag = "Settings",
    params(("visibility" = String, Path, description = "`public` or `private`")),
    request_body(content_type = "multipart/form-data", description = "File in field `file`"),
    responses(
        (status = 200, description = "File stored and recorded", body = SiteSettings),
        (status = 400, description = "Unknown visibility, missing file, or disallowed extension", body = super::ErrorResponse)
    )
)]
pub async fn site_file_upload(
    State(state): State<Arc<AppState>>,
    Path(visibility): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Json<SiteSettings>> {
    let visibility = Visibility::parse(&visibility)
        .ok_or_else(|| bad_request(format!("Unknown file visibility: {visibility}")))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| bad_request("Invalid file upload."))?;
        let allowed = extension_of(&filename)
            .map(|ext| SITE_FILE_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false);
        if !allowed {
            return Err(bad_request(format!(
                "Only files with the following extensions are allowed: {}.",
                SITE_FILE_EXTENSIONS.join(" ")
            )));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("Failed to read file: {e}")))?;

        let save_state = state.clone();
        let site = super::run_blocking(move || {
            let files = &save_state.files;
            let saved = files
                .save(visibility, Some(SITE_UPLOAD_DIR), &filename, &bytes)
                .map_err(file_error)?;
            let file = files.set_permanent(saved.id).map_err(file_error)?;
            let url = files.url_of(&file);
            save_state
                .settings
                .update_site(|site| match visibility {
                    Visibility::Public => {
                        site.public_file = Some(file.id);
                        site.public_file_url = Some(url);
                    }
                    Visibility::Private => {
                        site.private_file = Some(file.id);
                        site.private_file_url = Some(url);
                    }
                })
                .map_err(|e| internal_error(e.to_string()))
        })
        .await?;

        info!(visibility = visibility.scheme(), "site file updated");
        return Ok(Json(site));
    }

    Err(bad_request("Invalid file upload."))
}
