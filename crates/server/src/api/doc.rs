//! OpenAPI documentation aggregator.
//!
//! Collects all `#[utoipa::path]`-annotated handlers and `ToSchema`-derived
//! types into a single OpenAPI spec, served via Scalar UI at `/docs`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "intake API",
        version = "0.1.0",
        description = "CSV intake: upload, deduplicate, enqueue, and create records from queued rows.",
    ),
    tags(
        (name = "Health", description = "Service readiness and queue depth"),
        (name = "Intake", description = "CSV upload and ingestion runs"),
        (name = "Queue", description = "Pending item inspection and targeted reprocessing"),
        (name = "Settings", description = "Import limit and site settings"),
    ),
    paths(
        // Health
        crate::api::health::health,
        // Intake
        crate::api::upload::upload,
        crate::api::process::process,
        // Queue
        crate::api::queue::queue_list,
        crate::api::queue::queue_process_one,
        crate::api::queue::queue_process_many,
        // Settings
        crate::api::settings::import_settings_get,
        crate::api::settings::import_settings_put,
        crate::api::settings::site_settings_get,
        crate::api::settings::site_settings_put,
        crate::api::settings::site_file_upload,
    )
)]
pub struct ApiDoc;
