//! HTTP router construction.
//!
//! Assembles all Axum routes, middleware, static file serving, and OpenAPI
//! docs into a single `Router`.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{warn, Level};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::api;
use crate::state::AppState;

/// Upload size cap for CSV and site files.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let public_dir = state.config.storage.public_dir.clone();
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .route("/health", get(api::health))
        // Intake
        .route(
            "/upload",
            post(api::upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/process", post(api::process))
        // Queue
        .route("/queue", get(api::queue_list))
        .route("/queue/process-one", post(api::queue_process_one))
        .route("/queue/process-many", post(api::queue_process_many))
        // Settings
        .route(
            "/settings/import",
            get(api::import_settings_get).put(api::import_settings_put),
        )
        .route(
            "/settings/site",
            get(api::site_settings_get).put(api::site_settings_put),
        )
        .route(
            "/settings/site/files/{visibility}",
            post(api::site_file_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .nest_service("/files", ServeDir::new(public_dir))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
        .merge(Scalar::with_url("/docs", api::doc::ApiDoc::openapi()))
}

/// `*` allows any origin; anything else is taken as a single exact origin.
fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origin.trim() == "*" {
        return cors.allow_origin(Any);
    }
    match HeaderValue::from_str(origin.trim()) {
        Ok(value) => cors.allow_origin(value),
        Err(_) => {
            warn!(origin, "invalid CORS_ORIGIN, allowing any origin");
            cors.allow_origin(Any)
        }
    }
}
