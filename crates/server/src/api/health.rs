use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

use super::{internal_error, ApiResult};

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub queue: String,
    pub pending: usize,
}

/// Service health and queue depth
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
        (status = 500, description = "Queue unreadable", body = super::ErrorResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    super::run_blocking(move || {
        let pending = state
            .queue
            .len()
            .map_err(|e| internal_error(e.to_string()))?;
        Ok(Json(HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            queue: state.queue.name().to_string(),
            pending,
        }))
    })
    .await
}
