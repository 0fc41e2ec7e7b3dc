//! Queue inspection and targeted reprocessing.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use utoipa::ToSchema;

use intake_core::RecordId;
use intake_ingest::{IngestError, Outcome};
use intake_queue::{ItemId, QueueError, QueueItem};

use crate::state::AppState;

use super::{api_error, bad_request, ingest_error, internal_error, parse_json_body, ApiResult};

pub const EMPTY_QUEUE_MESSAGE: &str =
    "The queue is currently empty, all items have been processed successfully!";

// ── GET /queue ────────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct QueueItemView {
    pub id: u64,
    /// Decoded row, or the raw payload body when it cannot be decoded.
    #[schema(value_type = Object)]
    pub data: Value,
    pub enqueued_at: DateTime<Utc>,
    pub claimed_until: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl From<QueueItem> for QueueItemView {
    fn from(item: QueueItem) -> Self {
        let data = match item.payload.decode() {
            Ok(payload) => serde_json::to_value(&payload.row).unwrap_or(Value::Null),
            Err(_) => item.payload.body.clone(),
        };
        Self {
            id: item.id.0,
            data,
            enqueued_at: item.enqueued_at,
            claimed_until: item.claimed_until,
            attempts: item.attempts,
            last_error: item.last_error,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QueueMessage {
    pub message: String,
}

/// List every pending queue item
#[utoipa::path(
    get,
    path = "/queue",
    tag = "Queue",
    responses(
        (status = 200, description = "Pending items, or a message when the queue is empty", body = Vec<QueueItemView>),
        (status = 500, description = "Queue unreadable", body = super::ErrorResponse)
    )
)]
pub async fn queue_list(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let items = super::run_blocking(move || {
        state
            .queue
            .list()
            .map_err(|e| internal_error(e.to_string()))
    })
    .await?;
    if items.is_empty() {
        return Ok(Json(QueueMessage {
            message: EMPTY_QUEUE_MESSAGE.to_string(),
        })
        .into_response());
    }
    let views: Vec<QueueItemView> = items.into_iter().map(QueueItemView::from).collect();
    Ok(Json(views).into_response())
}

// ── Per-item results ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ItemResult {
    /// `success` or `error`.
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<u64>)]
    pub record_id: Option<RecordId>,
}

impl ItemResult {
    fn success(message: &str, record_id: RecordId) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
            record_id: Some(record_id),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            record_id: None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProcessResults {
    pub results: BTreeMap<u64, ItemResult>,
}

const NOT_FOUND_MESSAGE: &str = "Item not found in the queue.";
const CLAIMED_MESSAGE: &str = "Item is being processed by another worker.";

/// Map one processing attempt to its HTTP status and result entry.
fn settle(result: Result<Outcome, IngestError>) -> (StatusCode, ItemResult) {
    match result {
        Ok(Outcome::Created(id)) => (
            StatusCode::OK,
            ItemResult::success("Record created successfully, item removed from the queue.", id),
        ),
        Ok(Outcome::Duplicate(id)) => (
            StatusCode::OK,
            ItemResult::success("Record already exists, item removed from the queue.", id),
        ),
        Ok(Outcome::Rejected(reason)) => (
            StatusCode::BAD_REQUEST,
            ItemResult::error(format!("Queue item rejected: {reason}")),
        ),
        Ok(Outcome::Failed(reason)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ItemResult::error(format!("Failed to create record from queue item: {reason}")),
        ),
        Err(IngestError::Queue(QueueError::NotFound(_))) => {
            (StatusCode::NOT_FOUND, ItemResult::error(NOT_FOUND_MESSAGE))
        }
        Err(IngestError::Queue(QueueError::Claimed(_))) => {
            (StatusCode::CONFLICT, ItemResult::error(CLAIMED_MESSAGE))
        }
        Err(e) => {
            let (status, Json(body)) = ingest_error(e);
            (status, ItemResult::error(body.error))
        }
    }
}

/// Accept ids as JSON numbers or numeric strings.
fn item_id(value: &Value) -> Option<ItemId> {
    match value {
        Value::Number(n) => n.as_u64().map(ItemId),
        Value::String(s) => s.trim().parse().ok().map(ItemId),
        _ => None,
    }
}

// ── POST /queue/process-one ───────────────────────────────────────

/// Process one queue item by id
///
/// Body: `{"item_id": 1}`. Returns the per-item result on success; 404 when
/// the item is not queued, 409 while another worker holds it, and 500 when
/// the record store refuses the write (the item stays queued).
#[utoipa::path(
    post,
    path = "/queue/process-one",
    tag = "Queue",
    request_body(content_type = "application/json", description = "`{\"item_id\": integer}`"),
    responses(
        (status = 200, description = "Item processed", body = ProcessResults),
        (status = 400, description = "Missing item_id or rejected payload", body = super::ErrorResponse),
        (status = 404, description = "Item not found", body = super::ErrorResponse),
        (status = 409, description = "Item claimed by another worker", body = super::ErrorResponse),
        (status = 500, description = "Record creation failed", body = super::ErrorResponse)
    )
)]
pub async fn queue_process_one(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<ProcessResults>> {
    let data = parse_json_body(&body)?;
    let id = data
        .get("item_id")
        .and_then(item_id)
        .ok_or_else(|| bad_request("Item ID is required."))?;

    let worker_state = state.clone();
    let result = super::run_blocking(move || Ok(worker_state.worker().process_by_id(id))).await?;
    let (status, entry) = settle(result);
    info!(item_id = %id, status = status.as_u16(), "process-one finished");

    if status != StatusCode::OK {
        return Err(api_error(status, entry.message));
    }
    let mut results = BTreeMap::new();
    results.insert(id.0, entry);
    Ok(Json(ProcessResults { results }))
}

// ── POST /queue/process-many ──────────────────────────────────────

/// Process several queue items by id
///
/// Body: `{"item_ids": [1, 2, 3]}`. Every distinct id gets one entry in the
/// result map; failures for some ids do not affect the others. Always 200 once the
/// body is valid.
#[utoipa::path(
    post,
    path = "/queue/process-many",
    tag = "Queue",
    request_body(content_type = "application/json", description = "`{\"item_ids\": [integer]}`"),
    responses(
        (status = 200, description = "Per-item results", body = ProcessResults),
        (status = 400, description = "Missing or non-array item_ids", body = super::ErrorResponse)
    )
)]
pub async fn queue_process_many(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<ProcessResults>> {
    let data = parse_json_body(&body)?;
    let raw_ids = data
        .get("item_ids")
        .and_then(|v| v.as_array())
        .ok_or_else(|| bad_request("Item IDs are required and must be an array."))?;
    let ids: Vec<ItemId> = raw_ids
        .iter()
        .map(|v| item_id(v).ok_or_else(|| bad_request(format!("Invalid item ID: {v}"))))
        .collect::<ApiResult<_>>()?;

    let worker_state = state.clone();
    let results = super::run_blocking(move || {
        let worker = worker_state.worker();
        let mut results = BTreeMap::new();
        for id in ids {
            // A repeated id keeps the result of its first attempt.
            if let Entry::Vacant(slot) = results.entry(id.0) {
                let (_, entry) = settle(worker.process_by_id(id));
                slot.insert(entry);
            }
        }
        Ok(results)
    })
    .await?;

    let succeeded = results.values().filter(|r| r.status == "success").count();
    info!(
        requested = results.len(),
        succeeded,
        failed = results.len() - succeeded,
        "process-many finished"
    );
    Ok(Json(ProcessResults { results }))
}
