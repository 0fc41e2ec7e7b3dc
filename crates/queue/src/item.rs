//! Queue item and payload types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use intake_core::{NaturalKey, Row};

use crate::error::QueueError;

/// Current schema version of [`RowPayload`] envelopes.
pub const PAYLOAD_VERSION: u32 = 1;

/// Queue-assigned item identifier. Monotonic per named queue, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The work a queue item carries: the row to create plus its natural key,
/// so the consumer can re-check for duplicates right before creating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowPayload {
    pub row: Row,
    pub key: NaturalKey,
}

impl RowPayload {
    pub fn new(row: Row) -> Self {
        let key = row.natural_key();
        Self { row, key }
    }
}

/// Versioned wrapper around a serialized payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u32,
    pub body: serde_json::Value,
}

impl Envelope {
    pub fn encode(payload: &RowPayload) -> Result<Self, QueueError> {
        let body = serde_json::to_value(payload).map_err(|e| QueueError::Parse(e.to_string()))?;
        Ok(Self {
            version: PAYLOAD_VERSION,
            body,
        })
    }

    /// Decode the body, rejecting envelopes written by an unknown schema.
    pub fn decode(&self) -> Result<RowPayload, QueueError> {
        if self.version != PAYLOAD_VERSION {
            return Err(QueueError::UnsupportedVersion {
                found: self.version,
                expected: PAYLOAD_VERSION,
            });
        }
        serde_json::from_value(self.body.clone()).map_err(|e| QueueError::Parse(e.to_string()))
    }
}

/// A pending unit of work in a named queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: ItemId,
    pub payload: Envelope,
    pub enqueued_at: DateTime<Utc>,
    /// Set while a consumer holds the item. Expired leases make the item
    /// visible again.
    #[serde(default)]
    pub claimed_until: Option<DateTime<Utc>>,
    /// Number of times the item has been claimed.
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl QueueItem {
    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        self.claimed_until.map_or(true, |until| until <= now)
    }
}
