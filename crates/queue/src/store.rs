//! Durable named work queues.
//!
//! [`WorkQueue`] is the contract producers and consumers share. [`FileQueue`]
//! persists one JSON file per queue name under `{data_dir}/queue/`. Every
//! operation is a read-modify-write under an exclusive file lock, so a claim
//! is seen by every consumer on the data directory, in this process or not.

use std::path::Path;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use intake_core::persist::JsonFile;

use crate::error::QueueError;
use crate::item::{Envelope, ItemId, QueueItem, RowPayload};

/// At-least-once FIFO queue of pending record-creation work.
pub trait WorkQueue: Send + Sync {
    fn name(&self) -> &str;

    /// Append a payload, returning its new id.
    fn enqueue(&self, payload: &RowPayload) -> Result<ItemId, QueueError>;

    /// Claim up to `max_items` visible items in FIFO order. Claimed items stay
    /// invisible until deleted, released, or their lease expires.
    fn claim(&self, max_items: usize) -> Result<Vec<QueueItem>, QueueError>;

    /// Claim one specific item for targeted reprocessing.
    fn claim_by_id(&self, id: ItemId) -> Result<QueueItem, QueueError>;

    fn get(&self, id: ItemId) -> Result<Option<QueueItem>, QueueError>;

    /// Remove an item after successful processing.
    fn delete(&self, id: ItemId) -> Result<(), QueueError>;

    /// Drop the lease on an item so it becomes visible again, recording why.
    fn release(&self, id: ItemId, error: Option<String>) -> Result<(), QueueError>;

    /// Every item still in the queue, claimed or not, in FIFO order.
    fn list(&self) -> Result<Vec<QueueItem>, QueueError>;

    fn len(&self) -> Result<usize, QueueError> {
        Ok(self.list()?.len())
    }

    fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len()? == 0)
    }
}

/// On-disk layout version for queue files.
const QUEUE_FILE_SCHEMA: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct QueueFile {
    schema: u32,
    next_id: u64,
    items: Vec<QueueItem>,
}

impl Default for QueueFile {
    fn default() -> Self {
        Self {
            schema: QUEUE_FILE_SCHEMA,
            next_id: 1,
            items: Vec::new(),
        }
    }
}

/// JSON-file-backed [`WorkQueue`].
pub struct FileQueue {
    name: String,
    file: JsonFile,
    lease: Duration,
}

impl FileQueue {
    /// Open (or create) the queue `name` under `data_dir`.
    ///
    /// `lease_secs` bounds how long a claim hides an item from other
    /// consumers; a consumer that crashes mid-item loses its claim after that.
    pub fn open(data_dir: &Path, name: &str, lease_secs: u64) -> Result<Self, QueueError> {
        validate_name(name)?;
        let queue = Self {
            name: name.to_string(),
            file: JsonFile::new(data_dir.join("queue").join(format!("{}.json", name))),
            lease: Duration::seconds(lease_secs.min(MAX_LEASE_SECS) as i64),
        };
        let state = queue.load()?;
        info!(
            queue = name,
            pending = state.items.len(),
            "queue opened at {}",
            queue.file.path().display()
        );
        Ok(queue)
    }

    fn check_schema(&self, state: &QueueFile) -> Result<(), QueueError> {
        if state.schema != QUEUE_FILE_SCHEMA {
            return Err(QueueError::Storage(format!(
                "queue file {} has schema {}, expected {}",
                self.file.path().display(),
                state.schema,
                QUEUE_FILE_SCHEMA
            )));
        }
        Ok(())
    }

    fn load(&self) -> Result<QueueFile, QueueError> {
        let state: QueueFile = self.file.read()?;
        self.check_schema(&state)?;
        Ok(state)
    }

    /// Locked read-modify-write of the queue file. Nothing is written when
    /// `change` fails.
    fn update<R, F>(&self, change: F) -> Result<R, QueueError>
    where
        F: FnOnce(&mut QueueFile) -> Result<R, QueueError>,
    {
        self.file.update(|state: &mut QueueFile| {
            self.check_schema(state)?;
            change(state)
        })
    }
}

/// One year; keeps the chrono arithmetic far from overflow.
const MAX_LEASE_SECS: u64 = 365 * 24 * 60 * 60;

fn validate_name(name: &str) -> Result<(), QueueError> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(QueueError::InvalidName(name.to_string()))
    }
}

impl WorkQueue for FileQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn enqueue(&self, payload: &RowPayload) -> Result<ItemId, QueueError> {
        let envelope = Envelope::encode(payload)?;
        let id = self.update(|state| {
            let id = ItemId(state.next_id);
            state.items.push(QueueItem {
                id,
                payload: envelope,
                enqueued_at: Utc::now(),
                claimed_until: None,
                attempts: 0,
                last_error: None,
            });
            state.next_id += 1;
            Ok(id)
        })?;
        debug!(queue = %self.name, item_id = %id, "item enqueued");
        Ok(id)
    }

    fn claim(&self, max_items: usize) -> Result<Vec<QueueItem>, QueueError> {
        if max_items == 0 {
            return Ok(Vec::new());
        }
        // Skip the write entirely when nothing is visible.
        let now = Utc::now();
        if !self.load()?.items.iter().any(|item| item.is_visible(now)) {
            return Ok(Vec::new());
        }

        self.update(|state| {
            let now = Utc::now();
            let until = now + self.lease;
            let mut claimed = Vec::new();
            for item in state.items.iter_mut() {
                if claimed.len() >= max_items {
                    break;
                }
                if !item.is_visible(now) {
                    continue;
                }
                if item.claimed_until.is_some() {
                    warn!(queue = %self.name, item_id = %item.id, "lease expired, reclaiming item");
                }
                item.claimed_until = Some(until);
                item.attempts += 1;
                claimed.push(item.clone());
            }
            Ok(claimed)
        })
    }

    fn claim_by_id(&self, id: ItemId) -> Result<QueueItem, QueueError> {
        self.update(|state| {
            let now = Utc::now();
            let item = state
                .items
                .iter_mut()
                .find(|item| item.id == id)
                .ok_or(QueueError::NotFound(id))?;
            if !item.is_visible(now) {
                return Err(QueueError::Claimed(id));
            }
            item.claimed_until = Some(now + self.lease);
            item.attempts += 1;
            Ok(item.clone())
        })
    }

    fn get(&self, id: ItemId) -> Result<Option<QueueItem>, QueueError> {
        Ok(self.load()?.items.into_iter().find(|item| item.id == id))
    }

    fn delete(&self, id: ItemId) -> Result<(), QueueError> {
        self.update(|state| {
            let pos = state
                .items
                .iter()
                .position(|item| item.id == id)
                .ok_or(QueueError::NotFound(id))?;
            state.items.remove(pos);
            Ok(())
        })?;
        debug!(queue = %self.name, item_id = %id, "item deleted");
        Ok(())
    }

    fn release(&self, id: ItemId, error: Option<String>) -> Result<(), QueueError> {
        self.update(|state| {
            let item = state
                .items
                .iter_mut()
                .find(|item| item.id == id)
                .ok_or(QueueError::NotFound(id))?;
            item.claimed_until = None;
            if error.is_some() {
                item.last_error = error;
            }
            Ok(())
        })
    }

    fn list(&self) -> Result<Vec<QueueItem>, QueueError> {
        Ok(self.load()?.items)
    }
}
