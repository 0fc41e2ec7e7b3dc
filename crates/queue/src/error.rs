//! Queue error types.

use thiserror::Error;

use crate::item::ItemId;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("item {0} not found in queue")]
    NotFound(ItemId),

    #[error("item {0} is claimed by another consumer")]
    Claimed(ItemId),

    #[error("invalid queue name: {0}")]
    InvalidName(String),

    #[error("unsupported payload version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("payload parse error: {0}")]
    Parse(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<intake_core::IntakeError> for QueueError {
    fn from(e: intake_core::IntakeError) -> Self {
        Self::Storage(e.to_string())
    }
}
