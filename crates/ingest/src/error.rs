//! Ingestion error types.
//!
//! Malformed and duplicate rows are not errors: they are counted in
//! [`IngestReport`](crate::IngestReport) and the run continues.

use thiserror::Error;

use intake_core::IntakeError;
use intake_queue::QueueError;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The source failed partway; rows before the failure stay queued.
    #[error("source read failed after {enqueued} rows were enqueued: {reason}")]
    SourceInterrupted { enqueued: u64, reason: String },

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("record store error: {0}")]
    Store(#[from] IntakeError),
}

impl IngestError {
    /// Map to an HTTP status code for API responses.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_)
            | Self::SourceUnavailable(_)
            | Self::SourceInterrupted { .. } => 400,
            Self::Queue(QueueError::NotFound(_)) => 404,
            Self::Queue(QueueError::Claimed(_)) => 409,
            Self::Queue(_) | Self::Store(_) => 500,
        }
    }
}
