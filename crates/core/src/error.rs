use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Record not found: {0}")]
    RecordNotFound(u64),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl IntakeError {
    /// Map to an HTTP status code for API responses.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) | Self::SourceUnavailable(_) => 400,
            Self::RecordNotFound(_) => 404,
            Self::Io(_) | Self::Serialize(_) | Self::Storage(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, IntakeError>;
