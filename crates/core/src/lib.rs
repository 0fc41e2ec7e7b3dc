pub mod config;
pub mod error;
pub mod persist;
pub mod record;
pub mod row;

pub use config::Config;
pub use error::*;
pub use record::{FileRecordStore, NewRecord, Record, RecordId, RecordStatus, RecordStore};
pub use row::{NaturalKey, Row};
