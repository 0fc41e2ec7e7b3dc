pub mod error;
pub mod item;
pub mod store;

pub use error::QueueError;
pub use item::{Envelope, ItemId, QueueItem, RowPayload, PAYLOAD_VERSION};
pub use store::{FileQueue, WorkQueue};
