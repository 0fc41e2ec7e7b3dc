//! CSV ingestion: parse → dedup → enqueue, and the queue consumer that turns
//! queued rows into records.

pub mod dedup;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod worker;

pub use dedup::DedupIndex;
pub use error::IngestError;
pub use parser::{ParsedRow, RowParser, RowIter};
pub use pipeline::{ImportLimit, IngestReport, IngestionPipeline};
pub use worker::{DrainReport, Outcome, RecordCreationWorker};
