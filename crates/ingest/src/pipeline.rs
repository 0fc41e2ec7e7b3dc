//! Ingestion pipeline: parse → dedup → enqueue, bounded by an import limit.
//!
//! The pipeline never creates records itself. It writes accepted rows to the
//! work queue and reports how many were enqueued, skipped as duplicates, and
//! rejected as malformed.

use std::fmt;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use intake_core::RecordStore;
use intake_queue::{ItemId, RowPayload, WorkQueue};

use crate::dedup::DedupIndex;
use crate::error::IngestError;
use crate::parser::{ParsedRow, RowParser};

/// Maximum rows enqueued by one run. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ImportLimit(NonZeroU32);

impl ImportLimit {
    pub fn new(limit: u32) -> Option<Self> {
        NonZeroU32::new(limit).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for ImportLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counters from one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub enqueued: u64,
    pub skipped: u64,
    pub malformed: u64,
    /// True when the run stopped at the limit; later rows were not read.
    pub limit_reached: bool,
    pub item_ids: Vec<ItemId>,
}

pub struct IngestionPipeline {
    records: Arc<dyn RecordStore>,
    queue: Arc<dyn WorkQueue>,
    parser: RowParser,
}

impl IngestionPipeline {
    pub fn new(records: Arc<dyn RecordStore>, queue: Arc<dyn WorkQueue>) -> Self {
        Self {
            records,
            queue,
            parser: RowParser::new(),
        }
    }

    pub fn with_parser(mut self, parser: RowParser) -> Self {
        self.parser = parser;
        self
    }

    /// Run one ingestion over the CSV file at `path`.
    ///
    /// Fails with `SourceUnavailable` before anything is enqueued if the file
    /// cannot be opened, and with `SourceInterrupted` if reading fails partway.
    pub fn ingest(&self, path: &Path, limit: ImportLimit) -> Result<IngestReport, IngestError> {
        let rows = self.parser.open(path)?;
        self.ingest_rows(rows, limit, &path.display().to_string())
    }

    /// Run one ingestion over an already-open CSV stream.
    pub fn ingest_reader<R: std::io::Read>(
        &self,
        reader: R,
        limit: ImportLimit,
    ) -> Result<IngestReport, IngestError> {
        self.ingest_rows(self.parser.parse(reader), limit, "<stream>")
    }

    fn ingest_rows<I>(
        &self,
        rows: I,
        limit: ImportLimit,
        source: &str,
    ) -> Result<IngestReport, IngestError>
    where
        I: Iterator<Item = Result<ParsedRow, IngestError>>,
    {
        let start = Instant::now();
        let mut index = DedupIndex::from_store(self.records.as_ref())?;
        debug!(existing = index.len(), "dedup index built");

        let mut report = IngestReport::default();
        let max = u64::from(limit.get());

        for parsed in rows {
            let parsed = match parsed {
                Ok(parsed) => parsed,
                Err(e) => {
                    error!(
                        source,
                        enqueued = report.enqueued,
                        error = %e,
                        "ingestion interrupted"
                    );
                    return Err(IngestError::SourceInterrupted {
                        enqueued: report.enqueued,
                        reason: e.to_string(),
                    });
                }
            };
            let row = match parsed {
                ParsedRow::Row(row) => row,
                ParsedRow::Malformed {
                    record,
                    field_count,
                } => {
                    report.malformed += 1;
                    warn!(record, field_count, "skipping malformed row");
                    continue;
                }
            };

            let key = row.natural_key();
            if index.contains(&key) {
                report.skipped += 1;
                debug!(key = %key, "skipping duplicate row");
                continue;
            }

            let id = self.queue.enqueue(&RowPayload::new(row))?;
            index.insert(key);
            report.item_ids.push(id);
            report.enqueued += 1;

            if report.enqueued >= max {
                report.limit_reached = true;
                break;
            }
        }

        info!(
            source,
            queue = self.queue.name(),
            enqueued = report.enqueued,
            skipped = report.skipped,
            malformed = report.malformed,
            limit = limit.get(),
            limit_reached = report.limit_reached,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "ingestion run complete"
        );
        Ok(report)
    }
}
