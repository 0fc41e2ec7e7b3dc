//! Record creation worker: the consumer side of the work queue.
//!
//! Every outcome settles the item it was handed. Created and duplicate items
//! are deleted; rejected and failed items have their lease released with the
//! reason recorded, so they stay visible for a later pass or a targeted
//! reprocess.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use intake_core::{NewRecord, RecordId, RecordStore};
use intake_queue::{ItemId, QueueItem, RowPayload, WorkQueue};

use crate::error::IngestError;

/// Result of processing one queue item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    /// A new record was created.
    Created(RecordId),
    /// A record with the same natural key already existed; nothing created.
    Duplicate(RecordId),
    /// The payload could not be decoded or failed validation.
    Rejected(String),
    /// The record store refused the write.
    Failed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Created(_) | Self::Duplicate(_))
    }
}

/// Tally of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub created: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub failed: u64,
}

impl DrainReport {
    pub fn total(&self) -> u64 {
        self.created + self.duplicates + self.rejected + self.failed
    }

    /// Items removed from the queue by this pass.
    pub fn settled(&self) -> u64 {
        self.created + self.duplicates
    }

    pub fn merge(&mut self, other: &DrainReport) {
        self.created += other.created;
        self.duplicates += other.duplicates;
        self.rejected += other.rejected;
        self.failed += other.failed;
    }

    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Created(_) => self.created += 1,
            Outcome::Duplicate(_) => self.duplicates += 1,
            Outcome::Rejected(_) => self.rejected += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }
}

pub struct RecordCreationWorker {
    records: Arc<dyn RecordStore>,
    queue: Arc<dyn WorkQueue>,
    owner: String,
}

impl RecordCreationWorker {
    pub fn new(
        records: Arc<dyn RecordStore>,
        queue: Arc<dyn WorkQueue>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            records,
            queue,
            owner: owner.into(),
        }
    }

    pub fn queue(&self) -> &dyn WorkQueue {
        self.queue.as_ref()
    }

    /// Process an item this worker has already claimed, then settle it in
    /// the queue according to the outcome.
    pub fn process_item(&self, item: &QueueItem) -> Result<Outcome, IngestError> {
        let outcome = self.evaluate(item);

        match &outcome {
            Outcome::Created(record_id) => {
                info!(item_id = %item.id, record_id = %record_id, "record created");
                self.queue.delete(item.id)?;
            }
            Outcome::Duplicate(record_id) => {
                info!(item_id = %item.id, record_id = %record_id, "record already exists, dropping item");
                self.queue.delete(item.id)?;
            }
            Outcome::Rejected(reason) => {
                warn!(item_id = %item.id, reason = %reason, "queue item rejected");
                self.queue.release(item.id, Some(reason.clone()))?;
            }
            Outcome::Failed(reason) => {
                error!(item_id = %item.id, attempts = item.attempts, reason = %reason, "record creation failed");
                self.queue.release(item.id, Some(reason.clone()))?;
            }
        }
        Ok(outcome)
    }

    /// Claim one item by id and process it. Fails with `NotFound` or
    /// `Claimed` queue errors when the item cannot be claimed.
    pub fn process_by_id(&self, id: ItemId) -> Result<Outcome, IngestError> {
        let item = self.queue.claim_by_id(id)?;
        self.process_item(&item)
    }

    /// Claim up to `batch_size` visible items and process each in FIFO order.
    pub fn drain(&self, batch_size: usize) -> Result<DrainReport, IngestError> {
        let mut report = DrainReport::default();
        for item in self.queue.claim(batch_size)? {
            let outcome = self.process_item(&item)?;
            report.record(&outcome);
        }
        if report.total() > 0 {
            info!(
                queue = self.queue.name(),
                created = report.created,
                duplicates = report.duplicates,
                rejected = report.rejected,
                failed = report.failed,
                "drain pass complete"
            );
        }
        Ok(report)
    }

    fn evaluate(&self, item: &QueueItem) -> Outcome {
        let payload = match item.payload.decode() {
            Ok(payload) => payload,
            Err(e) => return Outcome::Rejected(e.to_string()),
        };
        if let Err(reason) = validate(&payload) {
            return Outcome::Rejected(reason);
        }

        match self.records.find_by_key(&payload.key) {
            Ok(Some(existing)) => return Outcome::Duplicate(existing.id),
            Ok(None) => {}
            Err(e) => return Outcome::Failed(e.to_string()),
        }

        match self
            .records
            .create(NewRecord::published(payload.row, self.owner.clone()))
        {
            Ok(record) => Outcome::Created(record.id),
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }
}

fn validate(payload: &RowPayload) -> Result<(), String> {
    if payload.row.name.is_empty() {
        return Err("row has an empty name".to_string());
    }
    if payload.row.email.is_empty() {
        return Err("row has an empty email".to_string());
    }
    if payload.row.natural_key() != payload.key {
        return Err(format!(
            "natural key {} does not match row {}",
            payload.key,
            payload.row.natural_key()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::{FileRecordStore, IntakeError, NaturalKey, Record, Row};
    use intake_queue::{Envelope, FileQueue};

    struct Fixture {
        _tmp: tempfile::TempDir,
        records: Arc<FileRecordStore>,
        queue: Arc<FileQueue>,
        worker: RecordCreationWorker,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let records = Arc::new(FileRecordStore::open(tmp.path(), "contact").unwrap());
        let queue = Arc::new(FileQueue::open(tmp.path(), "record_creation", 300).unwrap());
        let worker = RecordCreationWorker::new(records.clone(), queue.clone(), "system");
        Fixture {
            _tmp: tmp,
            records,
            queue,
            worker,
        }
    }

    /// Store that refuses every write.
    struct ReadOnlyStore;

    impl RecordStore for ReadOnlyStore {
        fn record_type(&self) -> &str {
            "contact"
        }

        fn list(&self) -> intake_core::Result<Vec<Record>> {
            Ok(Vec::new())
        }

        fn get(&self, _id: RecordId) -> intake_core::Result<Option<Record>> {
            Ok(None)
        }

        fn create(&self, _new: NewRecord) -> intake_core::Result<Record> {
            Err(IntakeError::Storage("store is read-only".to_string()))
        }
    }

    #[test]
    fn test_round_trip_preserves_trimmed_fields_and_email_case() {
        let f = fixture();
        let row = Row::new(" Alice ", "Alice@X.com ", "1 Main St", "555-1111");
        let id = f.queue.enqueue(&RowPayload::new(row)).unwrap();

        let outcome = f.worker.process_by_id(id).unwrap();
        let record_id = match outcome {
            Outcome::Created(record_id) => record_id,
            other => panic!("expected Created, got {:?}", other),
        };

        let record = f.records.get(record_id).unwrap().unwrap();
        assert_eq!(record.name, "Alice");
        assert_eq!(record.email, "Alice@X.com");
        assert_eq!(record.address, "1 Main St");
        assert_eq!(record.contact_no, "555-1111");
        assert_eq!(record.owner, "system");
        assert!(f.queue.is_empty().unwrap());
    }

    #[test]
    fn test_reprocessing_same_row_does_not_duplicate() {
        let f = fixture();
        let payload = RowPayload::new(Row::new("Bob", "bob@x.com", "Addr", "555"));
        let first = f.queue.enqueue(&payload).unwrap();
        let second = f.queue.enqueue(&payload).unwrap();

        let created = f.worker.process_by_id(first).unwrap();
        let again = f.worker.process_by_id(second).unwrap();

        let Outcome::Created(record_id) = &created else {
            panic!("expected Created, got {:?}", created);
        };
        assert_eq!(again, Outcome::Duplicate(*record_id));
        assert_eq!(f.records.list().unwrap().len(), 1);
        assert!(f.queue.is_empty().unwrap());
    }

    #[test]
    fn test_creation_failure_keeps_item() {
        let tmp = tempfile::tempdir().unwrap();
        let queue = Arc::new(FileQueue::open(tmp.path(), "record_creation", 300).unwrap());
        let worker = RecordCreationWorker::new(Arc::new(ReadOnlyStore), queue.clone(), "system");
        let id = queue
            .enqueue(&RowPayload::new(Row::new("Ann", "ann@x.com", "Addr", "555")))
            .unwrap();

        let outcome = worker.process_by_id(id).unwrap();
        assert!(matches!(outcome, Outcome::Failed(_)));
        assert!(!outcome.is_success());

        let item = queue.get(id).unwrap().unwrap();
        assert!(item.claimed_until.is_none());
        assert_eq!(item.attempts, 1);
        assert!(item.last_error.unwrap().contains("read-only"));
    }

    #[test]
    fn test_invalid_payload_is_rejected_and_kept() {
        let f = fixture();
        let id = f
            .queue
            .enqueue(&RowPayload {
                row: Row::new("Ann", "ann@x.com", "Addr", "555"),
                key: NaturalKey::new("Someone", "else@x.com"),
            })
            .unwrap();

        let outcome = f.worker.process_by_id(id).unwrap();
        assert!(matches!(outcome, Outcome::Rejected(_)));
        assert!(f.records.list().unwrap().is_empty());
        assert!(f.queue.get(id).unwrap().unwrap().last_error.is_some());
    }

    #[test]
    fn test_empty_email_is_rejected() {
        let f = fixture();
        let id = f
            .queue
            .enqueue(&RowPayload::new(Row::new("Ann", "", "Addr", "555")))
            .unwrap();
        let outcome = f.worker.process_by_id(id).unwrap();
        assert_eq!(outcome, Outcome::Rejected("row has an empty email".to_string()));
    }

    #[test]
    fn test_unknown_envelope_version_is_rejected() {
        let f = fixture();
        let payload = RowPayload::new(Row::new("Ann", "ann@x.com", "Addr", "555"));
        let mut envelope = Envelope::encode(&payload).unwrap();
        envelope.version = 7;
        let item = QueueItem {
            id: f.queue.enqueue(&payload).unwrap(),
            payload: envelope,
            enqueued_at: chrono::Utc::now(),
            claimed_until: None,
            attempts: 1,
            last_error: None,
        };

        let outcome = f.worker.process_item(&item).unwrap();
        match outcome {
            Outcome::Rejected(reason) => assert!(reason.contains("version 7")),
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[test]
    fn test_drain_tallies_outcomes() {
        let f = fixture();
        f.records
            .create(NewRecord::published(Row::new("Bob", "bob@x.com", "Addr", "555"), "system"))
            .unwrap();
        for row in [
            Row::new("Ann", "ann@x.com", "Addr", "555"),
            Row::new("Bob", "BOB@x.com", "Addr", "555"),
            Row::new("Cal", "", "Addr", "555"),
        ] {
            f.queue.enqueue(&RowPayload::new(row)).unwrap();
        }

        let report = f.worker.drain(10).unwrap();
        assert_eq!(
            report,
            DrainReport {
                created: 1,
                duplicates: 1,
                rejected: 1,
                failed: 0,
            }
        );
        // Only the rejected row is left behind.
        assert_eq!(f.queue.len().unwrap(), 1);
    }

    #[test]
    fn test_process_by_id_surfaces_queue_errors() {
        let f = fixture();
        let err = f.worker.process_by_id(ItemId(99)).unwrap_err();
        assert_eq!(err.status_code(), 404);

        let id = f
            .queue
            .enqueue(&RowPayload::new(Row::new("Ann", "ann@x.com", "Addr", "555")))
            .unwrap();
        f.queue.claim(1).unwrap();
        let err = f.worker.process_by_id(id).unwrap_err();
        assert_eq!(err.status_code(), 409);
    }
}
