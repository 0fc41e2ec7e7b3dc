//! Domain records and the store they live in.
//!
//! [`RecordStore`] is the seam the ingestion pipeline and worker depend on.
//! [`FileRecordStore`] keeps one JSON file per record type under
//! `{data_dir}/records/`.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::persist::JsonFile;
use crate::row::{NaturalKey, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Inactive,
}

/// A persisted domain record, one per accepted row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub record_type: String,
    pub title: String,
    pub name: String,
    pub email: String,
    pub address: String,
    pub contact_no: String,
    pub status: RecordStatus,
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

impl Record {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(&self.name, &self.email)
    }
}

/// Input for [`RecordStore::create`]: row fields mapped 1:1.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub row: Row,
    pub status: RecordStatus,
    pub owner: String,
}

impl NewRecord {
    /// A published record owned by `owner`.
    pub fn published(row: Row, owner: impl Into<String>) -> Self {
        Self {
            row,
            status: RecordStatus::Active,
            owner: owner.into(),
        }
    }
}

/// Storage for domain records of a single type.
pub trait RecordStore: Send + Sync {
    fn record_type(&self) -> &str;

    /// All records of this store's type.
    fn list(&self) -> Result<Vec<Record>>;

    fn get(&self, id: RecordId) -> Result<Option<Record>>;

    /// Exact match on `{name, lower(email)}`.
    fn find_by_key(&self, key: &NaturalKey) -> Result<Option<Record>> {
        Ok(self.list()?.into_iter().find(|r| &r.natural_key() == key))
    }

    fn create(&self, new: NewRecord) -> Result<Record>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecordFile {
    next_id: u64,
    records: Vec<Record>,
}

/// JSON-file-backed [`RecordStore`].
///
/// Holds no records in memory; every call goes to the file under its lock,
/// so a store opened by another process on the same directory stays in step.
pub struct FileRecordStore {
    record_type: String,
    file: JsonFile,
}

impl FileRecordStore {
    /// Open (or create) the store for `record_type` under `data_dir`.
    pub fn open(data_dir: &Path, record_type: &str) -> Result<Self> {
        let file = JsonFile::new(data_dir.join("records").join(format!("{}.json", record_type)));
        let state: RecordFile = file.read()?;
        info!(
            record_type,
            count = state.records.len(),
            "record store opened at {}",
            file.path().display()
        );
        Ok(Self {
            record_type: record_type.to_string(),
            file,
        })
    }

    fn load(&self) -> Result<RecordFile> {
        self.file.read()
    }
}

impl RecordStore for FileRecordStore {
    fn record_type(&self) -> &str {
        &self.record_type
    }

    fn list(&self) -> Result<Vec<Record>> {
        Ok(self.load()?.records)
    }

    fn get(&self, id: RecordId) -> Result<Option<Record>> {
        Ok(self.load()?.records.into_iter().find(|r| r.id == id))
    }

    fn find_by_key(&self, key: &NaturalKey) -> Result<Option<Record>> {
        Ok(self
            .load()?
            .records
            .into_iter()
            .find(|r| &r.natural_key() == key))
    }

    fn create(&self, new: NewRecord) -> Result<Record> {
        self.file.update(|state: &mut RecordFile| -> Result<Record> {
            let id = RecordId(state.next_id.max(1));
            let record = Record {
                id,
                record_type: self.record_type.clone(),
                title: new.row.name.clone(),
                name: new.row.name,
                email: new.row.email,
                address: new.row.address,
                contact_no: new.row.contact_no,
                status: new.status,
                owner: new.owner,
                created_at: Utc::now(),
            };
            state.records.push(record.clone());
            state.next_id = id.0 + 1;
            Ok(record)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Row {
        Row::new("Alice", "Alice@X.com", "1 Main St", "555-1111")
    }

    #[test]
    fn test_create_maps_row_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileRecordStore::open(tmp.path(), "contact").unwrap();

        let record = store.create(NewRecord::published(alice(), "system")).unwrap();
        assert_eq!(record.id, RecordId(1));
        assert_eq!(record.title, "Alice");
        assert_eq!(record.email, "Alice@X.com");
        assert_eq!(record.status, RecordStatus::Active);
        assert_eq!(record.owner, "system");
        assert_eq!(record.record_type, "contact");
    }

    #[test]
    fn test_records_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let store = FileRecordStore::open(tmp.path(), "contact").unwrap();
            store.create(NewRecord::published(alice(), "system")).unwrap();
        }
        let store = FileRecordStore::open(tmp.path(), "contact").unwrap();
        assert_eq!(store.list().unwrap().len(), 1);

        let second = store
            .create(NewRecord::published(Row::new("Bob", "bob@x.com", "", ""), "system"))
            .unwrap();
        assert_eq!(second.id, RecordId(2));
        assert!(store.get(RecordId(2)).unwrap().is_some());
    }

    #[test]
    fn test_find_by_key_ignores_email_case() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileRecordStore::open(tmp.path(), "contact").unwrap();
        store.create(NewRecord::published(alice(), "system")).unwrap();

        let key = NaturalKey::new("Alice", "alice@x.com");
        assert!(store.find_by_key(&key).unwrap().is_some());
        assert!(store.find_by_key(&NaturalKey::new("Bob", "alice@x.com")).unwrap().is_none());
    }

    #[test]
    fn test_record_types_are_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let contacts = FileRecordStore::open(tmp.path(), "contact").unwrap();
        let leads = FileRecordStore::open(tmp.path(), "lead").unwrap();
        contacts.create(NewRecord::published(alice(), "system")).unwrap();
        assert!(leads.list().unwrap().is_empty());
    }

    #[test]
    fn test_two_stores_on_one_directory_share_records() {
        let tmp = tempfile::tempdir().unwrap();
        let worker_side = FileRecordStore::open(tmp.path(), "contact").unwrap();
        let server_side = FileRecordStore::open(tmp.path(), "contact").unwrap();

        let ann = worker_side
            .create(NewRecord::published(Row::new("Ann", "ann@x.com", "", ""), "system"))
            .unwrap();
        let ben = server_side
            .create(NewRecord::published(Row::new("Ben", "ben@x.com", "", ""), "system"))
            .unwrap();
        assert_eq!((ann.id, ben.id), (RecordId(1), RecordId(2)));

        // Each side sees what the other wrote, including for dedup lookups.
        assert!(server_side
            .find_by_key(&NaturalKey::new("Ann", "ann@x.com"))
            .unwrap()
            .is_some());
        let reopened = FileRecordStore::open(tmp.path(), "contact").unwrap();
        let names: Vec<String> = reopened.list().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Ann", "Ben"]);
    }
}
