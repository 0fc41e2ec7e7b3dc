//! Snapshot index of natural keys for duplicate detection.
//!
//! Built once per ingestion run from the records that exist at that moment.
//! Records created by other actors after the snapshot are not seen; the
//! worker's pre-create check covers that window.

use std::collections::HashSet;

use intake_core::{NaturalKey, Record, RecordStore};

use crate::error::IngestError;

#[derive(Debug, Default, Clone)]
pub struct DedupIndex {
    keys: HashSet<NaturalKey>,
}

impl DedupIndex {
    pub fn build<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        Self {
            keys: records.into_iter().map(Record::natural_key).collect(),
        }
    }

    /// Snapshot every record currently in `store`.
    pub fn from_store(store: &dyn RecordStore) -> Result<Self, IngestError> {
        let records = store.list()?;
        Ok(Self::build(&records))
    }

    pub fn contains(&self, key: &NaturalKey) -> bool {
        self.keys.contains(key)
    }

    /// Add a key; returns `false` if it was already present.
    pub fn insert(&mut self, key: NaturalKey) -> bool {
        self.keys.insert(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::{FileRecordStore, NewRecord, Row};

    #[test]
    fn test_empty_store_gives_empty_index() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileRecordStore::open(tmp.path(), "contact").unwrap();
        let index = DedupIndex::from_store(&store).unwrap();
        assert!(index.is_empty());
        assert!(!index.contains(&NaturalKey::new("Bob", "bob@x.com")));
    }

    #[test]
    fn test_lookup_is_case_insensitive_on_email_only() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileRecordStore::open(tmp.path(), "contact").unwrap();
        store
            .create(NewRecord::published(Row::new("Bob", "Bob@X.com", "Addr", "555"), "system"))
            .unwrap();

        let index = DedupIndex::from_store(&store).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.contains(&NaturalKey::new("Bob", "bob@x.com")));
        assert!(!index.contains(&NaturalKey::new("bob", "bob@x.com")));
    }

    #[test]
    fn test_insert_reports_repeats() {
        let mut index = DedupIndex::default();
        assert!(index.insert(NaturalKey::new("Ann", "ann@x.com")));
        assert!(!index.insert(NaturalKey::new("Ann", "ANN@x.com")));
    }
}
