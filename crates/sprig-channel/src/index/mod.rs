//! In-memory package index
//!
//! Holds every record loaded from every channel. Records are immutable and
//! shared; each keeps the sequence number it was inserted with, which is the
//! final tie-break when ranking candidates.

use std::collections::BTreeMap;
use std::sync::Arc;

use sprig_core::{PackageRecord, RecordKey};
use tracing::debug;

/// Records keyed by identity, with a per-name lookup in insertion order
#[derive(Debug, Clone, Default)]
pub struct Index {
    /// Records in insertion order; the position is the sequence number
    records: Vec<Arc<PackageRecord>>,
    /// Identity key to sequence number
    keys: BTreeMap<RecordKey, usize>,
    /// Package name to sequence numbers, in insertion order
    by_name: BTreeMap<String, Vec<usize>>,
}

impl Index {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from records, in order
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = PackageRecord>,
    {
        let mut index = Self::new();
        for record in records {
            index.insert(record);
        }
        index
    }

    /// Insert a record. Returns `false` if a record with the same identity
    /// (name, version, build, channel) is already present; the first one wins.
    pub fn insert(&mut self, record: PackageRecord) -> bool {
        let key = record.key();
        if self.keys.contains_key(&key) {
            debug!("Skipping duplicate record {}", key);
            return false;
        }

        let seq = self.records.len();
        self.by_name.entry(record.name.clone()).or_default().push(seq);
        self.keys.insert(key, seq);
        self.records.push(Arc::new(record));
        true
    }

    /// Look up a record by identity
    pub fn get(&self, key: &RecordKey) -> Option<&Arc<PackageRecord>> {
        self.keys.get(key).map(|&seq| &self.records[seq])
    }

    /// Insertion sequence number of a record
    pub fn sequence(&self, key: &RecordKey) -> Option<usize> {
        self.keys.get(key).copied()
    }

    /// Records with the given name, in insertion order, with their sequence numbers
    pub fn named<'a>(&'a self, name: &str) -> impl Iterator<Item = (usize, &'a Arc<PackageRecord>)> + 'a {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .map(move |&seq| (seq, &self.records[seq]))
    }

    /// All records in insertion order, with their sequence numbers
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Arc<PackageRecord>)> {
        self.records.iter().enumerate()
    }

    /// Distinct package names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// Whether any record has this name
    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
