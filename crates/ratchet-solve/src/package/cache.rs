use std::collections::HashMap;
use std::sync::Arc;

use super::record::{InstalledRecord, PackageRecord};

/// Identity of a package build
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub name: String,
    pub version: String,
    pub build: String,
    pub channel: Option<String>,
}

impl RecordKey {
    pub fn of(record: &PackageRecord) -> Self {
        Self {
            name: record.name.clone(),
            version: record.version.to_string(),
            build: record.build.clone(),
            channel: record.channel.clone(),
        }
    }
}

/// Conversions of installed records into the records handed to the solver engine.
///
/// Owned by the caller and cleared at the start of every resolution, so
/// nothing is memoised across environments.
#[derive(Debug, Default)]
pub struct RecordCache {
    records: HashMap<RecordKey, Arc<PackageRecord>>,
    hits: usize,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Solver-side record for an installed package, converted at most once per key
    pub fn solver_record(&mut self, installed: &InstalledRecord) -> Arc<PackageRecord> {
        let key = RecordKey::of(&installed.record);
        if let Some(record) = self.records.get(&key) {
            self.hits += 1;
            return Arc::clone(record);
        }
        let record = Arc::new(installed.record.clone());
        self.records.insert(key, Arc::clone(&record));
        record
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of lookups served without converting
    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.hits = 0;
    }
}
