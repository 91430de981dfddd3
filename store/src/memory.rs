use std::collections::HashMap;
use std::sync::RwLock;

use sandlot_types::WorkloadRecord;

use crate::{RecordStore, StoreError};

/// Process-local record store.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<String, WorkloadRecord>>,
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = WorkloadRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.id.as_str().to_string(), record))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, id: &str) -> Result<Option<WorkloadRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records.get(id).cloned())
    }

    fn get_by_alternate_key(&self, name: &str) -> Result<Option<WorkloadRecord>, StoreError> {
        if name.trim().is_empty() {
            return Ok(None);
        }
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records
            .values()
            .filter(|record| record.name == name)
            .max_by_key(|record| record.last_updated)
            .cloned())
    }

    fn save(&self, record: &WorkloadRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        records.insert(record.id.as_str().to_string(), record.clone());
        Ok(())
    }
}
