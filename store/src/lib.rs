//! Workload record persistence.
//!
//! [`RecordStore`] is the only interface the engine sees. Two
//! implementations ship here:
//!
//! - [`SqliteRecordStore`] - durable, one row per workload
//! - [`MemoryRecordStore`] - process-local, for tests and dry runs
//!
//! Saves are full-record upserts. There is no version column: concurrent
//! writers race and the last save wins.

mod memory;
mod sqlite;
mod sqlite_util;

use std::path::PathBuf;

use sandlot_types::WorkloadRecord;
use thiserror::Error;

pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("corrupt record {id}: {source}")]
    Corrupt {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("record store lock poisoned")]
    Poisoned,
}

/// Durable key-value persistence for workload records.
pub trait RecordStore: Send + Sync {
    /// Look up a record by its primary key.
    fn get(&self, id: &str) -> Result<Option<WorkloadRecord>, StoreError>;

    /// Look up a record by its `name`. When several records share a name the
    /// most recently updated one is returned.
    fn get_by_alternate_key(&self, name: &str) -> Result<Option<WorkloadRecord>, StoreError>;

    /// Insert or fully replace the record with the same id.
    fn save(&self, record: &WorkloadRecord) -> Result<(), StoreError>;
}
