use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};
use sandlot_types::WorkloadRecord;

use crate::sqlite_util::open_secure_db;
use crate::{RecordStore, StoreError};

/// SQLite-backed record store.
///
/// Each workload is one row: the primary key, the alternate key, and the
/// whole record as JSON. The JSON column is the source of truth; `name` and
/// `last_updated` are copied out for indexing.
pub struct SqliteRecordStore {
    db: Mutex<Connection>,
}

impl SqliteRecordStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS workloads (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            record TEXT NOT NULL,
            last_updated TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_workloads_name
        ON workloads(name);
    ";

    /// Open or create the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = open_secure_db(path.as_ref())?;
        Self::initialize(db)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(db: Connection) -> Result<Self, StoreError> {
        db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;
        db.execute_batch(Self::SCHEMA)?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn decode(id: &str, json: &str) -> Result<WorkloadRecord, StoreError> {
        serde_json::from_str(json).map_err(|source| StoreError::Corrupt {
            id: id.to_string(),
            source,
        })
    }

    fn query_one(&self, sql: &str, key: &str) -> Result<Option<WorkloadRecord>, StoreError> {
        let db = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        let row: Option<(String, String)> = db
            .query_row(sql, params![key], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;
        row.map(|(id, json)| Self::decode(&id, &json)).transpose()
    }
}

impl RecordStore for SqliteRecordStore {
    fn get(&self, id: &str) -> Result<Option<WorkloadRecord>, StoreError> {
        self.query_one("SELECT id, record FROM workloads WHERE id = ?1", id)
    }

    fn get_by_alternate_key(&self, name: &str) -> Result<Option<WorkloadRecord>, StoreError> {
        if name.trim().is_empty() {
            return Ok(None);
        }
        self.query_one(
            "SELECT id, record FROM workloads WHERE name = ?1
             ORDER BY last_updated DESC LIMIT 1",
            name,
        )
    }

    fn save(&self, record: &WorkloadRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record).map_err(StoreError::Encode)?;
        let last_updated = record
            .last_updated
            .to_rfc3339_opts(chrono::SecondsFormat::Micros, true);

        let db = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        db.execute(
            "INSERT INTO workloads (id, name, record, last_updated)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                record = excluded.record,
                last_updated = excluded.last_updated",
            params![record.id.as_str(), record.name, json, last_updated],
        )?;
        tracing::trace!(workload_id = %record.id, "Saved workload record");
        Ok(())
    }
}
