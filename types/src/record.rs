//! The durable workload record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::handle::{EffectiveHandles, HandleKind, StoredHandle};
use crate::ids::WorkloadId;
use crate::status::AppStatus;

/// One record per workload.
///
/// The serialized form is camelCase and is what the store persists, so field
/// renames here are schema changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadRecord {
    pub id: WorkloadId,
    /// Alternate lookup key, e.g. `owner/repo`.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub status: AppStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_handle: Option<StoredHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_handle: Option<StoredHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_ref: Option<String>,
    #[serde(default)]
    pub endpoint: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl WorkloadRecord {
    /// A fresh record with no handles, as created on the first verification.
    #[must_use]
    pub fn new(id: WorkloadId, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            verified: false,
            status: AppStatus::Unknown,
            execution_handle: None,
            task_handle: None,
            artifact_ref: None,
            endpoint: Vec::new(),
            last_updated: now,
        }
    }

    #[must_use]
    pub fn effective_handles(&self) -> EffectiveHandles {
        EffectiveHandles::resolve(self.execution_handle.as_ref(), self.task_handle.as_ref())
    }

    /// Drop the slot holding the task handle and report whether one was held.
    ///
    /// Slots are picked the way [`EffectiveHandles::resolve`] picks the task
    /// handle. A slot that classifies as an execution is never cleared.
    pub fn clear_task_handle(&mut self) -> bool {
        let holds_task =
            |slot: Option<&StoredHandle>| slot.is_some_and(|h| h.kind() == HandleKind::Task);
        if holds_task(self.task_handle.as_ref()) {
            self.task_handle = None;
            true
        } else if holds_task(self.execution_handle.as_ref()) {
            self.execution_handle = None;
            true
        } else {
            false
        }
    }

    /// Record a mutation time.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated = now;
    }
}

/// Whether an observed endpoint should replace the stored one.
///
/// Rewrites when nothing is stored, or when the stored first entry does not
/// start with the observed address. Stored values may carry an annotation
/// after the address, which is why this is a prefix test.
#[must_use]
pub fn should_update_endpoint(stored: &[String], observed: &str) -> bool {
    match stored.first() {
        None => true,
        Some(current) => !current.starts_with(observed),
    }
}
