//! Execution handle classification.
//!
//! Records carry two handle slots, `execution_handle` and `task_handle`.
//! Older records stored the workflow execution handle in `task_handle`, so the
//! field name cannot be trusted: a bare string is classified by its shape.
//!
//! New writes store a [`StoredHandle::Tagged`] value whose kind is fixed at
//! creation. Bare strings deserialize as [`StoredHandle::Legacy`] and are
//! only ever interpreted through [`classify`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Segment present in every state-machine resource identifier.
pub const STATE_MACHINE_MARKER: &str = ":states:";
/// Segment present in identifiers of a single state-machine execution.
pub const EXECUTION_MARKER: &str = ":execution:";

/// Shape of an opaque handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Execution,
    Task,
    Empty,
}

/// Classify a raw handle string.
///
/// The rule is inherited from the records already in the store and must not
/// change without a migration: a handle is an execution iff it contains both
/// [`STATE_MACHINE_MARKER`] and [`EXECUTION_MARKER`]. Any other non-blank
/// string is a task handle.
#[must_use]
pub fn classify(raw: &str) -> HandleKind {
    if raw.contains(STATE_MACHINE_MARKER) && raw.contains(EXECUTION_MARKER) {
        HandleKind::Execution
    } else if raw.trim().is_empty() {
        HandleKind::Empty
    } else {
        HandleKind::Task
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandleError {
    #[error("handle must not be empty")]
    Empty,
}

/// A handle whose kind was decided when it was issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum TrackedHandle {
    Execution(String),
    Task(String),
}

impl TrackedHandle {
    /// Wrap a workflow execution handle.
    pub fn execution(raw: impl Into<String>) -> Result<Self, HandleError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(HandleError::Empty);
        }
        Ok(Self::Execution(raw))
    }

    /// Wrap a container task handle.
    pub fn task(raw: impl Into<String>) -> Result<Self, HandleError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(HandleError::Empty);
        }
        Ok(Self::Task(raw))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Execution(raw) | Self::Task(raw) => raw,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> HandleKind {
        match self {
            Self::Execution(_) => HandleKind::Execution,
            Self::Task(_) => HandleKind::Task,
        }
    }
}

/// Handle slot as persisted on a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredHandle {
    Tagged(TrackedHandle),
    /// Bare string from a record written before handles were tagged.
    Legacy(String),
}

impl StoredHandle {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Tagged(handle) => handle.as_str(),
            Self::Legacy(raw) => raw,
        }
    }

    /// Kind of this handle: the tag when present, the shape otherwise.
    #[must_use]
    pub fn kind(&self) -> HandleKind {
        match self {
            Self::Tagged(handle) => handle.kind(),
            Self::Legacy(raw) => classify(raw),
        }
    }
}

impl From<TrackedHandle> for StoredHandle {
    fn from(value: TrackedHandle) -> Self {
        Self::Tagged(value)
    }
}

/// The handles that actually drive reconciliation for one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveHandles {
    pub execution: Option<String>,
    pub task: Option<String>,
}

impl EffectiveHandles {
    /// Resolve the effective handles from both record slots.
    ///
    /// The execution handle is taken from `execution_handle` when it
    /// classifies as an execution, otherwise from `task_handle`. The task
    /// handle is the first slot (task slot first) that classifies as a task
    /// and was not claimed as the execution handle.
    #[must_use]
    pub fn resolve(
        execution_handle: Option<&StoredHandle>,
        task_handle: Option<&StoredHandle>,
    ) -> Self {
        let is_kind = |slot: Option<&StoredHandle>, kind: HandleKind| {
            slot.filter(|handle| handle.kind() == kind)
                .map(|handle| handle.as_str().to_string())
        };

        let execution = is_kind(execution_handle, HandleKind::Execution)
            .or_else(|| is_kind(task_handle, HandleKind::Execution));
        let task = is_kind(task_handle, HandleKind::Task)
            .or_else(|| is_kind(execution_handle, HandleKind::Task));

        Self { execution, task }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.execution.is_none() && self.task.is_none()
    }
}
