//! Application status vocabulary and the substrate status mapping.
//!
//! The workflow engine and the container scheduler each report their own raw
//! status strings. Only workflow statuses are folded into [`AppStatus`]; the
//! scheduler's vocabulary is surfaced as-is together with a `running` flag.
//!
//! | Workflow status | Application status |
//! |---|---|
//! | `RUNNING` | `VALIDATING` |
//! | `SUCCEEDED` | `VERIFIED` (+ `verified = true`) |
//! | `FAILED` / `TIMED_OUT` / `ABORTED` | `FAILED` |
//! | anything else | passthrough of the raw string |

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Raw workflow status reported for an in-flight execution.
pub const WORKFLOW_RUNNING: &str = "RUNNING";
pub const WORKFLOW_SUCCEEDED: &str = "SUCCEEDED";
pub const WORKFLOW_FAILED: &str = "FAILED";
pub const WORKFLOW_TIMED_OUT: &str = "TIMED_OUT";
pub const WORKFLOW_ABORTED: &str = "ABORTED";

/// Raw scheduler status of a task that is up.
pub const TASK_RUNNING: &str = "RUNNING";
/// Raw scheduler status of a task that has exited.
pub const TASK_STOPPED: &str = "STOPPED";

/// Application-level status stored on a workload record.
///
/// `Other` carries workflow statuses that have no dedicated variant. Equality
/// and hashing go through [`AppStatus::as_str`], so `Other("VERIFIED")` and
/// `Verified` are the same status; this keeps the string round-trip through
/// the store lossless.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AppStatus {
    #[default]
    Unknown,
    Validating,
    Verified,
    Failed,
    RunningPlayground,
    Error,
    Other(String),
}

impl AppStatus {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Validating => "VALIDATING",
            Self::Verified => "VERIFIED",
            Self::Failed => "FAILED",
            Self::RunningPlayground => "RUNNING_PLAYGROUND",
            Self::Error => "ERROR",
            Self::Other(raw) => raw,
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "UNKNOWN" | "" => Self::Unknown,
            "VALIDATING" => Self::Validating,
            "VERIFIED" => Self::Verified,
            "FAILED" => Self::Failed,
            "RUNNING_PLAYGROUND" => Self::RunningPlayground,
            "ERROR" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }
}

impl PartialEq for AppStatus {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for AppStatus {}

impl Hash for AppStatus {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl From<String> for AppStatus {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<&str> for AppStatus {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<AppStatus> for String {
    fn from(value: AppStatus) -> Self {
        match value {
            AppStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which external substrate produced a status answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Substrate {
    /// The multi-step workflow engine running the build/verify pipeline.
    Execution,
    /// The ad-hoc container scheduler running playground tasks.
    Task,
}

impl Substrate {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Execution => "execution",
            Self::Task => "task",
        }
    }
}

impl fmt::Display for Substrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of folding a workflow status into the application vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowMapping {
    pub status: AppStatus,
    /// Set when the pipeline succeeded; the record's `verified` flag latches on.
    pub marks_verified: bool,
}

/// Map a raw workflow execution status to an application status.
///
/// Total over all strings. Unknown statuses pass through unchanged so that a
/// new engine state is visible to callers instead of being collapsed.
#[must_use]
pub fn map_workflow_status(raw: &str) -> WorkflowMapping {
    match raw {
        WORKFLOW_RUNNING => WorkflowMapping {
            status: AppStatus::Validating,
            marks_verified: false,
        },
        WORKFLOW_SUCCEEDED => WorkflowMapping {
            status: AppStatus::Verified,
            marks_verified: true,
        },
        WORKFLOW_FAILED | WORKFLOW_TIMED_OUT | WORKFLOW_ABORTED => WorkflowMapping {
            status: AppStatus::Failed,
            marks_verified: false,
        },
        other => WorkflowMapping {
            status: AppStatus::parse(other),
            marks_verified: false,
        },
    }
}

/// Whether a raw scheduler status means the task is up.
#[must_use]
pub fn is_task_running(raw: &str) -> bool {
    raw == TASK_RUNNING
}
