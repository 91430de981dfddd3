//! Core domain types for Sandlot.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod handle;
mod ids;
mod placement;
mod record;
mod status;

pub use handle::{
    EXECUTION_MARKER, EffectiveHandles, HandleError, HandleKind, STATE_MACHINE_MARKER,
    StoredHandle, TrackedHandle, classify,
};
pub use ids::{EmptyWorkloadIdError, WorkloadId};
pub use placement::{
    AttachmentDetail, NETWORK_INTERFACE_ATTACHMENT, NETWORK_INTERFACE_ID_DETAIL, NetworkAttachment,
    PRIVATE_IPV4_DETAIL, PlacementInfo,
};
pub use record::{WorkloadRecord, should_update_endpoint};
pub use status::{
    AppStatus, Substrate, TASK_RUNNING, TASK_STOPPED, WORKFLOW_ABORTED, WORKFLOW_FAILED,
    WORKFLOW_RUNNING, WORKFLOW_SUCCEEDED, WORKFLOW_TIMED_OUT, WorkflowMapping, is_task_running,
    map_workflow_status,
};
