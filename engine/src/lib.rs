//! Workload lifecycle engine for Sandlot.
//!
//! [`LifecycleService`] is the entry point: it looks records up in the
//! [`RecordStore`](sandlot_store::RecordStore), asks the workflow engine or the
//! container scheduler what is actually happening, and folds the answer back
//! into the record.
//!
//! Upstream substrate failures never become errors here. They are reported in
//! the response body as an `ERROR` status or `success = false`; only bad input,
//! missing records, and store read faults surface as [`LifecycleError`].

mod endpoint;
mod error;
mod launcher;
mod reconciler;
mod service;
#[cfg(test)]
mod test_support;

use std::future::Future;
use std::time::Duration;

use sandlot_providers::ProviderError;

pub use endpoint::{
    PRIVATE_ADDRESS_ANNOTATION, PRIVATE_ENDPOINT_NOTE, ResolvedEndpoint, is_private_address,
    resolve_endpoint,
};
pub use error::LifecycleError;
pub use launcher::{LaunchOutcome, RuntimeLauncher, RuntimeTerminator, StopAck};
pub use reconciler::{NO_ACTIVE_PIPELINE, Reconciler, RecordUpdate, StatusResult};
pub use service::{
    Collaborators, LifecycleService, RuntimeStatus, ServiceOptions, StopOutcome,
    VerificationOutcome,
};

/// Bound a provider call by `deadline`, on top of the client's own timeout.
pub(crate) async fn with_deadline<T>(
    deadline: Duration,
    call: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, ProviderError> {
    tokio::time::timeout(deadline, call)
        .await
        .unwrap_or(Err(ProviderError::Timeout(deadline)))
}
