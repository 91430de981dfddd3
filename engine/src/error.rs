use sandlot_store::StoreError;
use thiserror::Error;

/// Failures that end a lifecycle request before it produces a body.
///
/// Upstream substrate failures are not here: they are reported inside the
/// response as an `ERROR` status or `success = false`.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("workload not found: {0}")]
    NotFound(String),
    #[error("invalid handle: {0}")]
    InvalidHandle(String),
    #[error("workload {0} has not been verified")]
    NotVerified(String),
    #[error("workload {0} has no runtime artifact")]
    MissingArtifact(String),
    #[error("record store failure: {0}")]
    Store(#[from] StoreError),
}

impl LifecycleError {
    /// Whether the caller sent something unusable.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_)
                | Self::InvalidHandle(_)
                | Self::NotVerified(_)
                | Self::MissingArtifact(_)
        )
    }
}
