//! Runtime launch and termination.
//!
//! Backend failures never escape as errors: they come back as an outcome with
//! `success = false` so the caller can report them in-band.

use std::sync::Arc;
use std::time::Duration;

use sandlot_providers::{LaunchRequest, RuntimeBackend};
use serde::Serialize;

use crate::with_deadline;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct RuntimeLauncher {
    backend: Arc<dyn RuntimeBackend>,
    deadline: Duration,
}

impl RuntimeLauncher {
    pub fn new(backend: Arc<dyn RuntimeBackend>, deadline: Duration) -> Self {
        Self { backend, deadline }
    }

    pub async fn launch(&self, request: &LaunchRequest) -> LaunchOutcome {
        match with_deadline(self.deadline, self.backend.launch(request)).await {
            Ok(handle) => {
                tracing::info!(
                    workload_id = %request.workload_id,
                    handle = %handle,
                    "Runtime launched"
                );
                LaunchOutcome {
                    success: true,
                    task_handle: Some(handle),
                    error: None,
                }
            }
            Err(error) => {
                tracing::warn!(
                    workload_id = %request.workload_id,
                    error = %error,
                    "Runtime launch failed"
                );
                LaunchOutcome {
                    success: false,
                    task_handle: None,
                    error: Some(error.to_string()),
                }
            }
        }
    }
}

pub struct RuntimeTerminator {
    backend: Arc<dyn RuntimeBackend>,
    deadline: Duration,
}

impl RuntimeTerminator {
    pub fn new(backend: Arc<dyn RuntimeBackend>, deadline: Duration) -> Self {
        Self { backend, deadline }
    }

    pub async fn stop(&self, handle: &str) -> StopAck {
        match with_deadline(self.deadline, self.backend.stop(handle)).await {
            Ok(()) => {
                tracing::info!(handle, "Runtime stopped");
                StopAck {
                    success: true,
                    error: None,
                }
            }
            Err(error) => {
                tracing::warn!(handle, error = %error, "Runtime stop failed");
                StopAck {
                    success: false,
                    error: Some(error.to_string()),
                }
            }
        }
    }
}
