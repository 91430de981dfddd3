//! The externally visible lifecycle operations.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sandlot_providers::{
    ContainerStatusProvider, ExecutionRequest, LaunchRequest, ProviderError, RuntimeBackend,
    TaskDescription, WorkflowLauncher, WorkflowStatusProvider,
};
use sandlot_store::{RecordStore, StoreError};
use sandlot_types::{
    AppStatus, HandleKind, TASK_RUNNING, TASK_STOPPED, TrackedHandle, WorkloadId, WorkloadRecord,
    classify, should_update_endpoint,
};
use serde::Serialize;

use crate::endpoint::{PRIVATE_ENDPOINT_NOTE, resolve_endpoint};
use crate::error::LifecycleError;
use crate::launcher::{LaunchOutcome, RuntimeLauncher, RuntimeTerminator};
use crate::reconciler::{Reconciler, RecordUpdate, StatusResult};
use crate::with_deadline;

/// Raw status reported when the scheduler could not be asked.
const STATUS_ERROR: &str = "ERROR";

/// External collaborators the service drives.
pub struct Collaborators {
    pub store: Arc<dyn RecordStore>,
    pub workflow: Arc<dyn WorkflowStatusProvider>,
    pub starter: Arc<dyn WorkflowLauncher>,
    pub containers: Arc<dyn ContainerStatusProvider>,
    pub runtime: Arc<dyn RuntimeBackend>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Port the launched container listens on.
    pub container_port: u16,
    /// Upper bound on any single provider call.
    pub call_deadline: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            container_port: 8000,
            call_deadline: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    pub success: bool,
    pub status: AppStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStatus {
    pub success: bool,
    pub running: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private_endpoint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_endpoint_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopOutcome {
    pub success: bool,
    pub task_handle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct LifecycleService {
    store: Arc<dyn RecordStore>,
    starter: Arc<dyn WorkflowLauncher>,
    containers: Arc<dyn ContainerStatusProvider>,
    reconciler: Reconciler,
    launcher: RuntimeLauncher,
    terminator: RuntimeTerminator,
    options: ServiceOptions,
}

impl LifecycleService {
    pub fn new(collaborators: Collaborators, options: ServiceOptions) -> Self {
        let Collaborators {
            store,
            workflow,
            starter,
            containers,
            runtime,
        } = collaborators;
        let deadline = options.call_deadline;
        Self {
            reconciler: Reconciler::new(workflow, containers.clone(), deadline),
            launcher: RuntimeLauncher::new(runtime.clone(), deadline),
            terminator: RuntimeTerminator::new(runtime, deadline),
            store,
            starter,
            containers,
            options,
        }
    }

    /// Reconcile the record with its substrate and report the result.
    pub async fn get_status(&self, workload_id: &str) -> Result<StatusResult, LifecycleError> {
        let id = parse_id(workload_id)?;
        let record = self
            .find(id.as_str(), id.as_str())?
            .ok_or_else(|| LifecycleError::NotFound(id.as_str().to_string()))?;

        let (result, update) = self.reconciler.reconcile(&record).await;
        if let RecordUpdate::Changed(updated) = update {
            tracing::info!(
                workload_id = %updated.id,
                status = %updated.status,
                verified = updated.verified,
                "Workload status changed"
            );
            self.save_logged(&updated, "status update");
        }
        Ok(result)
    }

    /// Start a verification pipeline, creating the record on first use.
    pub async fn start_verification(
        &self,
        workload_id: &str,
        name: Option<&str>,
    ) -> Result<VerificationOutcome, LifecycleError> {
        let id = parse_id(workload_id)?;
        let name = name.map(str::trim).filter(|name| !name.is_empty());

        let mut record = match self.find(id.as_str(), name.unwrap_or(id.as_str()))? {
            Some(record) => record,
            None => {
                tracing::info!(workload_id = %id, "Creating workload record");
                WorkloadRecord::new(id.clone(), name.unwrap_or_default(), Utc::now())
            }
        };
        if record.name.is_empty()
            && let Some(name) = name
        {
            record.name = name.to_string();
        }

        let request = ExecutionRequest {
            workload_id: record.id.as_str().to_string(),
            workload_name: if record.name.is_empty() {
                record.id.as_str().to_string()
            } else {
                record.name.clone()
            },
        };

        let started =
            with_deadline(self.options.call_deadline, self.starter.start_execution(&request))
                .await
                .and_then(|handle| {
                    TrackedHandle::execution(handle.as_str())
                        .map(|tracked| (handle, tracked))
                        .map_err(|_| {
                            ProviderError::Decode("workflow returned an empty handle".to_string())
                        })
                });

        match started {
            Ok((handle, tracked)) => {
                tracing::info!(workload_id = %record.id, handle = %handle, "Verification started");
                record.execution_handle = Some(tracked.into());
                record.status = AppStatus::Validating;
                record.touch(Utc::now());
                self.store.save(&record)?;
                Ok(VerificationOutcome {
                    success: true,
                    status: record.status,
                    execution_handle: Some(handle),
                    error: None,
                })
            }
            Err(error) => {
                tracing::warn!(workload_id = %record.id, error = %error, "Verification start failed");
                record.status = AppStatus::Error;
                record.touch(Utc::now());
                self.save_logged(&record, "verification failure");
                Ok(VerificationOutcome {
                    success: false,
                    status: record.status,
                    execution_handle: None,
                    error: Some(error.to_string()),
                })
            }
        }
    }

    /// Launch a runtime instance of a verified workload.
    pub async fn launch_runtime(&self, workload_id: &str) -> Result<LaunchOutcome, LifecycleError> {
        let id = parse_id(workload_id)?;
        let mut record = self
            .find(id.as_str(), id.as_str())?
            .ok_or_else(|| LifecycleError::NotFound(id.as_str().to_string()))?;

        if !record.verified {
            return Err(LifecycleError::NotVerified(record.id.as_str().to_string()));
        }
        let Some(artifact_ref) = record.artifact_ref.clone().filter(|a| !a.trim().is_empty()) else {
            return Err(LifecycleError::MissingArtifact(record.id.as_str().to_string()));
        };

        let request = LaunchRequest {
            workload_id: record.id.as_str().to_string(),
            workload_name: record.name.clone(),
            artifact_ref,
        };
        let outcome = self.launcher.launch(&request).await;

        if let Some(handle) = outcome.task_handle.as_deref() {
            match TrackedHandle::task(handle) {
                Ok(tracked) => {
                    record.task_handle = Some(tracked.into());
                    record.status = AppStatus::RunningPlayground;
                    record.touch(Utc::now());
                    self.save_logged(&record, "launch");
                }
                Err(_) => {
                    tracing::warn!(workload_id = %record.id, "Runtime backend returned an empty handle");
                }
            }
        }
        Ok(outcome)
    }

    /// Report the state of a runtime instance and record its endpoint once
    /// it is reachable.
    pub async fn get_runtime_status(
        &self,
        workload_id: &str,
        task_handle: &str,
    ) -> Result<RuntimeStatus, LifecycleError> {
        let id = parse_id(workload_id)?;
        let handle = require_handle(task_handle)?;

        let description =
            match with_deadline(self.options.call_deadline, self.containers.describe_task(handle))
                .await
            {
                Ok(description) => description,
                Err(error) => {
                    tracing::warn!(workload_id = %id, handle, error = %error, "Runtime status unavailable");
                    return Ok(RuntimeStatus {
                        success: false,
                        running: false,
                        status: STATUS_ERROR.to_string(),
                        endpoint: None,
                        is_private_endpoint: None,
                        private_endpoint_note: None,
                        error: Some(error.to_string()),
                    });
                }
            };

        Ok(self.runtime_status(&id, description))
    }

    fn runtime_status(&self, id: &WorkloadId, description: TaskDescription) -> RuntimeStatus {
        let mut status = RuntimeStatus {
            success: true,
            running: description.running,
            status: description.status,
            endpoint: None,
            is_private_endpoint: None,
            private_endpoint_note: None,
            error: None,
        };

        if let Some(failure) = description.failure {
            status.success = false;
            status.error = Some(failure);
            return status;
        }
        if status.status == TASK_STOPPED {
            status.success = false;
            status.error = description.stopped_reason;
            return status;
        }
        if status.status != TASK_RUNNING {
            return status;
        }

        let Some(resolved) = description
            .placement
            .as_ref()
            .and_then(|placement| resolve_endpoint(placement, self.options.container_port))
        else {
            return status;
        };

        match self.find(id.as_str(), id.as_str()) {
            Ok(Some(mut record)) => {
                if should_update_endpoint(&record.endpoint, &resolved.address) {
                    tracing::info!(workload_id = %id, endpoint = %resolved.address, "Recording endpoint");
                    record.endpoint = vec![resolved.stored_form()];
                    record.touch(Utc::now());
                    self.save_logged(&record, "endpoint update");
                }
            }
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(workload_id = %id, error = %error, "Record lookup failed");
            }
        }

        if resolved.is_private {
            status.private_endpoint_note = Some(PRIVATE_ENDPOINT_NOTE.to_string());
        }
        status.is_private_endpoint = Some(resolved.is_private);
        status.endpoint = Some(resolved.address);
        status
    }

    /// Request termination and reset the record, whatever the backend says.
    ///
    /// Only a slot holding a task handle is cleared. An unverified record
    /// keeps its status, since its pipeline is still the thing to track.
    pub async fn stop_runtime(
        &self,
        workload_id: &str,
        task_handle: &str,
    ) -> Result<StopOutcome, LifecycleError> {
        let id = parse_id(workload_id)?;
        let handle = require_handle(task_handle)?;

        let ack = self.terminator.stop(handle).await;

        match self.find(id.as_str(), id.as_str()) {
            Ok(Some(mut record)) => {
                if !record.clear_task_handle() {
                    tracing::debug!(workload_id = %record.id, handle, "Record holds no task handle");
                }
                if record.verified {
                    record.status = AppStatus::Verified;
                }
                record.touch(Utc::now());
                self.save_logged(&record, "stop");
            }
            Ok(None) => {
                tracing::debug!(workload_id = %id, handle, "Stopped runtime without a record");
            }
            Err(error) => {
                tracing::warn!(workload_id = %id, error = %error, "Record lookup failed");
            }
        }

        Ok(StopOutcome {
            success: ack.success,
            task_handle: handle.to_string(),
            error: ack.error,
        })
    }

    fn find(&self, id: &str, name: &str) -> Result<Option<WorkloadRecord>, StoreError> {
        if let Some(record) = self.store.get(id)? {
            return Ok(Some(record));
        }
        self.store.get_by_alternate_key(name)
    }

    fn save_logged(&self, record: &WorkloadRecord, action: &str) {
        if let Err(error) = self.store.save(record) {
            tracing::warn!(workload_id = %record.id, action, error = %error, "Record save failed");
        }
    }
}

fn parse_id(raw: &str) -> Result<WorkloadId, LifecycleError> {
    WorkloadId::new(raw)
        .map_err(|_| LifecycleError::InvalidRequest("workload id is required".to_string()))
}

fn require_handle(raw: &str) -> Result<&str, LifecycleError> {
    match classify(raw) {
        HandleKind::Empty => Err(LifecycleError::InvalidHandle(
            "task handle is required".to_string(),
        )),
        HandleKind::Execution | HandleKind::Task => Ok(raw.trim()),
    }
}
