//! Lifecycle status reconciliation.
//!
//! Given a record, decide which substrate to ask, ask it, and fold the answer
//! into the record. Reconciling twice against unchanged external state yields
//! [`RecordUpdate::Unchanged`] the second time.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sandlot_providers::{ContainerStatusProvider, ProviderError, WorkflowStatusProvider};
use sandlot_types::{AppStatus, Substrate, WorkloadRecord, map_workflow_status};
use serde::Serialize;

use crate::with_deadline;

pub const NO_ACTIVE_PIPELINE: &str = "no active pipeline";

/// Outcome of one status check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResult {
    pub status: AppStatus,
    pub raw_substrate_status: Option<String>,
    pub verified: bool,
    pub substrate_used: Option<Substrate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub message: String,
}

/// Whether reconciliation produced a record that must be written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordUpdate {
    Unchanged,
    Changed(WorkloadRecord),
}

pub struct Reconciler {
    workflow: Arc<dyn WorkflowStatusProvider>,
    containers: Arc<dyn ContainerStatusProvider>,
    deadline: Duration,
}

impl Reconciler {
    pub fn new(
        workflow: Arc<dyn WorkflowStatusProvider>,
        containers: Arc<dyn ContainerStatusProvider>,
        deadline: Duration,
    ) -> Self {
        Self {
            workflow,
            containers,
            deadline,
        }
    }

    pub async fn reconcile(&self, record: &WorkloadRecord) -> (StatusResult, RecordUpdate) {
        let handles = record.effective_handles();

        if let Some(execution) = handles.execution.as_deref() {
            let described = with_deadline(
                self.deadline,
                self.workflow.describe_execution(execution),
            )
            .await;

            match described {
                Ok(description) => {
                    tracing::debug!(
                        workload_id = %record.id,
                        handle = execution,
                        substrate = %Substrate::Execution,
                        status = %description.status,
                        "Workflow status"
                    );
                    return fold_workflow_status(record, &description.status, description.error);
                }
                Err(error) => {
                    tracing::warn!(
                        workload_id = %record.id,
                        handle = execution,
                        error = %error,
                        "Workflow status unavailable"
                    );
                    return match handles.task.as_deref() {
                        Some(task) => self.check_container(record, task, Some(&error)).await,
                        None => (
                            unavailable(record, Substrate::Execution, &error),
                            RecordUpdate::Unchanged,
                        ),
                    };
                }
            }
        }

        if let Some(task) = handles.task.as_deref() {
            return self.check_container(record, task, None).await;
        }

        (
            StatusResult {
                status: record.status.clone(),
                raw_substrate_status: None,
                verified: record.verified,
                substrate_used: None,
                error: None,
                message: NO_ACTIVE_PIPELINE.to_string(),
            },
            RecordUpdate::Unchanged,
        )
    }

    /// Container answers never change the application status.
    async fn check_container(
        &self,
        record: &WorkloadRecord,
        task: &str,
        workflow_error: Option<&ProviderError>,
    ) -> (StatusResult, RecordUpdate) {
        match with_deadline(self.deadline, self.containers.describe_task(task)).await {
            Ok(description) => {
                tracing::debug!(
                    workload_id = %record.id,
                    handle = task,
                    substrate = %Substrate::Task,
                    status = %description.status,
                    "Container status"
                );
                let message = match workflow_error {
                    Some(_) => format!(
                        "workflow status unavailable; container task is {}",
                        description.status
                    ),
                    None => format!("container task is {}", description.status),
                };
                (
                    StatusResult {
                        status: record.status.clone(),
                        raw_substrate_status: Some(description.status),
                        verified: record.verified,
                        substrate_used: Some(Substrate::Task),
                        error: None,
                        message,
                    },
                    RecordUpdate::Unchanged,
                )
            }
            Err(error) => {
                tracing::warn!(
                    workload_id = %record.id,
                    handle = task,
                    error = %error,
                    "Container status unavailable"
                );
                let mut result = unavailable(record, Substrate::Task, &error);
                if let Some(workflow_error) = workflow_error {
                    result.error = Some(format!("workflow: {workflow_error}; container: {error}"));
                }
                (result, RecordUpdate::Unchanged)
            }
        }
    }
}

fn fold_workflow_status(
    record: &WorkloadRecord,
    raw: &str,
    error: Option<String>,
) -> (StatusResult, RecordUpdate) {
    let mut mapping = map_workflow_status(raw);
    // A finished pipeline does not demote a running playground.
    if mapping.marks_verified && record.verified && record.status == AppStatus::RunningPlayground {
        mapping.status = AppStatus::RunningPlayground;
    }
    let verified = record.verified || mapping.marks_verified;
    let changed = mapping.status != record.status || verified != record.verified;

    let result = StatusResult {
        status: mapping.status.clone(),
        raw_substrate_status: Some(raw.to_string()),
        verified,
        substrate_used: Some(Substrate::Execution),
        error,
        message: format!("workflow execution is {raw}"),
    };

    if !changed {
        return (result, RecordUpdate::Unchanged);
    }

    let mut updated = record.clone();
    updated.status = mapping.status;
    updated.verified = verified;
    updated.touch(Utc::now());
    (result, RecordUpdate::Changed(updated))
}

/// An `ERROR` answer that is reported but never persisted.
fn unavailable(record: &WorkloadRecord, substrate: Substrate, error: &ProviderError) -> StatusResult {
    StatusResult {
        status: AppStatus::Error,
        raw_substrate_status: None,
        verified: record.verified,
        substrate_used: Some(substrate),
        error: Some(error.to_string()),
        message: format!("{substrate} status unavailable"),
    }
}
