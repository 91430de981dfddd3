//! Workflow engine gateway client.
//!
//! Wire contract (JSON, camelCase):
//!
//! | Operation | Request | Response |
//! |---|---|---|
//! | `POST /describe-execution` | `{executionHandle}` | `{status, error?, cause?}` |
//! | `POST /start-execution` | `{stateMachine, name, input}` | `{executionHandle}` |
//!
//! Describe is retried; start is sent once because a repeated start would
//! launch a second pipeline.

use serde::{Deserialize, Serialize};

use crate::retry::{send_once, send_with_retry};
use crate::{
    ClientSettings, ExecutionDescription, ExecutionRequest, ProviderError, ProviderFut,
    WorkflowLauncher, WorkflowStatusProvider, decode_outcome, http_client,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DescribeExecutionBody<'a> {
    execution_handle: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeExecutionResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    cause: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartExecutionBody<'a> {
    state_machine: &'a str,
    name: String,
    input: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PipelineInput<'a> {
    workload_id: &'a str,
    repository_name: String,
    original_repository_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartExecutionResponse {
    execution_handle: String,
}

/// Client for the workflow engine gateway.
#[derive(Debug, Clone)]
pub struct WorkflowClient {
    http: reqwest::Client,
    settings: ClientSettings,
    state_machine: Option<String>,
}

impl WorkflowClient {
    pub fn new(settings: ClientSettings, state_machine: Option<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            http: http_client(&settings)?,
            settings,
            state_machine: state_machine.filter(|s| !s.trim().is_empty()),
        })
    }

    async fn describe(&self, handle: &str) -> Result<ExecutionDescription, ProviderError> {
        let url = self.settings.endpoint("describe-execution")?;
        let body = DescribeExecutionBody {
            execution_handle: handle,
        };

        let outcome = send_with_retry(
            || {
                self.settings
                    .authorize(self.http.post(url.clone()))
                    .json(&body)
            },
            &self.settings.retry,
        )
        .await;
        let response: DescribeExecutionResponse =
            decode_outcome(outcome, self.settings.request_timeout).await?;

        let error = match (response.error, response.cause) {
            (Some(error), Some(cause)) => Some(format!("{error}: {cause}")),
            (error, cause) => error.or(cause),
        };

        Ok(ExecutionDescription {
            status: response.status,
            error,
        })
    }

    async fn start(&self, request: &ExecutionRequest) -> Result<String, ProviderError> {
        let Some(state_machine) = self.state_machine.as_deref() else {
            return Err(ProviderError::Misconfigured(vec![
                "workflow.state_machine".to_string(),
            ]));
        };
        let url = self.settings.endpoint("start-execution")?;

        let input = PipelineInput {
            workload_id: &request.workload_id,
            repository_name: request.workload_name.replace('/', "-"),
            original_repository_name: &request.workload_name,
        };
        let input = serde_json::to_string(&input)
            .map_err(|e| ProviderError::Rejected(format!("unencodable pipeline input: {e}")))?;
        let body = StartExecutionBody {
            state_machine,
            name: execution_name(&request.workload_id, chrono::Utc::now().timestamp_millis()),
            input,
        };

        let outcome = send_once(self.settings.authorize(self.http.post(url)).json(&body)).await;
        let response: StartExecutionResponse =
            decode_outcome(outcome, self.settings.request_timeout).await?;

        if response.execution_handle.trim().is_empty() {
            return Err(ProviderError::Decode(
                "engine returned an empty execution handle".to_string(),
            ));
        }
        Ok(response.execution_handle)
    }
}

/// Execution names must be unique per state machine and use a restricted
/// alphabet.
fn execution_name(workload_id: &str, millis: i64) -> String {
    let sanitized: String = workload_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("Validation-{sanitized}-{millis}")
}

impl WorkflowStatusProvider for WorkflowClient {
    fn describe_execution<'a>(&'a self, handle: &'a str) -> ProviderFut<'a, ExecutionDescription> {
        Box::pin(self.describe(handle))
    }
}

impl WorkflowLauncher for WorkflowClient {
    fn start_execution<'a>(&'a self, request: &'a ExecutionRequest) -> ProviderFut<'a, String> {
        Box::pin(self.start(request))
    }
}
