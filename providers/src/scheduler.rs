//! Container scheduler gateway client.
//!
//! Wire contract (JSON, camelCase):
//!
//! | Operation | Request | Response |
//! |---|---|---|
//! | `POST /describe-tasks` | `{cluster, tasks: [handle]}` | `{tasks: [...], failures: [{reason}]}` |
//! | `POST /run-task` | image, sizing, tags, network | `{tasks: [{taskHandle}], failures}` |
//! | `POST /stop-task` | `{cluster, task, reason}` | any 2xx |

use sandlot_types::{NetworkAttachment, PlacementInfo, is_task_running};
use serde::{Deserialize, Serialize};

use crate::retry::{send_once, send_with_retry};
use crate::{
    ClientSettings, ContainerStatusProvider, LaunchRequest, ProviderError, ProviderFut,
    RuntimeBackend, TaskDescription, decode_outcome, expect_success, http_client,
};

/// Status reported when the scheduler knows nothing about a handle.
pub const TASK_NOT_FOUND: &str = "NOT_FOUND";
/// Status reported when the scheduler returned a failure for a handle.
pub const TASK_FAILED: &str = "FAILED";

pub const STOP_REASON: &str = "Playground session stopped by user";
pub const CONTAINER_NAME: &str = "workload";

/// Placement and sizing for launched tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub cluster: Option<String>,
    pub subnets: Vec<String>,
    pub security_group: Option<String>,
    pub execution_role: Option<String>,
    pub container_port: u16,
    pub cpu: String,
    pub memory: String,
    pub assign_public_ip: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            cluster: None,
            subnets: Vec::new(),
            security_group: None,
            execution_role: None,
            container_port: 8000,
            cpu: "1024".to_string(),
            memory: "2048".to_string(),
            assign_public_ip: true,
        }
    }
}

impl SchedulerSettings {
    /// Configuration keys a launch needs but does not have.
    #[must_use]
    pub fn missing_launch_keys(&self) -> Vec<String> {
        let blank = |value: &Option<String>| value.as_deref().is_none_or(|v| v.trim().is_empty());

        let mut missing = Vec::new();
        if blank(&self.cluster) {
            missing.push("scheduler.cluster".to_string());
        }
        if self.subnets.iter().all(|s| s.trim().is_empty()) {
            missing.push("scheduler.subnets".to_string());
        }
        if blank(&self.security_group) {
            missing.push("scheduler.security_group".to_string());
        }
        if blank(&self.execution_role) {
            missing.push("scheduler.execution_role".to_string());
        }
        missing
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DescribeTasksBody<'a> {
    cluster: &'a str,
    tasks: [&'a str; 1],
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TasksResponse {
    #[serde(default)]
    tasks: Vec<WireTask>,
    #[serde(default)]
    failures: Vec<WireFailure>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTask {
    task_handle: String,
    #[serde(default)]
    last_status: Option<String>,
    #[serde(default)]
    stopped_reason: Option<String>,
    #[serde(default)]
    attachments: Vec<NetworkAttachment>,
    #[serde(default)]
    public_ip: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFailure {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunTaskBody<'a> {
    cluster: &'a str,
    image: &'a str,
    container_name: &'a str,
    container_port: u16,
    cpu: &'a str,
    memory: &'a str,
    execution_role: &'a str,
    started_by: String,
    tags: Vec<Tag<'a>>,
    network_configuration: NetworkConfiguration<'a>,
}

#[derive(Debug, Serialize)]
struct Tag<'a> {
    key: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NetworkConfiguration<'a> {
    subnets: &'a [String],
    security_groups: [&'a str; 1],
    assign_public_ip: &'static str,
}

#[derive(Debug, Serialize)]
struct StopTaskBody<'a> {
    cluster: &'a str,
    task: &'a str,
    reason: &'a str,
}

/// Client for the container scheduler gateway.
#[derive(Debug, Clone)]
pub struct SchedulerClient {
    http: reqwest::Client,
    settings: ClientSettings,
    scheduler: SchedulerSettings,
}

impl SchedulerClient {
    pub fn new(settings: ClientSettings, scheduler: SchedulerSettings) -> Result<Self, ProviderError> {
        Ok(Self {
            http: http_client(&settings)?,
            settings,
            scheduler,
        })
    }

    fn cluster(&self) -> Result<&str, ProviderError> {
        self.scheduler
            .cluster
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::Misconfigured(vec!["scheduler.cluster".to_string()]))
    }

    async fn describe(&self, handle: &str) -> Result<TaskDescription, ProviderError> {
        let cluster = self.cluster()?;
        let url = self.settings.endpoint("describe-tasks")?;
        let body = DescribeTasksBody {
            cluster,
            tasks: [handle],
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
        let response: TasksResponse = decode_outcome(outcome, self.settings.request_timeout).await?;

        Ok(describe_from_response(response))
    }

    async fn run(&self, request: &LaunchRequest) -> Result<String, ProviderError> {
        let missing = self.scheduler.missing_launch_keys();
        if !missing.is_empty() {
            return Err(ProviderError::Misconfigured(missing));
        }
        let url = self.settings.endpoint("run-task")?;

        let scheduler = &self.scheduler;
        let cluster = scheduler.cluster.as_deref().unwrap_or_default();
        let security_group = scheduler.security_group.as_deref().unwrap_or_default();
        let execution_role = scheduler.execution_role.as_deref().unwrap_or_default();

        let body = RunTaskBody {
            cluster,
            image: &request.artifact_ref,
            container_name: CONTAINER_NAME,
            container_port: scheduler.container_port,
            cpu: &scheduler.cpu,
            memory: &scheduler.memory,
            execution_role,
            started_by: format!("sandlot-playground-{}", request.workload_id),
            tags: vec![
                Tag {
                    key: "WorkloadId",
                    value: &request.workload_id,
                },
                Tag {
                    key: "Environment",
                    value: "Playground",
                },
            ],
            network_configuration: NetworkConfiguration {
                subnets: &scheduler.subnets,
                security_groups: [security_group],
                assign_public_ip: if scheduler.assign_public_ip {
                    "ENABLED"
                } else {
                    "DISABLED"
                },
            },
        };

        let outcome = send_once(self.settings.authorize(self.http.post(url)).json(&body)).await;
        let response: TasksResponse = decode_outcome(outcome, self.settings.request_timeout).await?;

        if let Some(failure) = response.failures.into_iter().next() {
            return Err(ProviderError::Rejected(
                failure
                    .reason
                    .unwrap_or_else(|| "scheduler reported a launch failure".to_string()),
            ));
        }
        response
            .tasks
            .into_iter()
            .map(|task| task.task_handle)
            .find(|handle| !handle.trim().is_empty())
            .ok_or_else(|| ProviderError::Decode("scheduler returned no task handle".to_string()))
    }

    async fn stop_task(&self, handle: &str) -> Result<(), ProviderError> {
        let cluster = self.cluster()?;
        let url = self.settings.endpoint("stop-task")?;
        let body = StopTaskBody {
            cluster,
            task: handle,
            reason: STOP_REASON,
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
        expect_success(outcome, self.settings.request_timeout).await?;
        Ok(())
    }
}

fn describe_from_response(response: TasksResponse) -> TaskDescription {
    let Some(task) = response.tasks.into_iter().next() else {
        return match response.failures.into_iter().next() {
            Some(failure) => TaskDescription {
                status: TASK_FAILED.to_string(),
                running: false,
                placement: None,
                stopped_reason: None,
                failure: Some(
                    failure
                        .reason
                        .unwrap_or_else(|| "scheduler reported a failure".to_string()),
                ),
            },
            None => TaskDescription {
                status: TASK_NOT_FOUND.to_string(),
                running: false,
                placement: None,
                stopped_reason: None,
                failure: Some("Task not found".to_string()),
            },
        };
    };

    let status = task.last_status.unwrap_or_else(|| "UNKNOWN".to_string());
    let placement = (!task.attachments.is_empty() || task.public_ip.is_some()).then(|| {
        PlacementInfo {
            attachments: task.attachments,
            public_ip: task.public_ip,
        }
    });

    TaskDescription {
        running: is_task_running(&status),
        status,
        placement,
        stopped_reason: task.stopped_reason,
        failure: None,
    }
}

impl ContainerStatusProvider for SchedulerClient {
    fn describe_task<'a>(&'a self, handle: &'a str) -> ProviderFut<'a, TaskDescription> {
        Box::pin(self.describe(handle))
    }
}

impl RuntimeBackend for SchedulerClient {
    fn launch<'a>(&'a self, request: &'a LaunchRequest) -> ProviderFut<'a, String> {
        Box::pin(self.run(request))
    }

    fn stop<'a>(&'a self, handle: &'a str) -> ProviderFut<'a, ()> {
        Box::pin(self.stop_task(handle))
    }
}
