use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{TimeZone, Utc};
use sandlot_providers::{
    ContainerStatusProvider, ExecutionDescription, ExecutionRequest, LaunchRequest, ProviderError,
    ProviderFut, RuntimeBackend, TaskDescription, WorkflowLauncher, WorkflowStatusProvider,
};
use sandlot_types::{
    AttachmentDetail, NETWORK_INTERFACE_ATTACHMENT, NetworkAttachment, PRIVATE_IPV4_DETAIL,
    PlacementInfo, WorkloadId, WorkloadRecord,
};

pub const EXECUTION: &str = "arn:aws:states:us-east-1:123456789012:execution:validate:run-1";
pub const TASK: &str = "arn:aws:ecs:us-east-1:123456789012:task/playground/abc123";

pub fn record(id: &str) -> WorkloadRecord {
    let then = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    WorkloadRecord::new(WorkloadId::new(id).unwrap(), "acme/widgets", then)
}

pub fn placement(private_ip: &str, public_ip: Option<&str>) -> PlacementInfo {
    PlacementInfo {
        attachments: vec![NetworkAttachment {
            attachment_type: NETWORK_INTERFACE_ATTACHMENT.to_string(),
            details: vec![AttachmentDetail {
                name: PRIVATE_IPV4_DETAIL.to_string(),
                value: Some(private_ip.to_string()),
            }],
        }],
        public_ip: public_ip.map(str::to_string),
    }
}

fn unavailable() -> ProviderError {
    ProviderError::Http {
        status: 503,
        body: "service unavailable".to_string(),
    }
}

enum Answer<T> {
    Value(T),
    Fail,
    Hang,
}

pub struct FakeWorkflow {
    answer: Answer<ExecutionDescription>,
    calls: AtomicUsize,
}

impl FakeWorkflow {
    fn with(answer: Answer<ExecutionDescription>) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn answering(status: &str) -> Self {
        Self::with(Answer::Value(ExecutionDescription {
            status: status.to_string(),
            error: None,
        }))
    }

    pub fn failed_with(error: &str) -> Self {
        Self::with(Answer::Value(ExecutionDescription {
            status: "FAILED".to_string(),
            error: Some(error.to_string()),
        }))
    }

    pub fn failing() -> Self {
        Self::with(Answer::Fail)
    }

    pub fn hanging() -> Self {
        Self::with(Answer::Hang)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WorkflowStatusProvider for FakeWorkflow {
    fn describe_execution<'a>(&'a self, _handle: &'a str) -> ProviderFut<'a, ExecutionDescription> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            match &self.answer {
                Answer::Value(description) => Ok(description.clone()),
                Answer::Fail => Err(unavailable()),
                Answer::Hang => std::future::pending().await,
            }
        })
    }
}

pub struct FakeStarter {
    handle: Option<String>,
    requests: Mutex<Vec<ExecutionRequest>>,
}

impl FakeStarter {
    pub fn succeeding() -> Self {
        Self {
            handle: Some(EXECUTION.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            handle: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn returning(handle: &str) -> Self {
        Self {
            handle: Some(handle.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl WorkflowLauncher for FakeStarter {
    fn start_execution<'a>(&'a self, request: &'a ExecutionRequest) -> ProviderFut<'a, String> {
        self.requests.lock().unwrap().push(request.clone());
        Box::pin(async move { self.handle.clone().ok_or_else(unavailable) })
    }
}

pub struct FakeContainers {
    answer: Answer<TaskDescription>,
    calls: AtomicUsize,
}

impl FakeContainers {
    pub fn describing(description: TaskDescription) -> Self {
        Self {
            answer: Answer::Value(description),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn answering(status: &str) -> Self {
        Self::describing(TaskDescription {
            status: status.to_string(),
            running: status == "RUNNING",
            placement: None,
            stopped_reason: None,
            failure: None,
        })
    }

    pub fn failing() -> Self {
        Self {
            answer: Answer::Fail,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ContainerStatusProvider for FakeContainers {
    fn describe_task<'a>(&'a self, _handle: &'a str) -> ProviderFut<'a, TaskDescription> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            match &self.answer {
                Answer::Value(description) => Ok(description.clone()),
                Answer::Fail => Err(unavailable()),
                Answer::Hang => std::future::pending().await,
            }
        })
    }
}

pub struct FakeBackend {
    answer: Answer<()>,
    launches: Mutex<Vec<String>>,
    stops: Mutex<Vec<String>>,
}

impl FakeBackend {
    fn with(answer: Answer<()>) -> Self {
        Self {
            answer,
            launches: Mutex::new(Vec::new()),
            stops: Mutex::new(Vec::new()),
        }
    }

    pub fn healthy() -> Self {
        Self::with(Answer::Value(()))
    }

    pub fn broken() -> Self {
        Self::with(Answer::Fail)
    }

    pub fn hanging() -> Self {
        Self::with(Answer::Hang)
    }

    pub fn launches(&self) -> Vec<String> {
        self.launches.lock().unwrap().clone()
    }

    pub fn stops(&self) -> Vec<String> {
        self.stops.lock().unwrap().clone()
    }
}

impl RuntimeBackend for FakeBackend {
    fn launch<'a>(&'a self, request: &'a LaunchRequest) -> ProviderFut<'a, String> {
        self.launches.lock().unwrap().push(request.artifact_ref.clone());
        Box::pin(async move {
            match &self.answer {
                Answer::Value(()) => Ok(TASK.to_string()),
                Answer::Fail => Err(ProviderError::Rejected("insufficient capacity".to_string())),
                Answer::Hang => std::future::pending().await,
            }
        })
    }

    fn stop<'a>(&'a self, handle: &'a str) -> ProviderFut<'a, ()> {
        self.stops.lock().unwrap().push(handle.to_string());
        Box::pin(async move {
            match &self.answer {
                Answer::Value(()) => Ok(()),
                Answer::Fail => Err(unavailable()),
                Answer::Hang => std::future::pending().await,
            }
        })
    }
}
