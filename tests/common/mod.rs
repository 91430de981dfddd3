//! Shared test utilities and fixtures
//!
//! Scripted substrates and a write-counting store for driving
//! `LifecycleService` end to end.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use sandlot_engine::{Collaborators, LifecycleService, ServiceOptions};
use sandlot_providers::{
    ContainerStatusProvider, ExecutionDescription, ExecutionRequest, LaunchRequest, ProviderError,
    ProviderFut, RuntimeBackend, TaskDescription, WorkflowLauncher, WorkflowStatusProvider,
};
use sandlot_store::{MemoryRecordStore, RecordStore, StoreError};
use sandlot_types::{WorkloadId, WorkloadRecord};

pub const EXECUTION: &str = "arn:aws:states:us-east-1:123456789012:execution:validate:run-7";
pub const TASK: &str = "arn:aws:ecs:us-east-1:123456789012:task/playground/f00d";

pub fn record(id: &str) -> WorkloadRecord {
    let created = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    WorkloadRecord::new(WorkloadId::new(id).unwrap(), "acme/widgets", created)
}

fn unavailable() -> ProviderError {
    ProviderError::Transport("connection refused".to_string())
}

/// Wraps an in-memory store and counts writes.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryRecordStore,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl CountingStore {
    pub fn with_records(records: impl IntoIterator<Item = WorkloadRecord>) -> Self {
        Self {
            inner: MemoryRecordStore::with_records(records),
            ..Self::default()
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst);
    }

    pub fn stored(&self, id: &str) -> Option<WorkloadRecord> {
        self.inner.get(id).unwrap()
    }
}

impl RecordStore for CountingStore {
    fn get(&self, id: &str) -> Result<Option<WorkloadRecord>, StoreError> {
        self.inner.get(id)
    }

    fn get_by_alternate_key(&self, name: &str) -> Result<Option<WorkloadRecord>, StoreError> {
        self.inner.get_by_alternate_key(name)
    }

    fn save(&self, record: &WorkloadRecord) -> Result<(), StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Poisoned);
        }
        self.inner.save(record)
    }
}

/// Workflow engine that replays a script of answers, repeating the last.
#[derive(Default)]
pub struct ScriptedWorkflow {
    answers: Mutex<VecDeque<Option<String>>>,
    calls: AtomicUsize,
}

impl ScriptedWorkflow {
    /// `None` entries fail the call.
    pub fn new(answers: impl IntoIterator<Item = Option<&'static str>>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().map(|a| a.map(str::to_string)).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> Option<String> {
        let mut answers = self.answers.lock().unwrap();
        if answers.len() > 1 {
            answers.pop_front().flatten()
        } else {
            answers.front().cloned().flatten()
        }
    }
}

impl WorkflowStatusProvider for ScriptedWorkflow {
    fn describe_execution<'a>(&'a self, _handle: &'a str) -> ProviderFut<'a, ExecutionDescription> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.next();
        Box::pin(async move {
            answer
                .map(|status| ExecutionDescription {
                    status,
                    error: None,
                })
                .ok_or_else(unavailable)
        })
    }
}

impl WorkflowLauncher for ScriptedWorkflow {
    fn start_execution<'a>(&'a self, _request: &'a ExecutionRequest) -> ProviderFut<'a, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(EXECUTION.to_string()) })
    }
}

/// Scheduler that reports a fixed task description.
pub struct ScriptedContainers {
    description: Option<TaskDescription>,
    calls: AtomicUsize,
}

impl ScriptedContainers {
    pub fn reporting(description: TaskDescription) -> Self {
        Self {
            description: Some(description),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn provisioning() -> Self {
        Self::reporting(TaskDescription {
            status: "PROVISIONING".to_string(),
            running: false,
            placement: None,
            stopped_reason: None,
            failure: None,
        })
    }

    pub fn unreachable() -> Self {
        Self {
            description: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ContainerStatusProvider for ScriptedContainers {
    fn describe_task<'a>(&'a self, _handle: &'a str) -> ProviderFut<'a, TaskDescription> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.description.clone();
        Box::pin(async move { answer.ok_or_else(unavailable) })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendFault {
    None,
    Fails,
    Hangs,
}

/// Runtime backend that records stop requests.
pub struct RecordingBackend {
    fault: BackendFault,
    stops: Mutex<Vec<String>>,
}

impl RecordingBackend {
    pub fn new(fault: BackendFault) -> Self {
        Self {
            fault,
            stops: Mutex::new(Vec::new()),
        }
    }

    pub fn stops(&self) -> Vec<String> {
        self.stops.lock().unwrap().clone()
    }
}

impl RuntimeBackend for RecordingBackend {
    fn launch<'a>(&'a self, _request: &'a LaunchRequest) -> ProviderFut<'a, String> {
        Box::pin(async { Ok(TASK.to_string()) })
    }

    fn stop<'a>(&'a self, handle: &'a str) -> ProviderFut<'a, ()> {
        self.stops.lock().unwrap().push(handle.to_string());
        let fault = self.fault;
        Box::pin(async move {
            match fault {
                BackendFault::None => Ok(()),
                BackendFault::Fails => Err(ProviderError::Http {
                    status: 500,
                    body: "internal error".to_string(),
                }),
                BackendFault::Hangs => std::future::pending().await,
            }
        })
    }
}

pub struct Harness {
    pub store: Arc<CountingStore>,
    pub workflow: Arc<ScriptedWorkflow>,
    pub containers: Arc<ScriptedContainers>,
    pub backend: Arc<RecordingBackend>,
    pub service: LifecycleService,
}

impl Harness {
    pub fn new(
        store: CountingStore,
        workflow: ScriptedWorkflow,
        containers: ScriptedContainers,
        backend: RecordingBackend,
    ) -> Self {
        let store = Arc::new(store);
        let workflow = Arc::new(workflow);
        let containers = Arc::new(containers);
        let backend = Arc::new(backend);
        let service = LifecycleService::new(
            Collaborators {
                store: store.clone(),
                workflow: workflow.clone(),
                starter: workflow.clone(),
                containers: containers.clone(),
                runtime: backend.clone(),
            },
            ServiceOptions {
                container_port: 8000,
                call_deadline: Duration::from_millis(200),
            },
        );
        Self {
            store,
            workflow,
            containers,
            backend,
            service,
        }
    }

    /// A harness whose substrates answer but are never expected to be asked.
    pub fn quiet(records: impl IntoIterator<Item = WorkloadRecord>) -> Self {
        Self::new(
            CountingStore::with_records(records),
            ScriptedWorkflow::new([Some("RUNNING")]),
            ScriptedContainers::provisioning(),
            RecordingBackend::new(BackendFault::None),
        )
    }
}
