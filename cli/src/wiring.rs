//! Builds the lifecycle service from resolved settings.

use std::sync::Arc;

use anyhow::{Context, Result};
use sandlot_config::Settings;
use sandlot_engine::{Collaborators, LifecycleService, ServiceOptions};
use sandlot_providers::scheduler::SchedulerClient;
use sandlot_providers::workflow::WorkflowClient;
use sandlot_providers::{
    ContainerStatusProvider, ExecutionDescription, ExecutionRequest, LaunchRequest, ProviderError,
    ProviderFut, RuntimeBackend, TaskDescription, WorkflowLauncher, WorkflowStatusProvider,
};
use sandlot_store::SqliteRecordStore;

/// Stands in for a substrate with no configured endpoint. Every call fails
/// in-band with the missing key.
struct Unconfigured {
    key: &'static str,
}

impl Unconfigured {
    fn fail<'a, T: Send + 'a>(&self) -> ProviderFut<'a, T> {
        let error = ProviderError::Misconfigured(vec![self.key.to_string()]);
        Box::pin(async move { Err(error) })
    }
}

impl WorkflowStatusProvider for Unconfigured {
    fn describe_execution<'a>(&'a self, _: &'a str) -> ProviderFut<'a, ExecutionDescription> {
        self.fail()
    }
}

impl WorkflowLauncher for Unconfigured {
    fn start_execution<'a>(&'a self, _: &'a ExecutionRequest) -> ProviderFut<'a, String> {
        self.fail()
    }
}

impl ContainerStatusProvider for Unconfigured {
    fn describe_task<'a>(&'a self, _: &'a str) -> ProviderFut<'a, TaskDescription> {
        self.fail()
    }
}

impl RuntimeBackend for Unconfigured {
    fn launch<'a>(&'a self, _: &'a LaunchRequest) -> ProviderFut<'a, String> {
        self.fail()
    }

    fn stop<'a>(&'a self, _: &'a str) -> ProviderFut<'a, ()> {
        self.fail()
    }
}

pub fn build_service(settings: &Settings) -> Result<LifecycleService> {
    let store = SqliteRecordStore::open(&settings.store_path).with_context(|| {
        format!(
            "failed to open record store at {}",
            settings.store_path.display()
        )
    })?;

    let (workflow, starter): (Arc<dyn WorkflowStatusProvider>, Arc<dyn WorkflowLauncher>) =
        match &settings.workflow {
            Some(workflow) => {
                let client = Arc::new(
                    WorkflowClient::new(workflow.client.clone(), workflow.state_machine.clone())
                        .context("failed to build workflow client")?,
                );
                (client.clone(), client)
            }
            None => {
                tracing::warn!("Workflow engine not configured");
                let missing = Arc::new(Unconfigured {
                    key: "workflow.base_url",
                });
                (missing.clone(), missing)
            }
        };

    let (containers, runtime): (Arc<dyn ContainerStatusProvider>, Arc<dyn RuntimeBackend>) =
        match &settings.scheduler {
            Some(scheduler) => {
                let client = Arc::new(
                    SchedulerClient::new(scheduler.client.clone(), scheduler.scheduler.clone())
                        .context("failed to build scheduler client")?,
                );
                (client.clone(), client)
            }
            None => {
                tracing::warn!("Container scheduler not configured");
                let missing = Arc::new(Unconfigured {
                    key: "scheduler.base_url",
                });
                (missing.clone(), missing)
            }
        };

    let mut options = ServiceOptions {
        call_deadline: settings.call_deadline,
        ..ServiceOptions::default()
    };
    if let Some(scheduler) = &settings.scheduler {
        options.container_port = scheduler.scheduler.container_port;
    }

    Ok(LifecycleService::new(
        Collaborators {
            store: Arc::new(store),
            workflow,
            starter,
            containers,
            runtime,
        },
        options,
    ))
}
