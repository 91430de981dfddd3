//! End-to-end lifecycle scenarios against scripted substrates

use sandlot_engine::NO_ACTIVE_PIPELINE;
use sandlot_types::{AppStatus, StoredHandle, Substrate, TrackedHandle};

use crate::common::{
    BackendFault, CountingStore, EXECUTION, Harness, RecordingBackend, ScriptedContainers,
    ScriptedWorkflow, TASK, record,
};

#[tokio::test]
async fn unknown_record_without_handles_makes_no_calls() {
    let harness = Harness::quiet([record("w1")]);

    let result = harness.service.get_status("w1").await.unwrap();

    assert_eq!(result.status, AppStatus::Unknown);
    assert_eq!(result.message, NO_ACTIVE_PIPELINE);
    assert_eq!(result.substrate_used, None);
    assert_eq!(harness.workflow.calls(), 0);
    assert_eq!(harness.containers.calls(), 0);
    assert_eq!(harness.store.saves(), 0);
}

#[tokio::test]
async fn succeeded_execution_verifies_with_one_write() {
    let mut stored = record("w1");
    stored.status = AppStatus::Validating;
    stored.execution_handle = Some(StoredHandle::Legacy(EXECUTION.to_string()));
    let harness = Harness::new(
        CountingStore::with_records([stored]),
        ScriptedWorkflow::new([Some("SUCCEEDED")]),
        ScriptedContainers::provisioning(),
        RecordingBackend::new(BackendFault::None),
    );

    let result = harness.service.get_status("w1").await.unwrap();

    assert_eq!(result.status, AppStatus::Verified);
    assert!(result.verified);
    assert_eq!(result.substrate_used, Some(Substrate::Execution));
    assert_eq!(harness.store.saves(), 1);
    let updated = harness.store.stored("w1").unwrap();
    assert!(updated.verified);
    assert_eq!(updated.status, AppStatus::Verified);
}

#[tokio::test]
async fn execution_handle_in_task_slot_asks_workflow_engine() {
    let mut stored = record("w1");
    stored.execution_handle = Some(StoredHandle::Legacy(String::new()));
    stored.task_handle = Some(StoredHandle::Legacy(EXECUTION.to_string()));
    let harness = Harness::quiet([stored]);

    let result = harness.service.get_status("w1").await.unwrap();

    assert_eq!(result.substrate_used, Some(Substrate::Execution));
    assert_eq!(harness.workflow.calls(), 1);
    assert_eq!(harness.containers.calls(), 0);
}

#[tokio::test]
async fn runtime_status_before_placement_leaves_record_alone() {
    let mut stored = record("w1");
    stored.verified = true;
    stored.status = AppStatus::Verified;
    stored.artifact_ref = Some("registry.example/acme/widgets:7".to_string());
    let harness = Harness::quiet([stored]);

    let launched = harness.service.launch_runtime("w1").await.unwrap();
    assert!(launched.success);
    assert_eq!(launched.task_handle.as_deref(), Some(TASK));
    let after_launch = harness.store.stored("w1").unwrap();
    assert_eq!(after_launch.status, AppStatus::RunningPlayground);
    assert_eq!(
        after_launch.task_handle,
        Some(StoredHandle::Tagged(TrackedHandle::Task(TASK.into())))
    );
    let saves = harness.store.saves();

    let status = harness.service.get_runtime_status("w1", TASK).await.unwrap();

    assert!(status.success);
    assert!(!status.running);
    assert_eq!(status.status, "PROVISIONING");
    assert_eq!(status.endpoint, None);
    assert_eq!(harness.store.saves(), saves);
    let stored = harness.store.stored("w1").unwrap();
    assert!(stored.endpoint.is_empty());
    assert_eq!(stored, after_launch);
}

#[tokio::test]
async fn stop_without_record_still_reaches_backend() {
    let harness = Harness::quiet([]);

    let outcome = harness.service.stop_runtime("w-missing", TASK).await.unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.error, None);
    assert_eq!(outcome.task_handle, TASK);
    assert_eq!(harness.backend.stops(), vec![TASK.to_string()]);
    assert_eq!(harness.store.saves(), 0);
}

#[tokio::test]
async fn verify_then_poll_until_verified() {
    let harness = Harness::new(
        CountingStore::default(),
        ScriptedWorkflow::new([Some("RUNNING"), Some("RUNNING"), Some("SUCCEEDED")]),
        ScriptedContainers::provisioning(),
        RecordingBackend::new(BackendFault::None),
    );

    let started = harness
        .service
        .start_verification("w5", Some("acme/widgets"))
        .await
        .unwrap();
    assert!(started.success);
    assert_eq!(started.status, AppStatus::Validating);

    let first = harness.service.get_status("w5").await.unwrap();
    assert_eq!(first.status, AppStatus::Validating);
    let second = harness.service.get_status("acme/widgets").await.unwrap();
    assert_eq!(second.status, AppStatus::Validating);
    let third = harness.service.get_status("w5").await.unwrap();
    assert_eq!(third.status, AppStatus::Verified);

    // start + final transition; the RUNNING polls matched the stored status
    assert_eq!(harness.store.saves(), 2);
    assert!(harness.store.stored("w5").unwrap().verified);
}

#[tokio::test]
async fn workflow_outage_falls_back_to_container_without_writing() {
    let mut stored = record("w1");
    stored.verified = true;
    stored.status = AppStatus::RunningPlayground;
    stored.execution_handle = Some(TrackedHandle::Execution(EXECUTION.into()).into());
    stored.task_handle = Some(TrackedHandle::Task(TASK.into()).into());
    let harness = Harness::new(
        CountingStore::with_records([stored]),
        ScriptedWorkflow::new([None]),
        ScriptedContainers::provisioning(),
        RecordingBackend::new(BackendFault::None),
    );

    let result = harness.service.get_status("w1").await.unwrap();

    assert_eq!(result.status, AppStatus::RunningPlayground);
    assert_eq!(result.substrate_used, Some(Substrate::Task));
    assert_eq!(result.raw_substrate_status.as_deref(), Some("PROVISIONING"));
    assert_eq!(harness.store.saves(), 0);
}
