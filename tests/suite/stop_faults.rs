//! Stop cleanup under backend and store faults

use sandlot_types::{AppStatus, StoredHandle, Substrate, TrackedHandle, WorkloadRecord};

use crate::common::{
    BackendFault, CountingStore, EXECUTION, Harness, RecordingBackend, ScriptedContainers,
    ScriptedWorkflow, TASK, record,
};

fn running(id: &str) -> WorkloadRecord {
    let mut stored = record(id);
    stored.verified = true;
    stored.status = AppStatus::RunningPlayground;
    stored.task_handle = Some(TrackedHandle::Task(TASK.into()).into());
    stored.endpoint = vec!["http://54.10.20.30:8000".to_string()];
    stored
}

fn harness(fault: BackendFault, store: CountingStore) -> Harness {
    Harness::new(
        store,
        ScriptedWorkflow::new([Some("SUCCEEDED")]),
        ScriptedContainers::provisioning(),
        RecordingBackend::new(fault),
    )
}

#[tokio::test]
async fn stop_clears_record_whatever_the_backend_says() {
    for fault in [BackendFault::None, BackendFault::Fails, BackendFault::Hangs] {
        let harness = harness(fault, CountingStore::with_records([running("w1")]));

        let outcome = harness.service.stop_runtime("w1", TASK).await.unwrap();

        assert_eq!(outcome.success, fault == BackendFault::None, "{fault:?}");
        assert_eq!(outcome.error.is_some(), fault != BackendFault::None, "{fault:?}");
        let stored = harness.store.stored("w1").unwrap();
        assert_eq!(stored.task_handle, None, "{fault:?}");
        assert_eq!(stored.status, AppStatus::Verified, "{fault:?}");
        assert!(stored.verified);
    }
}

#[tokio::test]
async fn stop_reports_backend_outcome_when_save_fails() {
    let store = CountingStore::with_records([running("w1")]);
    store.fail_saves();
    let harness = harness(BackendFault::None, store);

    let outcome = harness.service.stop_runtime("w1", TASK).await.unwrap();

    assert!(outcome.success);
    assert_eq!(harness.store.saves(), 1);
    assert_eq!(harness.backend.stops(), vec![TASK.to_string()]);
}

#[tokio::test]
async fn blank_handle_is_rejected_before_backend() {
    let harness = harness(BackendFault::None, CountingStore::with_records([running("w1")]));

    let error = harness.service.stop_runtime("w1", "   ").await.unwrap_err();

    assert!(error.is_validation());
    assert!(harness.backend.stops().is_empty());
    assert_eq!(harness.store.saves(), 0);
}

#[tokio::test]
async fn stop_keeps_execution_handle_stored_in_task_slot() {
    let mut stored = record("w1");
    stored.status = AppStatus::Validating;
    stored.task_handle = Some(StoredHandle::Legacy(EXECUTION.to_string()));
    let harness = Harness::new(
        CountingStore::with_records([stored]),
        ScriptedWorkflow::new([Some("RUNNING")]),
        ScriptedContainers::provisioning(),
        RecordingBackend::new(BackendFault::None),
    );

    let outcome = harness.service.stop_runtime("w1", TASK).await.unwrap();
    assert!(outcome.success);

    let after = harness.store.stored("w1").unwrap();
    assert_eq!(after.task_handle, Some(StoredHandle::Legacy(EXECUTION.to_string())));
    assert_eq!(after.effective_handles().execution.as_deref(), Some(EXECUTION));
    assert_eq!(after.status, AppStatus::Validating);
    assert!(!after.verified);

    let status = harness.service.get_status("w1").await.unwrap();
    assert_eq!(status.substrate_used, Some(Substrate::Execution));
    assert_eq!(status.status, AppStatus::Validating);
}

#[tokio::test]
async fn stop_by_name_resets_record_launched_by_name() {
    let mut stored = record("w1");
    stored.verified = true;
    stored.status = AppStatus::Verified;
    stored.artifact_ref = Some("registry.example/acme/widgets:7".to_string());
    let harness = Harness::new(
        CountingStore::with_records([stored]),
        ScriptedWorkflow::new([Some("SUCCEEDED")]),
        ScriptedContainers::provisioning(),
        RecordingBackend::new(BackendFault::None),
    );

    let launched = harness.service.launch_runtime("acme/widgets").await.unwrap();
    assert!(launched.success);
    assert_eq!(
        harness.store.stored("w1").unwrap().status,
        AppStatus::RunningPlayground
    );

    let outcome = harness.service.stop_runtime("acme/widgets", TASK).await.unwrap();

    assert!(outcome.success);
    assert_eq!(harness.backend.stops(), vec![TASK.to_string()]);
    let after = harness.store.stored("w1").unwrap();
    assert_eq!(after.status, AppStatus::Verified);
    assert_eq!(after.task_handle, None);
}
