//! Repeated reconciliation against unchanged substrate state

use std::sync::Arc;
use std::time::Duration;

use sandlot_engine::{Collaborators, LifecycleService, ServiceOptions};
use sandlot_store::{RecordStore, SqliteRecordStore};
use sandlot_types::{AppStatus, TrackedHandle};

use crate::common::{
    BackendFault, CountingStore, EXECUTION, Harness, RecordingBackend, ScriptedContainers,
    ScriptedWorkflow, record,
};

#[tokio::test]
async fn second_reconcile_writes_nothing() {
    for raw in ["RUNNING", "SUCCEEDED", "FAILED", "TIMED_OUT", "PENDING_REDRIVE"] {
        let mut stored = record("w1");
        stored.execution_handle = Some(TrackedHandle::Execution(EXECUTION.into()).into());
        let harness = Harness::new(
            CountingStore::with_records([stored]),
            ScriptedWorkflow::new([Some(raw)]),
            ScriptedContainers::provisioning(),
            RecordingBackend::new(BackendFault::None),
        );

        harness.service.get_status("w1").await.unwrap();
        let after_first = serde_json::to_string(&harness.store.stored("w1").unwrap()).unwrap();
        let saves = harness.store.saves();
        assert_eq!(saves, 1, "{raw}");

        harness.service.get_status("w1").await.unwrap();
        let after_second = serde_json::to_string(&harness.store.stored("w1").unwrap()).unwrap();

        assert_eq!(harness.store.saves(), saves, "{raw}");
        assert_eq!(after_first, after_second, "{raw}");
    }
}

#[tokio::test]
async fn reconcile_is_stable_across_sqlite_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("workloads.db");

    let mut stored = record("w1");
    stored.execution_handle = Some(TrackedHandle::Execution(EXECUTION.into()).into());
    SqliteRecordStore::open(&path).unwrap().save(&stored).unwrap();

    let service_over = |store: SqliteRecordStore| {
        let workflow = Arc::new(ScriptedWorkflow::new([Some("PENDING_REDRIVE")]));
        let backend = Arc::new(RecordingBackend::new(BackendFault::None));
        LifecycleService::new(
            Collaborators {
                store: Arc::new(store),
                workflow: workflow.clone(),
                starter: workflow,
                containers: Arc::new(ScriptedContainers::provisioning()),
                runtime: backend,
            },
            ServiceOptions {
                container_port: 8000,
                call_deadline: Duration::from_secs(1),
            },
        )
    };

    let first = service_over(SqliteRecordStore::open(&path).unwrap())
        .get_status("w1")
        .await
        .unwrap();
    assert_eq!(first.status, AppStatus::Other("PENDING_REDRIVE".to_string()));
    let persisted = SqliteRecordStore::open(&path).unwrap().get("w1").unwrap().unwrap();

    service_over(SqliteRecordStore::open(&path).unwrap())
        .get_status("w1")
        .await
        .unwrap();
    let reread = SqliteRecordStore::open(&path).unwrap().get("w1").unwrap().unwrap();

    assert_eq!(
        serde_json::to_string(&persisted).unwrap(),
        serde_json::to_string(&reread).unwrap()
    );
    assert_eq!(persisted.last_updated, reread.last_updated);
}
