//! Delete, Update and Exists, plus a full cluster bring-up against the
//! in-memory collaborators.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use machinery_actuator::bootstrap::KubeadmTokenIssuer;
use machinery_actuator::memory::{MemoryBackend, MemoryClusterClients, MemoryStore};
use machinery_actuator::model::{OperationKind, OperationState};
use machinery_actuator::{Actuator, ActuatorConfig, ActuatorError, Collaborators, Outcome, Role};
use machinery_events::{reasons, MemoryRecorder};
use rstest::rstest;

// =============================================================================
// Delete
// =============================================================================

#[rstest]
#[case::sole_control_plane(Role::ControlPlane)]
#[case::worker(Role::Worker)]
#[tokio::test]
async fn test_delete_destroys_once_regardless_of_membership(#[case] role: Role) {
    let fakes = Fakes::new();
    let cluster = cluster_with_ca();
    let m = machine(&cluster, "m-0", role);
    fakes.register(&[&m]).await;

    let outcome = fakes.actuator().delete(&cluster, &m).await.unwrap();

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(fakes.backend.calls(), vec![BackendCall::Delete]);
    assert_eq!(fakes.probe.calls(), 0);
    assert!(fakes.no_join_attempt());
    assert_eq!(fakes.store.init_claim(cluster.uid).await, None);

    let events = fakes.recorder.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reason, reasons::DELETE_SUCCESS);

    let stored = fakes.store.get(m.uid).await.unwrap();
    assert_eq!(stored.status.provider_state.as_deref(), Some("notFound"));
    let last = stored.status.last_operation.unwrap();
    assert_eq!(last.kind, OperationKind::Delete);
    assert_eq!(last.state, OperationState::Succeeded);
}

#[tokio::test]
async fn test_delete_ignores_missing_ca() {
    let fakes = Fakes::new();
    let cluster = machinery_actuator::Cluster::new("default", "c1");
    let m = machine(&cluster, "w-0", Role::Worker);
    fakes.register(&[&m]).await;

    let outcome = fakes.actuator().delete(&cluster, &m).await.unwrap();
    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(fakes.backend.calls(), vec![BackendCall::Delete]);
}

#[tokio::test]
async fn test_delete_failure_is_wrapped() {
    let fakes = Fakes::new();
    let cluster = cluster_with_ca();
    let m = machine(&cluster, "w-0", Role::Worker);
    fakes.register(&[&m]).await;
    fakes.backend.fail_with("vm is locked");

    let err = fakes.actuator().delete(&cluster, &m).await.unwrap_err();

    assert!(matches!(err, ActuatorError::Delete { .. }));
    assert!(err.chain().contains("vm is locked"));
    let events = fakes.recorder.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reason, reasons::DELETE_FAILURE);
    assert!(events[0].is_warning());

    let stored = fakes.store.get(m.uid).await.unwrap();
    assert_eq!(stored.status.last_operation.unwrap().state, OperationState::Failed);
}

// =============================================================================
// Update
// =============================================================================

#[tokio::test]
async fn test_update_flushes_backend_status() {
    let fakes = Fakes::new();
    let cluster = cluster_with_ca();
    let m = machine(&cluster, "w-0", Role::Worker);
    fakes.register(&[&m]).await;

    let outcome = fakes.actuator().update(&cluster, &m).await.unwrap();

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(fakes.backend.calls(), vec![BackendCall::Update]);
    assert_eq!(fakes.store.patch_count().await, 1);

    let stored = fakes.store.get(m.uid).await.unwrap();
    assert_eq!(stored.status.instance_id.as_deref(), Some("vm-42"));
    assert_eq!(stored.status.last_operation.unwrap().kind, OperationKind::Update);
    assert_eq!(fakes.recorder.with_reason(reasons::UPDATE_SUCCESS).len(), 1);
}

#[tokio::test]
async fn test_update_failure_is_wrapped() {
    let fakes = Fakes::new();
    let cluster = cluster_with_ca();
    let m = machine(&cluster, "w-0", Role::Worker);
    fakes.register(&[&m]).await;
    fakes.backend.fail_with("inventory unavailable");

    let err = fakes.actuator().update(&cluster, &m).await.unwrap_err();

    assert!(matches!(err, ActuatorError::Update { .. }));
    assert_eq!(fakes.recorder.with_reason(reasons::UPDATE_FAILURE).len(), 1);
}

// =============================================================================
// Exists
// =============================================================================

#[rstest]
#[case::present(true)]
#[case::absent(false)]
#[tokio::test]
async fn test_exists_has_no_side_effects(#[case] present: bool) {
    let fakes = Fakes::new();
    let cluster = cluster_with_ca();
    let m = machine(&cluster, "w-0", Role::Worker);
    fakes.register(&[&m]).await;
    fakes.backend.set_exists(present);

    let exists = fakes.actuator().exists(&cluster, &m).await.unwrap();

    assert_eq!(exists, present);
    assert_eq!(fakes.backend.calls(), vec![BackendCall::Exists]);
    assert_eq!(fakes.store.patch_count().await, 0);
    assert!(fakes.recorder.is_empty());
}

#[tokio::test]
async fn test_exists_failure_records_nothing() {
    let fakes = Fakes::new();
    let cluster = cluster_with_ca();
    let m = machine(&cluster, "w-0", Role::Worker);
    fakes.register(&[&m]).await;
    fakes.backend.fail_with("inventory unavailable");

    let err = fakes.actuator().exists(&cluster, &m).await.unwrap_err();

    assert!(matches!(err, ActuatorError::Exists { .. }));
    assert_eq!(fakes.store.patch_count().await, 0);
    assert!(fakes.recorder.is_empty());
}

// =============================================================================
// End to end
// =============================================================================

struct Harness {
    actuator: Actuator,
    store: Arc<MemoryStore>,
    backend: Arc<MemoryBackend>,
    clients: Arc<MemoryClusterClients>,
    recorder: Arc<MemoryRecorder>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clients = Arc::new(MemoryClusterClients::new());
    let backend = Arc::new(MemoryBackend::new(clients.clone()));
    let recorder = Arc::new(MemoryRecorder::new());

    let actuator = Actuator::new(
        Collaborators {
            store: store.clone(),
            backend: backend.clone(),
            clients: clients.clone(),
            probe: backend.clone(),
            tokens: Arc::new(KubeadmTokenIssuer),
            recorder: recorder.clone(),
        },
        ActuatorConfig::default(),
    );

    Harness {
        actuator,
        store,
        backend,
        clients,
        recorder,
    }
}

#[tokio::test]
async fn test_cluster_bring_up() {
    let h = harness();
    let cluster = cluster_with_ca();
    let cp = machine(&cluster, "cp-0", Role::ControlPlane);
    let w = machine(&cluster, "w-0", Role::Worker);
    h.store.insert(cp.clone()).await;
    h.store.insert(w.clone()).await;

    // The worker arrives first and has to wait.
    let outcome = h.actuator.create(&cluster, &w).await.unwrap();
    assert_eq!(outcome, Outcome::RequeueAfter(Duration::from_secs(60)));
    assert_eq!(h.backend.vm_count().await, 0);

    let cp = h.store.get(cp.uid).await.unwrap();
    assert_eq!(h.actuator.create(&cluster, &cp).await.unwrap(), Outcome::Completed);
    assert_eq!(h.store.init_claim(cluster.uid).await, Some(cp.uid));

    let w = h.store.get(w.uid).await.unwrap();
    assert_eq!(h.actuator.create(&cluster, &w).await.unwrap(), Outcome::Completed);
    assert_eq!(h.clients.token_count(cluster.uid).await, 1);
    assert_eq!(h.backend.vm_count().await, 2);

    for m in h.store.machines().await {
        assert!(h.actuator.exists(&cluster, &m).await.unwrap());
        assert_eq!(m.status.provider_state.as_deref(), Some("poweredOn"));
        assert_eq!(m.status.addresses.len(), 1);
    }
    assert_eq!(h.recorder.with_reason(reasons::CREATE_SUCCESS).len(), 2);

    // Tearing down the only control-plane member takes the cluster offline.
    let cp = h.store.get(cp.uid).await.unwrap();
    h.actuator.delete(&cluster, &cp).await.unwrap();
    assert!(!h.actuator.exists(&cluster, &cp).await.unwrap());

    let late = machine(&cluster, "w-1", Role::Worker);
    h.store.insert(late.clone()).await;
    assert_eq!(
        h.actuator.create(&cluster, &late).await.unwrap(),
        Outcome::RequeueAfter(Duration::from_secs(60))
    );
}

#[tokio::test]
async fn test_create_is_idempotent() {
    let h = harness();
    let cluster = cluster_with_ca();
    let cp = machine(&cluster, "cp-0", Role::ControlPlane);
    h.store.insert(cp.clone()).await;

    h.actuator.create(&cluster, &cp).await.unwrap();
    let first = h.store.get(cp.uid).await.unwrap();
    h.actuator.create(&cluster, &first).await.unwrap();
    let second = h.store.get(cp.uid).await.unwrap();

    assert_eq!(h.backend.vm_count().await, 1);
    assert_eq!(first.status.instance_id, second.status.instance_id);
}
