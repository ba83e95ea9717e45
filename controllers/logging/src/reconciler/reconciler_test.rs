//! Scenario tests for the reconciler

use crate::actuator::shoot::MANAGED_RESOURCE_NAME;
use crate::error::ControllerError;
use crate::test_utils::*;
use crds::{LastOperation, LastOperationState, LastOperationType, Logging, FINALIZER_NAME, OPERATION_ANNOTATION};
use seed_client::MockSeedClient;

const SHOOT_NAMESPACE: &str = "shoot--dev--foo";

fn stored(seed: &MockSeedClient, namespace: &str) -> Logging {
    seed.logging(namespace, "logging").unwrap()
}

fn last_operation(seed: &MockSeedClient, namespace: &str) -> LastOperation {
    stored(seed, namespace).status.unwrap().last_operation.unwrap()
}

/// Harness with a shoot Logging and its Cluster in the store
fn shoot_setup(event_logging: bool, node_logging: bool, logging: Logging) -> (TestHarness, crate::reconciler::Reconciler) {
    let (harness, reconciler) = create_test_reconciler(test_config(event_logging, node_logging));
    harness
        .seed
        .add_cluster(create_test_cluster(SHOOT_NAMESPACE, Some("evaluation")));
    harness.seed.add_logging(logging);
    (harness, reconciler)
}

#[tokio::test]
async fn test_missing_resource_is_finalized() {
    let (harness, reconciler) = create_test_reconciler(test_config(false, false));

    reconciler.process("garden", "logging").await.unwrap();
    assert_eq!(harness.seed.calls(), vec!["get_logging"]);
}

#[tokio::test]
async fn test_seed_create() {
    let (harness, reconciler) = create_test_reconciler(test_config(false, false));
    harness
        .seed
        .add_logging(create_test_logging("logging", "garden", "seed"));

    reconciler.process("garden", "logging").await.unwrap();

    let logging = stored(&harness.seed, "garden");
    assert!(logging.has_finalizer());
    let status = logging.status.unwrap();
    let op = status.last_operation.unwrap();
    assert_eq!(op.operation_type, LastOperationType::Create);
    assert_eq!(op.state, LastOperationState::Succeeded);
    assert_eq!(op.description, "Successfully reconciled Logging");
    assert_eq!(op.progress, 100);
    assert_eq!(status.observed_generation, Some(1));
    assert_eq!(
        status.grafana_datasource.as_deref(),
        Some("\n- name: loki\n  type: loki\n  access: proxy\n  url: http://loki.garden.svc:3100")
    );
    assert!(status.units.is_empty() && status.files.is_empty());

    assert!(harness.charts.installed("seed-bootstrap", "garden").is_some());
    assert!(!harness.seed.calls().contains(&"get_cluster".to_string()));
}

#[tokio::test]
async fn test_second_pass_is_a_reconcile() {
    let (harness, reconciler) = create_test_reconciler(test_config(false, false));
    harness
        .seed
        .add_logging(create_test_logging("logging", "garden", "seed"));

    reconciler.process("garden", "logging").await.unwrap();
    reconciler.process("garden", "logging").await.unwrap();

    assert_eq!(last_operation(&harness.seed, "garden").operation_type, LastOperationType::Reconcile);
    let applied = harness.charts.applied_values("seed-bootstrap");
    assert_eq!(applied.len(), 2);
    assert_eq!(applied[0], applied[1]);
}

#[tokio::test]
async fn test_shoot_with_event_logging_only() {
    let (harness, reconciler) = shoot_setup(true, false, create_test_logging("logging", SHOOT_NAMESPACE, "shoot"));

    reconciler.process(SHOOT_NAMESPACE, "logging").await.unwrap();

    let status = stored(&harness.seed, SHOOT_NAMESPACE).status.unwrap();
    assert_eq!(status.last_operation.unwrap().state, LastOperationState::Succeeded);
    assert_eq!(status.units.len(), 2);
    assert_eq!(status.files.len(), 0);
    assert!(status
        .units
        .iter()
        .all(|u| u.content.as_deref().unwrap_or_default().contains("systemctl disable")));

    assert!(harness.charts.installed("event-logger", SHOOT_NAMESPACE).is_some());
    assert!(harness.charts.installed("kube-rbac-proxy", SHOOT_NAMESPACE).is_none());
    assert_eq!(harness.seed.deleted_objects().len(), 4);
    assert!(harness.seed.calls().contains(&"get_cluster".to_string()));
}

#[tokio::test]
async fn test_shoot_with_node_logging() {
    let (harness, reconciler) = shoot_setup(false, true, create_test_logging("logging", SHOOT_NAMESPACE, "shoot"));

    reconciler.process(SHOOT_NAMESPACE, "logging").await.unwrap();

    let status = stored(&harness.seed, SHOOT_NAMESPACE).status.unwrap();
    assert_eq!(status.units.len(), 2);
    assert_eq!(status.files.len(), 4);
    assert_eq!(harness.secrets.ensured().len(), 1);
    assert!(harness.charts.installed("kube-rbac-proxy", SHOOT_NAMESPACE).is_some());
}

#[tokio::test]
async fn test_shoot_without_cluster_fails_before_status() {
    let (harness, reconciler) = create_test_reconciler(test_config(false, false));
    harness
        .seed
        .add_logging(create_test_logging("logging", SHOOT_NAMESPACE, "shoot"));

    let err = reconciler.process(SHOOT_NAMESPACE, "logging").await.unwrap_err();
    assert!(matches!(err, ControllerError::Seed(_)), "{}", err);
    assert!(stored(&harness.seed, SHOOT_NAMESPACE).status.is_none());
}

#[tokio::test]
async fn test_actuator_error_is_recorded_and_returned() {
    let (harness, reconciler) = create_test_reconciler(test_config(false, false));
    harness.charts.fail_release("seed-bootstrap");
    harness
        .seed
        .add_logging(create_test_logging("logging", "garden", "seed"));

    let err = reconciler.process("garden", "logging").await.unwrap_err();
    assert!(matches!(
        err,
        ControllerError::Actuator {
            operation: LastOperationType::Create,
            ..
        }
    ));

    let status = stored(&harness.seed, "garden").status.unwrap();
    let op = status.last_operation.unwrap();
    assert_eq!(op.state, LastOperationState::Error);
    assert_eq!(op.operation_type, LastOperationType::Create);
    assert!(op.description.starts_with("Error reconciling Logging: "), "{}", op.description);
    assert!(op.description.contains("seed-bootstrap"));
    assert_eq!(status.last_error.unwrap().description, op.description);

    // The failed create is resumed as a create; success clears the error
    let charts_ok = create_test_context(test_config(false, false));
    let mut ctx = charts_ok.ctx.clone();
    ctx.seed = harness.ctx.seed.clone();
    crate::reconciler::Reconciler::new(ctx)
        .process("garden", "logging")
        .await
        .unwrap();
    let status = stored(&harness.seed, "garden").status.unwrap();
    assert_eq!(status.last_operation.unwrap().operation_type, LastOperationType::Create);
    assert!(status.last_error.is_none());
}

#[tokio::test]
async fn test_delete_with_finalizer() {
    let logging = deleting(with_finalizer(create_test_logging("logging", SHOOT_NAMESPACE, "shoot")));
    let (harness, reconciler) = shoot_setup(true, true, logging);

    reconciler.process(SHOOT_NAMESPACE, "logging").await.unwrap();

    for release in ["event-logger", "kube-rbac-proxy", "shoot-bootstrap"] {
        assert!(harness.charts.deleted().contains(&release.to_string()), "{}", release);
    }
    assert_eq!(
        harness.seed.deleted_managed_resources(),
        vec![(SHOOT_NAMESPACE.to_string(), MANAGED_RESOURCE_NAME.to_string())]
    );
    let calls = harness.seed.calls();
    assert!(calls.contains(&"wait_managed_resource_deleted".to_string()));

    let logging = stored(&harness.seed, SHOOT_NAMESPACE);
    assert!(!logging.has_finalizer());
    let op = logging.status.unwrap().last_operation.unwrap();
    assert_eq!(op.operation_type, LastOperationType::Delete);
    assert_eq!(op.state, LastOperationState::Succeeded);
    assert_eq!(op.description, "Successfully deleted Logging");

    // Without the finalizer a second delete does nothing
    let before = harness.seed.calls().len();
    let charts_before = harness.charts.calls().len();
    reconciler.process(SHOOT_NAMESPACE, "logging").await.unwrap();
    assert_eq!(harness.seed.calls()[before..], ["get_logging", "get_cluster"]);
    assert_eq!(harness.charts.calls().len(), charts_before);
}

#[tokio::test]
async fn test_delete_without_finalizer_is_noop() {
    let (harness, reconciler) = create_test_reconciler(test_config(false, false));
    harness
        .seed
        .add_logging(deleting(create_test_logging("logging", "garden", "seed")));

    reconciler.process("garden", "logging").await.unwrap();

    assert_eq!(harness.seed.calls(), vec!["get_logging"]);
    assert!(harness.charts.calls().is_empty());
    assert!(stored(&harness.seed, "garden").status.is_none());
}

#[tokio::test]
async fn test_failed_delete_keeps_finalizer() {
    let logging = deleting(with_finalizer(create_test_logging("logging", SHOOT_NAMESPACE, "shoot")));
    let (harness, reconciler) = shoot_setup(false, false, logging);
    harness.seed.fail_on("delete_managed_resource");

    let err = reconciler.process(SHOOT_NAMESPACE, "logging").await.unwrap_err();
    assert!(err.to_string().starts_with("Error deleting Logging: "), "{}", err);

    let logging = stored(&harness.seed, SHOOT_NAMESPACE);
    assert!(logging.has_finalizer());
    let op = logging.status.unwrap().last_operation.unwrap();
    assert_eq!(op.operation_type, LastOperationType::Delete);
    assert_eq!(op.state, LastOperationState::Error);
}

#[tokio::test]
async fn test_migrate() {
    let logging = with_operation_annotation(
        with_finalizer(create_test_logging("logging", SHOOT_NAMESPACE, "shoot")),
        "migrate",
    );
    let (harness, reconciler) = shoot_setup(false, false, logging);

    reconciler.process(SHOOT_NAMESPACE, "logging").await.unwrap();

    assert!(harness.charts.deleted().contains(&"shoot-bootstrap".to_string()));
    let logging = stored(&harness.seed, SHOOT_NAMESPACE);
    assert!(logging.metadata.finalizers.is_none());
    assert!(logging.operation_annotation().is_none());
    let op = logging.status.unwrap().last_operation.unwrap();
    assert_eq!(op.operation_type, LastOperationType::Migrate);
    assert_eq!(op.state, LastOperationState::Succeeded);
    assert_eq!(op.description, "Successfully migrated Logging");

    // Migrated resources are left alone afterwards
    let before = harness.seed.calls().len();
    let charts_before = harness.charts.calls().len();
    reconciler.process(SHOOT_NAMESPACE, "logging").await.unwrap();
    assert_eq!(harness.seed.calls().len(), before + 2);
    assert_eq!(harness.charts.calls().len(), charts_before);
}

#[tokio::test]
async fn test_restore() {
    let logging = with_last_operation(
        with_operation_annotation(create_test_logging("logging", SHOOT_NAMESPACE, "shoot"), "restore"),
        LastOperationType::Migrate,
        LastOperationState::Succeeded,
    );
    let (harness, reconciler) = shoot_setup(true, false, logging);

    reconciler.process(SHOOT_NAMESPACE, "logging").await.unwrap();

    let logging = stored(&harness.seed, SHOOT_NAMESPACE);
    assert!(logging.has_finalizer());
    assert!(logging.metadata.annotations.unwrap_or_default().get(OPERATION_ANNOTATION).is_none());
    let status = logging.status.unwrap();
    let op = status.last_operation.unwrap();
    assert_eq!(op.operation_type, LastOperationType::Restore);
    assert_eq!(op.state, LastOperationState::Succeeded);
    assert_eq!(op.description, "Successfully restored Logging");
    assert_eq!(status.units.len(), 2);
    assert!(harness.charts.installed("shoot-bootstrap", SHOOT_NAMESPACE).is_some());
}

#[tokio::test]
async fn test_deletion_takes_precedence_over_migrate_request() {
    let logging = deleting(with_operation_annotation(
        with_finalizer(create_test_logging("logging", "garden", "seed")),
        "migrate",
    ));
    let (harness, reconciler) = create_test_reconciler(test_config(false, false));
    harness.seed.add_logging(logging);

    reconciler.process("garden", "logging").await.unwrap();

    let logging = stored(&harness.seed, "garden");
    assert_eq!(
        logging.status.unwrap().last_operation.unwrap().operation_type,
        LastOperationType::Delete
    );
    assert!(!logging.metadata.finalizers.unwrap_or_default().contains(&FINALIZER_NAME.to_string()));
    // The migrate request stays for whoever handles it next
    assert_eq!(logging.metadata.annotations.unwrap_or_default().get(OPERATION_ANNOTATION).map(String::as_str), Some("migrate"));
}

#[tokio::test]
async fn test_existing_finalizers_are_kept() {
    let mut logging = create_test_logging("logging", "garden", "seed");
    logging.metadata.finalizers = Some(vec!["other".to_string()]);
    let (harness, reconciler) = create_test_reconciler(test_config(false, false));
    harness.seed.add_logging(logging);

    reconciler.process("garden", "logging").await.unwrap();
    assert_eq!(
        stored(&harness.seed, "garden").metadata.finalizers,
        Some(vec!["other".to_string(), FINALIZER_NAME.to_string()])
    );

    let deleted = deleting(stored(&harness.seed, "garden"));
    harness.seed.add_logging(deleted);
    reconciler.process("garden", "logging").await.unwrap();
    assert_eq!(
        stored(&harness.seed, "garden").metadata.finalizers,
        Some(vec!["other".to_string()])
    );
}

fn resource_version(logging: &Logging) -> u64 {
    logging.metadata.resource_version.as_deref().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_delete_releases_finalizer_after_status_writes() {
    let logging = deleting(with_finalizer(create_test_logging("logging", "garden", "seed")));
    let (harness, reconciler) = create_test_reconciler(test_config(false, false));
    harness.seed.add_logging(logging);
    let read = resource_version(&stored(&harness.seed, "garden"));

    reconciler.process("garden", "logging").await.unwrap();

    let logging = stored(&harness.seed, "garden");
    assert!(logging.metadata.finalizers.is_none());
    // Processing, Succeeded, then the finalizer write
    assert_eq!(resource_version(&logging), read + 3);
    let calls = harness.seed.calls();
    let status_writes = calls.iter().filter(|c| *c == "patch_logging_status").count();
    assert_eq!(status_writes, 2);
    assert_eq!(calls.last().map(String::as_str), Some("set_logging_finalizers"));
}

#[tokio::test]
async fn test_migrate_clears_finalizers_and_request_after_status_writes() {
    let mut logging = with_operation_annotation(
        with_finalizer(create_test_logging("logging", SHOOT_NAMESPACE, "shoot")),
        "migrate",
    );
    logging.metadata.finalizers = Some(vec!["other".to_string(), FINALIZER_NAME.to_string()]);
    let (harness, reconciler) = shoot_setup(false, false, logging);
    let read = resource_version(&stored(&harness.seed, SHOOT_NAMESPACE));

    reconciler.process(SHOOT_NAMESPACE, "logging").await.unwrap();

    let logging = stored(&harness.seed, SHOOT_NAMESPACE);
    assert!(logging.metadata.finalizers.is_none());
    assert!(logging.operation_annotation().is_none());
    assert_eq!(resource_version(&logging), read + 4);
    assert_eq!(
        logging.status.unwrap().last_operation.unwrap().state,
        LastOperationState::Succeeded
    );
}

#[tokio::test]
async fn test_stale_resource_version_surfaces_as_seed_error() {
    let logging = create_test_logging("logging", "garden", "seed");
    let (harness, reconciler) = create_test_reconciler(test_config(false, false));
    harness.seed.add_logging(logging);
    reconciler.process("garden", "logging").await.unwrap();

    let stale = serde_json::json!({"metadata": {"resourceVersion": "1"}});
    let err = seed_client::SeedClientTrait::patch_logging_status(&harness.seed, "garden", "logging", stale)
        .await
        .unwrap_err();
    assert!(matches!(err, seed_client::SeedError::Conflict(_)));
    assert!(stored(&harness.seed, "garden").has_finalizer());
}
