//! Test utilities for unit testing reconcilers and actuators
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::actuator::ActuatorContext;
use crate::config::Configuration;
use crate::reconciler::Reconciler;
use chart_renderer::{ImageVector, MockChartApplier};
use crds::*;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use seed_client::{MockSecretsManager, MockSeedClient};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

/// Bundled image vector
pub fn test_image_vector() -> ImageVector {
    ImageVector::from_yaml(include_str!("../../../charts/images.yaml")).unwrap()
}

/// Configuration with the given feature gates and the `evaluation` purpose allow-listed
pub fn test_config(event_logging: bool, node_logging: bool) -> Configuration {
    Configuration {
        shoot_purposes_with_node_logging: BTreeSet::from(["evaluation".to_string()]),
        feature_gates: BTreeMap::from([
            (crate::config::FEATURE_EVENT_LOGGING.to_string(), event_logging),
            (crate::config::FEATURE_SHOOT_NODE_LOGGING.to_string(), node_logging),
        ]),
        ..Default::default()
    }
}

/// Helper to create a test Cluster for a shoot control-plane namespace
///
/// The shoot is awake, its technical ID equals `name` and the seed runs
/// Kubernetes 1.22 with the managed nginx ingress.
pub fn create_test_cluster(name: &str, purpose: Option<&str>) -> Cluster {
    let mut cluster = Cluster::new(name, ClusterSpec::default());
    cluster.spec.shoot.spec.purpose = purpose.map(str::to_string);
    cluster.spec.shoot.status.technical_id = name.to_string();
    cluster.spec.shoot.status.advertised_addresses = vec![AdvertisedAddress {
        name: "external".to_string(),
        url: format!("https://api.{}.example.com", name),
    }];
    cluster.spec.seed.spec.dns.ingress_domain = Some("ingress.seed.example.com".to_string());
    cluster.spec.seed.spec.dns.provider = Some(serde_json::json!({"type": "aws-route53"}));
    cluster.spec.seed.spec.ingress = Some(SeedIngress {
        domain: "ingress.seed.example.com".to_string(),
        controller: IngressController {
            kind: "nginx".to_string(),
        },
    });
    cluster.spec.seed.status.kubernetes_version = Some("v1.22.4".to_string());
    cluster
}

/// Put a cluster into the given hibernation flags
pub fn hibernate(cluster: &mut Cluster, enabled: bool, is_hibernated: bool) {
    cluster.spec.shoot.spec.hibernation = Some(Hibernation { enabled: Some(enabled) });
    cluster.spec.shoot.status.is_hibernated = is_hibernated;
}

/// Helper to create a test Logging resource
pub fn create_test_logging(name: &str, namespace: &str, logging_type: &str) -> Logging {
    let mut logging = Logging::new(
        name,
        LoggingSpec {
            logging_type: logging_type.to_string(),
            hvpa_enabled: false,
        },
    );
    logging.metadata.namespace = Some(namespace.to_string());
    logging.metadata.generation = Some(1);
    logging
}

/// Add the extension finalizer
pub fn with_finalizer(mut logging: Logging) -> Logging {
    logging.metadata.finalizers = Some(vec![FINALIZER_NAME.to_string()]);
    logging
}

/// Mark the resource as being deleted
pub fn deleting(mut logging: Logging) -> Logging {
    logging.metadata.deletion_timestamp = Some(serde_json::from_value(serde_json::json!("2024-05-01T12:00:00Z")).unwrap());
    logging
}

/// Set the `gardener.cloud/operation` annotation
pub fn with_operation_annotation(mut logging: Logging, value: &str) -> Logging {
    logging
        .metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(OPERATION_ANNOTATION.to_string(), value.to_string());
    logging
}

/// Record a last operation in the status
pub fn with_last_operation(mut logging: Logging, operation_type: LastOperationType, state: LastOperationState) -> Logging {
    logging.status.get_or_insert_with(LoggingStatus::default).last_operation = Some(LastOperation {
        operation_type,
        state,
        description: String::new(),
        progress: 100,
        last_update_time: None,
    });
    logging
}

/// An OperatingSystemConfig named `name` in `namespace`
pub fn create_test_osc(name: &str, namespace: &str, units: Vec<Unit>, files: Vec<File>) -> OperatingSystemConfig {
    OperatingSystemConfig {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: OperatingSystemConfigSpec {
            units,
            files,
            extra: BTreeMap::new(),
        },
    }
}

/// Mocked collaborators of the actuators
pub struct TestHarness {
    pub seed: MockSeedClient,
    pub secrets: MockSecretsManager,
    pub charts: MockChartApplier,
    pub ctx: ActuatorContext,
}

/// Helper to create an actuator context over mocks
pub fn create_test_context(config: Configuration) -> TestHarness {
    let seed = MockSeedClient::new();
    let secrets = MockSecretsManager::new();
    let charts = MockChartApplier::new();
    let ctx = ActuatorContext {
        seed: Arc::new(seed.clone()),
        secrets: Arc::new(secrets.clone()),
        charts: Arc::new(charts.clone()),
        image_vector: Arc::new(test_image_vector()),
        config: Arc::new(config),
        charts_path: PathBuf::from("charts"),
    };
    TestHarness {
        seed,
        secrets,
        charts,
        ctx,
    }
}

/// Helper to create a test Reconciler over mocks
pub fn create_test_reconciler(config: Configuration) -> (TestHarness, Reconciler) {
    let harness = create_test_context(config);
    let reconciler = Reconciler::new(harness.ctx.clone());
    (harness, reconciler)
}
