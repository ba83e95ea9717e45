//! SeedClient trait for mocking
//!
//! The reconciler, actuators and webhook only see this trait; the concrete
//! kube-backed [`crate::SeedClient`] implements it and tests use
//! `MockSeedClient`.

use crate::error::SeedError;
use crate::objects::{ObjectRef, ResourceRequests};
use crds::{Cluster, Logging, OperatingSystemConfig};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

/// Seed API operations used by the logging extension
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
/// Deletes treat an absent object as success.
#[async_trait::async_trait]
pub trait SeedClientTrait: Send + Sync {
    // Logging resources
    async fn get_logging(&self, namespace: &str, name: &str) -> Result<Option<Logging>, SeedError>;
    async fn patch_logging_status(&self, namespace: &str, name: &str, patch: serde_json::Value) -> Result<(), SeedError>;
    /// Replace the finalizer list, guarded by the object's resourceVersion
    async fn set_logging_finalizers(&self, logging: &Logging, finalizers: Vec<String>) -> Result<(), SeedError>;
    async fn remove_logging_annotation(&self, logging: &Logging, key: &str) -> Result<(), SeedError>;

    /// Fetch the Cluster for a control-plane namespace; absence is an error
    async fn get_cluster(&self, name: &str) -> Result<Cluster, SeedError>;

    // Workloads
    /// Current requests of one container of a StatefulSet, `None` if either is absent
    async fn get_container_requests(&self, namespace: &str, statefulset: &str, container: &str) -> Result<Option<ResourceRequests>, SeedError>;
    async fn scale_statefulset_and_wait(&self, namespace: &str, name: &str, replicas: i32) -> Result<(), SeedError>;
    async fn delete_statefulset(&self, namespace: &str, name: &str) -> Result<(), SeedError>;

    // Persistent volume claims
    /// Requested storage of a PVC, `None` if the PVC does not exist
    async fn get_pvc_storage(&self, namespace: &str, name: &str) -> Result<Option<Quantity>, SeedError>;
    async fn patch_pvc_storage(&self, namespace: &str, name: &str, size: &Quantity) -> Result<(), SeedError>;
    async fn delete_pvc(&self, namespace: &str, name: &str) -> Result<(), SeedError>;

    // Config maps and generic objects
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>, SeedError>;
    async fn list_config_maps(&self, namespace: &str, label_selector: &str) -> Result<Vec<ConfigMap>, SeedError>;
    async fn delete_object(&self, object: &ObjectRef) -> Result<(), SeedError>;

    // Managed resources
    /// Create or update a ManagedResource and the Secret carrying its objects
    async fn apply_managed_resource(&self, namespace: &str, name: &str, class: &str, keep_objects: bool, data: BTreeMap<String, Vec<u8>>) -> Result<(), SeedError>;
    /// Poll until healthy; callers bound the wait with a timeout
    async fn wait_managed_resource_healthy(&self, namespace: &str, name: &str) -> Result<(), SeedError>;
    async fn delete_managed_resource(&self, namespace: &str, name: &str) -> Result<(), SeedError>;
    /// Poll until gone; callers bound the wait with a timeout
    async fn wait_managed_resource_deleted(&self, namespace: &str, name: &str) -> Result<(), SeedError>;

    // Operating system configs
    async fn list_operating_system_configs(&self, namespace: &str) -> Result<Vec<OperatingSystemConfig>, SeedError>;
    /// No-op merge patch that re-triggers admission webhooks
    async fn touch_operating_system_config(&self, namespace: &str, name: &str) -> Result<(), SeedError>;
}
