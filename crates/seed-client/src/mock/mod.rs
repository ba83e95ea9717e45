//! Mock SeedClient for unit testing
//!
//! In-memory implementation of [`SeedClientTrait`] used by the controller
//! tests without a seed API server. Objects are keyed by `(namespace, name)`.
//! Every call is appended to a call log so tests can assert ordering, and any
//! method can be made to fail with [`MockSeedClient::fail_on`].
//!
//! Loggings carry a `resourceVersion` that moves on every write. A patch
//! naming an older version is rejected with [`SeedError::Conflict`], as the
//! API server answers 409.
//!
//! - `secrets.rs` - in-memory secrets manager

mod secrets;

pub use secrets::MockSecretsManager;

use crate::client::{annotation_removal_patch, finalizers_patch, logging_key};
use crate::error::SeedError;
use crate::objects::{ObjectRef, ResourceRequests};
use crate::seed_trait::SeedClientTrait;
use crds::{Cluster, Logging, OperatingSystemConfig};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

/// ManagedResource as recorded by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedManagedResource {
    /// Resource class
    pub class: String,
    /// Whether objects outlive the ManagedResource
    pub keep_objects: bool,
    /// Serialized objects by file name
    pub data: BTreeMap<String, Vec<u8>>,
}

/// Mock SeedClient for testing
#[derive(Debug, Clone, Default)]
pub struct MockSeedClient {
    pub(crate) loggings: Arc<Mutex<HashMap<Key, Logging>>>,
    pub(crate) clusters: Arc<Mutex<HashMap<String, Cluster>>>,
    pub(crate) container_requests: Arc<Mutex<HashMap<(String, String, String), ResourceRequests>>>,
    pub(crate) pvcs: Arc<Mutex<HashMap<Key, Quantity>>>,
    pub(crate) config_maps: Arc<Mutex<HashMap<Key, ConfigMap>>>,
    pub(crate) managed_resources: Arc<Mutex<HashMap<Key, RecordedManagedResource>>>,
    pub(crate) oscs: Arc<Mutex<HashMap<Key, OperatingSystemConfig>>>,
    // Recorded side effects
    pub(crate) calls: Arc<Mutex<Vec<String>>>,
    pub(crate) scaled: Arc<Mutex<Vec<(String, String, i32)>>>,
    pub(crate) deleted_statefulsets: Arc<Mutex<Vec<Key>>>,
    pub(crate) patched_pvcs: Arc<Mutex<Vec<(String, String, Quantity)>>>,
    pub(crate) deleted_pvcs: Arc<Mutex<Vec<Key>>>,
    pub(crate) deleted_objects: Arc<Mutex<Vec<ObjectRef>>>,
    pub(crate) deleted_managed_resources: Arc<Mutex<Vec<Key>>>,
    pub(crate) touched: Arc<Mutex<Vec<Key>>>,
    // Behaviour switches
    pub(crate) failing: Arc<Mutex<HashSet<String>>>,
    pub(crate) unhealthy: Arc<Mutex<HashSet<Key>>>,
    pub(crate) stuck_deleting: Arc<Mutex<HashSet<Key>>>,
}

impl MockSeedClient {
    /// Create an empty mock
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a Logging to the mock store (for test setup)
    ///
    /// The stored copy gets a fresh resourceVersion.
    pub fn add_logging(&self, mut logging: Logging) {
        let namespace = logging.metadata.namespace.clone().unwrap_or_default();
        let name = logging.metadata.name.clone().unwrap_or_default();
        let mut loggings = self.loggings.lock().unwrap();
        let current = loggings
            .get(&(namespace.clone(), name.clone()))
            .and_then(|stored| stored.metadata.resource_version.clone())
            .or(logging.metadata.resource_version.clone());
        logging.metadata.resource_version = Some(next_resource_version(current.as_deref()));
        loggings.insert((namespace, name), logging);
    }

    /// Current stored Logging
    pub fn logging(&self, namespace: &str, name: &str) -> Option<Logging> {
        self.loggings.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    /// Add a Cluster to the mock store (for test setup)
    pub fn add_cluster(&self, cluster: Cluster) {
        let name = cluster.metadata.name.clone().unwrap_or_default();
        self.clusters.lock().unwrap().insert(name, cluster);
    }

    /// Set container requests of a StatefulSet (for test setup)
    pub fn set_container_requests(&self, namespace: &str, statefulset: &str, container: &str, requests: ResourceRequests) {
        self.container_requests.lock().unwrap().insert(
            (namespace.to_string(), statefulset.to_string(), container.to_string()),
            requests,
        );
    }

    /// Set the requested storage of a PVC (for test setup)
    pub fn set_pvc_storage(&self, namespace: &str, name: &str, size: &str) {
        self.pvcs
            .lock()
            .unwrap()
            .insert(key(namespace, name), Quantity(size.to_string()));
    }

    /// Add a ConfigMap to the mock store (for test setup)
    pub fn add_config_map(&self, config_map: ConfigMap) {
        let namespace = config_map.metadata.namespace.clone().unwrap_or_default();
        let name = config_map.metadata.name.clone().unwrap_or_default();
        self.config_maps.lock().unwrap().insert((namespace, name), config_map);
    }

    /// Add an OperatingSystemConfig to the mock store (for test setup)
    pub fn add_operating_system_config(&self, osc: OperatingSystemConfig) {
        let namespace = osc.metadata.namespace.clone().unwrap_or_default();
        let name = osc.metadata.name.clone().unwrap_or_default();
        self.oscs.lock().unwrap().insert((namespace, name), osc);
    }

    /// Make every call of `method` fail
    pub fn fail_on(&self, method: &str) {
        self.failing.lock().unwrap().insert(method.to_string());
    }

    /// Make a ManagedResource never become healthy
    pub fn set_managed_resource_unhealthy(&self, namespace: &str, name: &str) {
        self.unhealthy.lock().unwrap().insert(key(namespace, name));
    }

    /// Make a ManagedResource never disappear after deletion
    pub fn set_managed_resource_stuck(&self, namespace: &str, name: &str) {
        self.stuck_deleting.lock().unwrap().insert(key(namespace, name));
    }

    /// Names of the trait methods called so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// StatefulSet scale requests as `(namespace, name, replicas)`
    pub fn scaled(&self) -> Vec<(String, String, i32)> {
        self.scaled.lock().unwrap().clone()
    }

    /// Deleted StatefulSets
    pub fn deleted_statefulsets(&self) -> Vec<(String, String)> {
        self.deleted_statefulsets.lock().unwrap().clone()
    }

    /// PVC resizes as `(namespace, name, size)`
    pub fn patched_pvcs(&self) -> Vec<(String, String, Quantity)> {
        self.patched_pvcs.lock().unwrap().clone()
    }

    /// Deleted PVCs
    pub fn deleted_pvcs(&self) -> Vec<(String, String)> {
        self.deleted_pvcs.lock().unwrap().clone()
    }

    /// Objects deleted by reference
    pub fn deleted_objects(&self) -> Vec<ObjectRef> {
        self.deleted_objects.lock().unwrap().clone()
    }

    /// Deleted ManagedResources
    pub fn deleted_managed_resources(&self) -> Vec<(String, String)> {
        self.deleted_managed_resources.lock().unwrap().clone()
    }

    /// OperatingSystemConfigs touched to trigger the webhook
    pub fn touched(&self) -> Vec<(String, String)> {
        self.touched.lock().unwrap().clone()
    }

    /// Applied ManagedResource, if present
    pub fn managed_resource(&self, namespace: &str, name: &str) -> Option<RecordedManagedResource> {
        self.managed_resources.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    fn record(&self, method: &str) -> Result<(), SeedError> {
        self.calls.lock().unwrap().push(method.to_string());
        if self.failing.lock().unwrap().contains(method) {
            return Err(SeedError::InvalidState(format!("injected failure in {}", method)));
        }
        Ok(())
    }

    /// Apply a merge patch to a stored Logging like the API server would
    fn merge_logging(&self, namespace: &str, name: &str, patch: &serde_json::Value) -> Result<(), SeedError> {
        let mut loggings = self.loggings.lock().unwrap();
        let stored = loggings
            .get_mut(&key(namespace, name))
            .ok_or_else(|| SeedError::NotFound(format!("logging {}/{}", namespace, name)))?;

        let current = stored.metadata.resource_version.clone();
        if let Some(sent) = patch.pointer("/metadata/resourceVersion").and_then(serde_json::Value::as_str) {
            if current.as_deref() != Some(sent) {
                return Err(SeedError::Conflict(format!(
                    "logging {}/{}: sent resourceVersion {} but current is {}",
                    namespace,
                    name,
                    sent,
                    current.as_deref().unwrap_or("<none>")
                )));
            }
        }

        let mut doc = serde_json::to_value(&*stored)?;
        json_patch::merge(&mut doc, patch);
        let mut updated: Logging = serde_json::from_value(doc)?;
        if updated.metadata.finalizers.as_ref().is_some_and(Vec::is_empty) {
            updated.metadata.finalizers = None;
        }
        updated.metadata.resource_version = Some(next_resource_version(current.as_deref()));
        *stored = updated;
        Ok(())
    }
}

fn next_resource_version(current: Option<&str>) -> String {
    let current: u64 = current.and_then(|rv| rv.parse().ok()).unwrap_or(0);
    (current + 1).to_string()
}

fn matches_selector(config_map: &ConfigMap, selector: &str) -> bool {
    let labels = config_map.metadata.labels.clone().unwrap_or_default();
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((k, v)) => labels.get(k).is_some_and(|actual| actual == v),
            None => labels.contains_key(term),
        })
}

#[async_trait::async_trait]
impl SeedClientTrait for MockSeedClient {
    async fn get_logging(&self, namespace: &str, name: &str) -> Result<Option<Logging>, SeedError> {
        self.record("get_logging")?;
        Ok(self.logging(namespace, name))
    }

    async fn patch_logging_status(&self, namespace: &str, name: &str, patch: serde_json::Value) -> Result<(), SeedError> {
        self.record("patch_logging_status")?;
        self.merge_logging(namespace, name, &patch)
    }

    async fn set_logging_finalizers(&self, logging: &Logging, finalizers: Vec<String>) -> Result<(), SeedError> {
        self.record("set_logging_finalizers")?;
        let (namespace, name) = logging_key(logging)?;
        self.merge_logging(&namespace, &name, &finalizers_patch(&finalizers))
    }

    async fn remove_logging_annotation(&self, logging: &Logging, annotation: &str) -> Result<(), SeedError> {
        self.record("remove_logging_annotation")?;
        let (namespace, name) = logging_key(logging)?;
        self.merge_logging(&namespace, &name, &annotation_removal_patch(annotation))
    }

    async fn get_cluster(&self, name: &str) -> Result<Cluster, SeedError> {
        self.record("get_cluster")?;
        self.clusters
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| SeedError::NotFound(format!("cluster {}", name)))
    }

    async fn get_container_requests(&self, namespace: &str, statefulset: &str, container: &str) -> Result<Option<ResourceRequests>, SeedError> {
        self.record("get_container_requests")?;
        Ok(self
            .container_requests
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), statefulset.to_string(), container.to_string()))
            .cloned())
    }

    async fn scale_statefulset_and_wait(&self, namespace: &str, name: &str, replicas: i32) -> Result<(), SeedError> {
        self.record("scale_statefulset_and_wait")?;
        self.scaled
            .lock()
            .unwrap()
            .push((namespace.to_string(), name.to_string(), replicas));
        Ok(())
    }

    async fn delete_statefulset(&self, namespace: &str, name: &str) -> Result<(), SeedError> {
        self.record("delete_statefulset")?;
        self.deleted_statefulsets.lock().unwrap().push(key(namespace, name));
        Ok(())
    }

    async fn get_pvc_storage(&self, namespace: &str, name: &str) -> Result<Option<Quantity>, SeedError> {
        self.record("get_pvc_storage")?;
        Ok(self.pvcs.lock().unwrap().get(&key(namespace, name)).cloned())
    }

    async fn patch_pvc_storage(&self, namespace: &str, name: &str, size: &Quantity) -> Result<(), SeedError> {
        self.record("patch_pvc_storage")?;
        self.pvcs.lock().unwrap().insert(key(namespace, name), size.clone());
        self.patched_pvcs
            .lock()
            .unwrap()
            .push((namespace.to_string(), name.to_string(), size.clone()));
        Ok(())
    }

    async fn delete_pvc(&self, namespace: &str, name: &str) -> Result<(), SeedError> {
        self.record("delete_pvc")?;
        self.pvcs.lock().unwrap().remove(&key(namespace, name));
        self.deleted_pvcs.lock().unwrap().push(key(namespace, name));
        Ok(())
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>, SeedError> {
        self.record("get_config_map")?;
        Ok(self.config_maps.lock().unwrap().get(&key(namespace, name)).cloned())
    }

    async fn list_config_maps(&self, namespace: &str, label_selector: &str) -> Result<Vec<ConfigMap>, SeedError> {
        self.record("list_config_maps")?;
        // HashMap order is arbitrary, like list order from the API server
        Ok(self
            .config_maps
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), cm)| ns == namespace && matches_selector(cm, label_selector))
            .map(|(_, cm)| cm.clone())
            .collect())
    }

    async fn delete_object(&self, object: &ObjectRef) -> Result<(), SeedError> {
        self.record("delete_object")?;
        self.deleted_objects.lock().unwrap().push(object.clone());
        Ok(())
    }

    async fn apply_managed_resource(&self, namespace: &str, name: &str, class: &str, keep_objects: bool, data: BTreeMap<String, Vec<u8>>) -> Result<(), SeedError> {
        self.record("apply_managed_resource")?;
        self.managed_resources.lock().unwrap().insert(
            key(namespace, name),
            RecordedManagedResource {
                class: class.to_string(),
                keep_objects,
                data,
            },
        );
        Ok(())
    }

    async fn wait_managed_resource_healthy(&self, namespace: &str, name: &str) -> Result<(), SeedError> {
        self.record("wait_managed_resource_healthy")?;
        if self.unhealthy.lock().unwrap().contains(&key(namespace, name)) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn delete_managed_resource(&self, namespace: &str, name: &str) -> Result<(), SeedError> {
        self.record("delete_managed_resource")?;
        if !self.stuck_deleting.lock().unwrap().contains(&key(namespace, name)) {
            self.managed_resources.lock().unwrap().remove(&key(namespace, name));
        }
        self.deleted_managed_resources.lock().unwrap().push(key(namespace, name));
        Ok(())
    }

    async fn wait_managed_resource_deleted(&self, namespace: &str, name: &str) -> Result<(), SeedError> {
        self.record("wait_managed_resource_deleted")?;
        if self.stuck_deleting.lock().unwrap().contains(&key(namespace, name)) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn list_operating_system_configs(&self, namespace: &str) -> Result<Vec<OperatingSystemConfig>, SeedError> {
        self.record("list_operating_system_configs")?;
        let mut oscs: Vec<_> = self
            .oscs
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, osc)| osc.clone())
            .collect();
        oscs.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        Ok(oscs)
    }

    async fn touch_operating_system_config(&self, namespace: &str, name: &str) -> Result<(), SeedError> {
        self.record("touch_operating_system_config")?;
        self.touched.lock().unwrap().push(key(namespace, name));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::LoggingSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn logging() -> Logging {
        let mut logging = Logging::new(
            "logging",
            LoggingSpec {
                logging_type: "shoot".to_string(),
                hvpa_enabled: false,
            },
        );
        logging.metadata.namespace = Some("shoot--dev--foo".to_string());
        logging
    }

    #[tokio::test]
    async fn test_status_patch_is_merged() {
        let mock = MockSeedClient::new();
        mock.add_logging(logging());

        mock.patch_logging_status(
            "shoot--dev--foo",
            "logging",
            serde_json::json!({"status": {"observedGeneration": 3, "grafanaDatasource": "x"}}),
        )
        .await
        .unwrap();
        mock.patch_logging_status(
            "shoot--dev--foo",
            "logging",
            serde_json::json!({"status": {"grafanaDatasource": null}}),
        )
        .await
        .unwrap();

        let status = mock.logging("shoot--dev--foo", "logging").unwrap().status.unwrap();
        assert_eq!(status.observed_generation, Some(3));
        assert!(status.grafana_datasource.is_none());
    }

    #[tokio::test]
    async fn test_writes_move_resource_version() {
        let mock = MockSeedClient::new();
        mock.add_logging(logging());
        let read = mock.logging("shoot--dev--foo", "logging").unwrap();
        assert_eq!(read.metadata.resource_version.as_deref(), Some("1"));

        mock.patch_logging_status("shoot--dev--foo", "logging", serde_json::json!({"status": {"observedGeneration": 1}}))
            .await
            .unwrap();
        mock.set_logging_finalizers(&read, vec!["a".to_string()]).await.unwrap();

        let stored = mock.logging("shoot--dev--foo", "logging").unwrap();
        assert_eq!(stored.metadata.resource_version.as_deref(), Some("3"));
        assert_eq!(stored.metadata.finalizers, Some(vec!["a".to_string()]));

        mock.set_logging_finalizers(&read, Vec::new()).await.unwrap();
        assert!(mock.logging("shoot--dev--foo", "logging").unwrap().metadata.finalizers.is_none());
    }

    #[tokio::test]
    async fn test_stale_resource_version_conflicts() {
        let mock = MockSeedClient::new();
        mock.add_logging(logging());
        mock.patch_logging_status("shoot--dev--foo", "logging", serde_json::json!({"status": {"observedGeneration": 1}}))
            .await
            .unwrap();

        let stale = serde_json::json!({"metadata": {"resourceVersion": "1", "finalizers": []}});
        let err = mock.patch_logging_status("shoot--dev--foo", "logging", stale).await.unwrap_err();
        assert!(matches!(err, SeedError::Conflict(_)), "{}", err);

        let current = serde_json::json!({"metadata": {"resourceVersion": "2", "labels": {"a": "b"}}});
        mock.patch_logging_status("shoot--dev--foo", "logging", current).await.unwrap();
    }

    #[tokio::test]
    async fn test_fail_on_injects_error() {
        let mock = MockSeedClient::new();
        mock.fail_on("get_cluster");
        assert!(matches!(mock.get_cluster("x").await, Err(SeedError::InvalidState(_))));
        assert_eq!(mock.calls(), vec!["get_cluster".to_string()]);
    }

    #[tokio::test]
    async fn test_list_config_maps_filters_by_label() {
        let mock = MockSeedClient::new();
        let mut labels = BTreeMap::new();
        labels.insert("extensions.gardener.cloud/configuration".to_string(), "logging".to_string());
        mock.add_config_map(ConfigMap {
            metadata: ObjectMeta {
                name: Some("a".to_string()),
                namespace: Some("garden".to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            ..Default::default()
        });
        mock.add_config_map(ConfigMap {
            metadata: ObjectMeta {
                name: Some("b".to_string()),
                namespace: Some("garden".to_string()),
                ..Default::default()
            },
            ..Default::default()
        });

        let found = mock
            .list_config_maps("garden", "extensions.gardener.cloud/configuration=logging")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].metadata.name.as_deref(), Some("a"));
    }
}
