//! Kube-backed seed client
//!
//! Thin wrappers around `kube::Api` calls. Waits poll every
//! [`POLL_INTERVAL`] and never give up on their own.

use crate::error::{is_not_found, SeedError};
use crate::objects::{ObjectKind, ObjectRef, ResourceRequests};
use crate::seed_trait::SeedClientTrait;
use crds::{Cluster, Logging, ManagedResource, OperatingSystemConfig};
use k8s_openapi::api::admissionregistration::v1::MutatingWebhookConfiguration;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Secret};
use k8s_openapi::api::networking::v1::{Ingress, NetworkPolicy};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::ByteString;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::Client;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Interval between polls of wait helpers
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Field manager used for server-side apply
const FIELD_MANAGER: &str = "gardener-extension-logging";

/// Seed API client
#[derive(Clone)]
pub struct SeedClient {
    client: Client,
}

impl std::fmt::Debug for SeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedClient").finish_non_exhaustive()
    }
}

impl SeedClient {
    /// Create a new seed client from an existing kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// The underlying kube client
    pub fn kube_client(&self) -> Client {
        self.client.clone()
    }

    fn namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn delete_named<K>(api: Api<K>, name: &str) -> Result<(), SeedError>
    where
        K: kube::Resource + Clone + serde::de::DeserializeOwned + std::fmt::Debug,
    {
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait::async_trait]
impl SeedClientTrait for SeedClient {
    async fn get_logging(&self, namespace: &str, name: &str) -> Result<Option<Logging>, SeedError> {
        Ok(self.namespaced::<Logging>(namespace).get_opt(name).await?)
    }

    async fn patch_logging_status(&self, namespace: &str, name: &str, patch: serde_json::Value) -> Result<(), SeedError> {
        self.namespaced::<Logging>(namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn set_logging_finalizers(&self, logging: &Logging, finalizers: Vec<String>) -> Result<(), SeedError> {
        let (namespace, name) = logging_key(logging)?;
        let patch = finalizers_patch(&finalizers);
        self.namespaced::<Logging>(&namespace)
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn remove_logging_annotation(&self, logging: &Logging, key: &str) -> Result<(), SeedError> {
        let (namespace, name) = logging_key(logging)?;
        let patch = annotation_removal_patch(key);
        self.namespaced::<Logging>(&namespace)
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn get_cluster(&self, name: &str) -> Result<Cluster, SeedError> {
        let api: Api<Cluster> = Api::all(self.client.clone());
        api.get_opt(name)
            .await?
            .ok_or_else(|| SeedError::NotFound(format!("Cluster {}", name)))
    }

    async fn get_container_requests(&self, namespace: &str, statefulset: &str, container: &str) -> Result<Option<ResourceRequests>, SeedError> {
        let Some(sts) = self.namespaced::<StatefulSet>(namespace).get_opt(statefulset).await? else {
            return Ok(None);
        };
        Ok(sts
            .spec
            .and_then(|spec| spec.template.spec)
            .and_then(|pod| pod.containers.into_iter().find(|c| c.name == container))
            .and_then(|c| c.resources)
            .and_then(|r| r.requests))
    }

    async fn scale_statefulset_and_wait(&self, namespace: &str, name: &str, replicas: i32) -> Result<(), SeedError> {
        let api = self.namespaced::<StatefulSet>(namespace);
        let patch = serde_json::json!({ "spec": { "replicas": replicas } });
        match api.patch_scale(name, &PatchParams::default(), &Patch::Merge(&patch)).await {
            Ok(_) => {}
            Err(e) if is_not_found(&e) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        info!("Scaled StatefulSet {}/{} to {} replicas, waiting", namespace, name, replicas);

        loop {
            let Some(sts) = api.get_opt(name).await? else {
                return Ok(());
            };
            let current = sts.status.as_ref().map_or(0, |s| s.replicas);
            let observed = sts.status.as_ref().and_then(|s| s.observed_generation);
            if current == replicas && observed >= sts.metadata.generation {
                return Ok(());
            }
            debug!("StatefulSet {}/{} has {} replicas, want {}", namespace, name, current, replicas);
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn delete_statefulset(&self, namespace: &str, name: &str) -> Result<(), SeedError> {
        Self::delete_named(self.namespaced::<StatefulSet>(namespace), name).await
    }

    async fn get_pvc_storage(&self, namespace: &str, name: &str) -> Result<Option<Quantity>, SeedError> {
        let Some(pvc) = self.namespaced::<PersistentVolumeClaim>(namespace).get_opt(name).await? else {
            return Ok(None);
        };
        pvc.spec
            .and_then(|s| s.resources)
            .and_then(|r| r.requests)
            .and_then(|mut requests| requests.remove("storage"))
            .map(Some)
            .ok_or_else(|| SeedError::InvalidState(format!("PVC {}/{} has no storage request", namespace, name)))
    }

    async fn patch_pvc_storage(&self, namespace: &str, name: &str, size: &Quantity) -> Result<(), SeedError> {
        let patch = serde_json::json!({
            "spec": { "resources": { "requests": { "storage": size } } }
        });
        self.namespaced::<PersistentVolumeClaim>(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn delete_pvc(&self, namespace: &str, name: &str) -> Result<(), SeedError> {
        Self::delete_named(self.namespaced::<PersistentVolumeClaim>(namespace), name).await
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>, SeedError> {
        Ok(self.namespaced::<ConfigMap>(namespace).get_opt(name).await?)
    }

    async fn list_config_maps(&self, namespace: &str, label_selector: &str) -> Result<Vec<ConfigMap>, SeedError> {
        let list = self
            .namespaced::<ConfigMap>(namespace)
            .list(&ListParams::default().labels(label_selector))
            .await?;
        Ok(list.items)
    }

    async fn delete_object(&self, object: &ObjectRef) -> Result<(), SeedError> {
        debug!("Deleting {}", object);
        let namespace = object.namespace.as_deref().unwrap_or_default();
        match object.kind {
            ObjectKind::ConfigMap => Self::delete_named(self.namespaced::<ConfigMap>(namespace), &object.name).await,
            ObjectKind::Secret => Self::delete_named(self.namespaced::<Secret>(namespace), &object.name).await,
            ObjectKind::Ingress => Self::delete_named(self.namespaced::<Ingress>(namespace), &object.name).await,
            ObjectKind::NetworkPolicy => Self::delete_named(self.namespaced::<NetworkPolicy>(namespace), &object.name).await,
            ObjectKind::MutatingWebhookConfiguration => {
                let api: Api<MutatingWebhookConfiguration> = Api::all(self.client.clone());
                Self::delete_named(api, &object.name).await
            }
        }
    }

    async fn apply_managed_resource(&self, namespace: &str, name: &str, class: &str, keep_objects: bool, data: BTreeMap<String, Vec<u8>>) -> Result<(), SeedError> {
        let secret_name = managed_resource_secret_name(name);
        let secret = serde_json::json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": { "name": secret_name, "namespace": namespace },
            "type": "Opaque",
            "data": data
                .into_iter()
                .map(|(k, v)| (k, ByteString(v)))
                .collect::<BTreeMap<_, _>>(),
        });
        let params = PatchParams::apply(FIELD_MANAGER).force();
        self.namespaced::<Secret>(namespace)
            .patch(&secret_name, &params, &Patch::Apply(&secret))
            .await?;

        let managed_resource = serde_json::json!({
            "apiVersion": "resources.gardener.cloud/v1alpha1",
            "kind": "ManagedResource",
            "metadata": { "name": name, "namespace": namespace },
            "spec": {
                "class": class,
                "secretRefs": [{ "name": secret_name }],
                "keepObjects": keep_objects,
            },
        });
        self.namespaced::<ManagedResource>(namespace)
            .patch(name, &params, &Patch::Apply(&managed_resource))
            .await?;
        info!("Applied ManagedResource {}/{}", namespace, name);
        Ok(())
    }

    async fn wait_managed_resource_healthy(&self, namespace: &str, name: &str) -> Result<(), SeedError> {
        let api = self.namespaced::<ManagedResource>(namespace);
        loop {
            match api.get_opt(name).await? {
                Some(mr) if mr.is_healthy() => return Ok(()),
                Some(mr) => debug!(
                    "ManagedResource {}/{} not healthy yet: {}",
                    namespace,
                    name,
                    mr.unhealthy_reason().unwrap_or_else(|| "no status".to_string())
                ),
                None => debug!("ManagedResource {}/{} does not exist yet", namespace, name),
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn delete_managed_resource(&self, namespace: &str, name: &str) -> Result<(), SeedError> {
        Self::delete_named(self.namespaced::<ManagedResource>(namespace), name).await?;
        Self::delete_named(self.namespaced::<Secret>(namespace), &managed_resource_secret_name(name)).await
    }

    async fn wait_managed_resource_deleted(&self, namespace: &str, name: &str) -> Result<(), SeedError> {
        let api = self.namespaced::<ManagedResource>(namespace);
        while api.get_opt(name).await?.is_some() {
            debug!("ManagedResource {}/{} still exists", namespace, name);
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Ok(())
    }

    async fn list_operating_system_configs(&self, namespace: &str) -> Result<Vec<OperatingSystemConfig>, SeedError> {
        let list = self
            .namespaced::<OperatingSystemConfig>(namespace)
            .list(&ListParams::default())
            .await?;
        Ok(list.items)
    }

    async fn touch_operating_system_config(&self, namespace: &str, name: &str) -> Result<(), SeedError> {
        let patch = serde_json::json!({});
        self.namespaced::<OperatingSystemConfig>(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

/// Name of the Secret carrying a ManagedResource's objects
pub fn managed_resource_secret_name(managed_resource: &str) -> String {
    format!("managedresource-{}", managed_resource)
}

/// Merge patch replacing the finalizer list of a Logging
///
/// Carries no `resourceVersion`. The status checkpoints written earlier in
/// the same pass have already moved the stored version past the one read.
pub(crate) fn finalizers_patch(finalizers: &[String]) -> serde_json::Value {
    serde_json::json!({ "metadata": { "finalizers": finalizers } })
}

/// Merge patch dropping one annotation
pub(crate) fn annotation_removal_patch(key: &str) -> serde_json::Value {
    let mut annotations = serde_json::Map::new();
    annotations.insert(key.to_string(), serde_json::Value::Null);
    serde_json::json!({ "metadata": { "annotations": annotations } })
}

pub(crate) fn logging_key(logging: &Logging) -> Result<(String, String), SeedError> {
    let name = logging
        .metadata
        .name
        .clone()
        .ok_or_else(|| SeedError::InvalidState("Logging has no name".to_string()))?;
    let namespace = logging
        .metadata
        .namespace
        .clone()
        .ok_or_else(|| SeedError::InvalidState(format!("Logging {} has no namespace", name)))?;
    Ok((namespace, name))
}
