//! ManagedResource projection
//!
//! A ManagedResource bundles serialized objects stored in referenced Secrets;
//! gardener-resource-manager applies them and reports health via conditions.

use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Condition type set once all objects were applied
pub const CONDITION_RESOURCES_APPLIED: &str = "ResourcesApplied";
/// Condition type set once all applied objects are healthy
pub const CONDITION_RESOURCES_HEALTHY: &str = "ResourcesHealthy";

/// Bundle of objects applied by the Gardener resource manager
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[kube(
    group = "resources.gardener.cloud",
    version = "v1alpha1",
    kind = "ManagedResource",
    namespaced,
    status = "ManagedResourceStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResourceSpec {
    /// Resource class; `seed` means the objects target the seed cluster itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    /// Secrets holding the serialized objects
    #[serde(default)]
    pub secret_refs: Vec<LocalObjectReference>,

    /// Keep the objects when the ManagedResource is deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_objects: Option<bool>,
}

/// Reference to an object in the same namespace
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LocalObjectReference {
    /// Object name
    pub name: String,
}

/// Observed state of a ManagedResource
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResourceStatus {
    /// `ResourcesApplied`, `ResourcesHealthy` and friends
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Generation the resource manager last acted on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Status condition of a ManagedResource
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type
    #[serde(rename = "type")]
    pub condition_type: String,
    /// `True`, `False`, `Unknown` or `Progressing`
    pub status: String,
    /// Machine-readable reason
    #[serde(default)]
    pub reason: String,
    /// Human-readable detail
    #[serde(default)]
    pub message: String,
}

impl ManagedResource {
    /// Whether the resource manager has applied the latest generation and
    /// reports every object healthy
    pub fn is_healthy(&self) -> bool {
        if self.metadata.deletion_timestamp.is_some() {
            return false;
        }
        let Some(status) = &self.status else {
            return false;
        };
        if status.observed_generation != self.metadata.generation {
            return false;
        }
        [CONDITION_RESOURCES_APPLIED, CONDITION_RESOURCES_HEALTHY]
            .iter()
            .all(|wanted| {
                status
                    .conditions
                    .iter()
                    .any(|c| c.condition_type == *wanted && c.status == "True")
            })
    }

    /// First unhealthy condition message, used in timeout errors
    pub fn unhealthy_reason(&self) -> Option<String> {
        let status = self.status.as_ref()?;
        status
            .conditions
            .iter()
            .find(|c| c.status != "True")
            .map(|c| format!("{}: {} ({})", c.condition_type, c.reason, c.message))
    }
}
