//! Cluster projection
//!
//! Gardener publishes one cluster-scoped `Cluster` object per shoot control-plane
//! namespace, embedding the full Shoot, Seed and CloudProfile documents. Only the
//! fields the logging extension reads are typed here; all structs deserialize
//! leniently so that unrelated schema changes never break reconciliation.

use crate::operation::{LastOperation, LastOperationState, LastOperationType};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Prefix of shoot technical IDs (and control-plane namespaces)
pub const TECHNICAL_ID_PREFIX: &str = "shoot--";

/// Annotation on the Cluster naming the generic token kubeconfig secret
pub const GENERIC_TOKEN_KUBECONFIG_ANNOTATION: &str =
    "generic-token-kubeconfig.secret.gardener.cloud/name";

/// Fallback name of the generic token kubeconfig secret
pub const DEFAULT_GENERIC_TOKEN_KUBECONFIG_SECRET: &str = "generic-token-kubeconfig";

/// Spec of a Gardener `Cluster`, holding the shoot and its seed
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[kube(
    group = "extensions.gardener.cloud",
    version = "v1alpha1",
    kind = "Cluster",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterSpec {
    /// Seed hosting the shoot control plane
    pub seed: Seed,
    /// The shoot itself
    pub shoot: Shoot,
}

/// Shoot embedded in a `Cluster`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Shoot {
    /// Desired shoot state
    pub spec: ShootSpec,
    /// Observed shoot state
    pub status: ShootStatus,
}

/// Fields of the shoot spec this extension reads
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ShootSpec {
    /// Cluster purpose, e.g. `evaluation`, `development`, `production`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// Hibernation request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hibernation: Option<Hibernation>,

    /// Maintenance settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<Maintenance>,
}

/// Shoot hibernation settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Hibernation {
    /// Whether the shoot should be hibernated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Shoot maintenance settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Maintenance {
    /// Daily window for disruptive updates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_window: Option<MaintenanceTimeWindow>,
}

/// Maintenance window in `HHMMSS+ZZZZ` notation
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct MaintenanceTimeWindow {
    /// Window start
    pub begin: String,
    /// Window end
    pub end: String,
}

/// Fields of the shoot status this extension reads
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ShootStatus {
    /// Control-plane namespace in the seed, `shoot--<project>--<name>`
    #[serde(rename = "technicalID")]
    pub technical_id: String,

    /// Whether hibernation has completed
    pub is_hibernated: bool,

    /// API server addresses
    pub advertised_addresses: Vec<AdvertisedAddress>,

    /// Last operation of the shoot, e.g. a running creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_operation: Option<LastOperation>,
}

/// One API server address the shoot advertises
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AdvertisedAddress {
    /// `internal`, `external`, `unmanaged`, ...
    pub name: String,
    /// `https://` URL of the API server
    pub url: String,
}

/// Seed embedded in a `Cluster`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Seed {
    /// Desired seed state
    pub spec: SeedSpec,
    /// Observed seed state
    pub status: SeedStatus,
}

/// Fields of the seed spec this extension reads
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SeedSpec {
    /// DNS settings of the seed
    pub dns: SeedDns,

    /// Ingress settings of the seed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingress: Option<SeedIngress>,
}

/// Seed DNS settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SeedDns {
    /// Legacy ingress domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingress_domain: Option<String>,

    /// Opaque DNS provider configuration; only its presence matters here
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<serde_json::Value>,
}

/// Seed ingress settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SeedIngress {
    /// Ingress domain of the seed
    pub domain: String,
    /// Ingress controller the seed runs
    pub controller: IngressController,
}

/// Ingress controller of a seed
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct IngressController {
    /// Controller kind, `nginx` for the Gardener-managed controller
    pub kind: String,
}

/// Fields of the seed status this extension reads
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SeedStatus {
    /// Kubernetes version of the seed, e.g. `1.24.3`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubernetes_version: Option<String>,
}

impl Shoot {
    /// Whether hibernation is requested in the spec
    pub fn hibernation_enabled(&self) -> bool {
        self.spec
            .hibernation
            .as_ref()
            .and_then(|h| h.enabled)
            .unwrap_or(false)
    }

    /// Whether the shoot is still being created for the first time
    pub fn creation_in_progress(&self) -> bool {
        self.status.last_operation.as_ref().is_some_and(|op| {
            op.operation_type == LastOperationType::Create
                && op.state != LastOperationState::Succeeded
        })
    }

    /// The technical ID without the `shoot--` prefix
    pub fn short_technical_id(&self) -> String {
        self.status.technical_id.replacen(TECHNICAL_ID_PREFIX, "", 1)
    }
}

impl Seed {
    /// The domain under which the seed exposes ingresses
    pub fn ingress_domain(&self) -> Option<&str> {
        self.spec
            .dns
            .ingress_domain
            .as_deref()
            .or_else(|| self.spec.ingress.as_ref().map(|i| i.domain.as_str()))
    }

    /// Whether the seed runs the Gardener-managed nginx ingress controller
    pub fn uses_managed_nginx(&self) -> bool {
        self.spec.dns.provider.is_some()
            && self
                .spec
                .ingress
                .as_ref()
                .is_some_and(|i| i.controller.kind == "nginx")
    }
}

impl Cluster {
    /// Name of the secret holding the generic token kubeconfig
    pub fn generic_token_kubeconfig_secret_name(&self) -> String {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(GENERIC_TOKEN_KUBECONFIG_ANNOTATION))
            .cloned()
            .unwrap_or_else(|| DEFAULT_GENERIC_TOKEN_KUBECONFIG_SECRET.to_string())
    }
}
