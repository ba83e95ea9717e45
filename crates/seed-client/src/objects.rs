//! Plain object references used by the delete helpers

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;
use std::fmt;

/// Container resource requests keyed by resource name (`cpu`, `memory`, ...)
pub type ResourceRequests = BTreeMap<String, Quantity>;

/// Kinds of objects the logging extension deletes by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum ObjectKind {
    ConfigMap,
    Secret,
    Ingress,
    NetworkPolicy,
    MutatingWebhookConfiguration,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::ConfigMap => "ConfigMap",
            ObjectKind::Secret => "Secret",
            ObjectKind::Ingress => "Ingress",
            ObjectKind::NetworkPolicy => "NetworkPolicy",
            ObjectKind::MutatingWebhookConfiguration => "MutatingWebhookConfiguration",
        };
        f.write_str(name)
    }
}

/// A typed reference to one object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object kind
    pub kind: ObjectKind,
    /// `None` for cluster-scoped kinds
    pub namespace: Option<String>,
    /// Object name
    pub name: String,
}

impl ObjectRef {
    /// Reference to a namespaced object
    pub fn namespaced(kind: ObjectKind, namespace: &str, name: &str) -> Self {
        Self {
            kind,
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        }
    }

    /// Reference to a cluster-scoped object
    pub fn cluster_scoped(kind: ObjectKind, name: &str) -> Self {
        Self {
            kind,
            namespace: None,
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}
