//! Logging CRD
//!
//! Declares that a cluster carries the logging stack. `type: seed` selects the
//! seed-wide stack in the `garden` namespace, any other type selects the
//! per-shoot control-plane stack.

use crate::operation::{LastError, LastOperation};
use crate::osc::{File, Unit};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Finalizer guarding the teardown of the logging stack
pub const FINALIZER_NAME: &str = "extensions.gardener.cloud/logging";

/// Annotation through which Gardener requests migrate/restore operations
pub const OPERATION_ANNOTATION: &str = "gardener.cloud/operation";
/// `gardener.cloud/operation` value requesting a migration
pub const OPERATION_MIGRATE: &str = "migrate";
/// `gardener.cloud/operation` value requesting a restore
pub const OPERATION_RESTORE: &str = "restore";

/// `spec.type` of the seed-wide logging stack
pub const LOGGING_TYPE_SEED: &str = "seed";
/// `spec.type` of a per-shoot logging stack
pub const LOGGING_TYPE_SHOOT: &str = "shoot";

/// Desired logging stack of a seed or a shoot control plane
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "extensions.gardener.cloud",
    version = "v1alpha1",
    kind = "Logging",
    namespaced,
    status = "LoggingStatus",
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.lastOperation.state"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct LoggingSpec {
    /// `seed` or `shoot`; immutable once set
    #[serde(rename = "type")]
    pub logging_type: String,

    /// Hand the log store's resources over to HVPA
    #[serde(default)]
    pub hvpa_enabled: bool,
}

impl LoggingSpec {
    /// Whether this resource describes the seed-wide stack
    pub fn is_seed(&self) -> bool {
        self.logging_type == LOGGING_TYPE_SEED
    }
}

/// Observed state of a Logging
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoggingStatus {
    /// Most recently attempted operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_operation: Option<LastOperation>,

    /// Error of the last failed operation, cleared on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,

    /// Generation observed by the last successful operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Grafana datasource snippet pointing at the log store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grafana_datasource: Option<String>,

    /// Node-agent units last published (informational)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub units: Vec<Unit>,

    /// Node-agent files last published (informational)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<File>,
}

impl Logging {
    /// Whether the logging finalizer is present
    pub fn has_finalizer(&self) -> bool {
        self.metadata
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|name| name == FINALIZER_NAME))
    }

    /// Value of the `gardener.cloud/operation` annotation, if any
    pub fn operation_annotation(&self) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(OPERATION_ANNOTATION))
            .map(String::as_str)
    }

    /// The recorded last operation
    pub fn last_operation(&self) -> Option<&LastOperation> {
        self.status.as_ref().and_then(|s| s.last_operation.as_ref())
    }
}
