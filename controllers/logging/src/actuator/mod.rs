//! # Actuators
//!
//! An actuator turns one `Logging` resource into deployed components. The
//! seed actuator owns the seed-wide log shipper and store; the shoot actuator
//! owns a shoot's control-plane log store, event logger and node logging.
//!
//! Restore reuses `reconcile` and migrate reuses `delete`; the reconciler
//! picks the method.

pub mod filters;
pub mod ingress;
pub mod maintenance;
pub mod seed;
pub mod shoot;


use crate::cluster::ClusterContext;
use crate::config::Configuration;
use crate::error::ControllerError;
use crate::node_agent::NodeAgentConfig;
use chart_renderer::{ChartApplierTrait, ImageVector};
use crds::Logging;
use seed_client::{SecretsManagerTrait, SeedClientTrait};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;

/// Name of the log store StatefulSet and its main container
pub const LOKI_NAME: &str = "loki";

/// Lifecycle operations of one component stack
///
/// `cluster` is `None` for seed-typed resources, which belong to no shoot.
#[async_trait::async_trait]
pub trait Actuator: Send + Sync {
    /// Converge the stack; returns the node agent units and files to record
    async fn reconcile(&self, logging: &Logging, cluster: Option<&ClusterContext>) -> Result<NodeAgentConfig, ControllerError>;

    /// Remove the stack
    async fn delete(&self, logging: &Logging, cluster: Option<&ClusterContext>) -> Result<(), ControllerError>;
}

/// Namespace of a Logging; every Logging is namespaced
pub fn namespace_of(logging: &Logging) -> Result<&str, ControllerError> {
    logging
        .metadata
        .namespace
        .as_deref()
        .ok_or_else(|| ControllerError::InvalidConfig("Logging has no namespace".to_string()))
}

/// Collaborators shared by the actuators
#[derive(Clone)]
pub struct ActuatorContext {
    /// Seed API access
    pub seed: Arc<dyn SeedClientTrait>,
    /// Certificate secrets of the shoot stacks
    pub secrets: Arc<dyn SecretsManagerTrait>,
    /// Applies and deletes rendered charts
    pub charts: Arc<dyn ChartApplierTrait>,
    /// Images injected into chart values
    pub image_vector: Arc<ImageVector>,
    /// Controller configuration document
    pub config: Arc<Configuration>,
    /// Directory the chart paths are relative to
    pub charts_path: PathBuf,
}

impl std::fmt::Debug for ActuatorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActuatorContext")
            .field("charts_path", &self.charts_path)
            .finish_non_exhaustive()
    }
}

/// Current requests of the log store container as chart values
///
/// Returns `{"loki": {"requests": {...}}}` so the autoscaler's choice
/// survives a chart apply; limits are never carried.
pub async fn current_requests_values(seed: &dyn SeedClientTrait, namespace: &str) -> Result<Option<Value>, ControllerError> {
    let requests = seed
        .get_container_requests(namespace, LOKI_NAME, LOKI_NAME)
        .await?
        .filter(|r| !r.is_empty());

    match requests {
        Some(requests) => {
            let requests = serde_json::to_value(requests)?;
            Ok(Some(json!({ "loki": { "requests": requests } })))
        }
        None => Ok(None),
    }
}
