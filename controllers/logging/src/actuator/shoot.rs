//! # Shoot Actuator
//!
//! Manages the logging stack in a shoot's control-plane namespace on the
//! seed: the log store (`shoot-bootstrap` chart), the optional event logger,
//! and, for allow-listed purposes, node logging. Node logging consists of the
//! auth proxy RBAC, the ingress certificates and the promtail units and
//! files, which reach the nodes through the `promtail-config` ConfigMap
//! shipped in a ManagedResource and merged into OperatingSystemConfigs by
//! the webhook.
//!
//! Reconcile steps run strictly in this order:
//!
//! 1. replicas from hibernation
//! 2. event logger on/off
//! 3. node logging on/off
//! 4. autoscaler values
//! 5. chart apply
//! 6. ManagedResource publication and health wait
//! 7. OSC touch-up

use super::ingress::compute_nginx_ingress_class;
use super::{current_requests_values, namespace_of, Actuator, ActuatorContext};
use crate::charts;
use crate::cluster::ClusterContext;
use crate::error::ControllerError;
use crate::node_agent::{self, NodeAgentConfig, NodeAgentInput};
use crate::secrets::{self, CA_NAME, LOKI_HOST_PREFIX, LOKI_TLS_NAME};
use crds::{Logging, ORIGINAL_OSC_SUFFIX};
use seed_client::{ObjectKind, ObjectRef};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// ManagedResource carrying the node agent artifact
pub const MANAGED_RESOURCE_NAME: &str = "extension-logging-controlplane";
/// Class of the resource manager that applies [`MANAGED_RESOURCE_NAME`]
pub const MANAGED_RESOURCE_CLASS: &str = "seed";
/// Upper bound for the ManagedResource to turn healthy after an apply
pub const MANAGED_RESOURCE_HEALTHY_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const MANAGED_RESOURCE_DELETED_TIMEOUT: Duration = Duration::from_secs(2 * 60);

pub const PRIORITY_CLASS_SHOOT: &str = "gardener-shoot-controlplane-100";
pub const LOKI_SERVICE_NAME: &str = "loki";
pub const LOKI_SERVICE_PORT: u16 = 8080;
pub const LOKI_PUSH_PATH: &str = "/loki/api/v1/push";

/// Objects of the node-logging path that only exist while it is enabled
pub const MUTATING_WEBHOOK_NAME: &str = "gardener-extension-logging";
pub const INGRESS_NAME: &str = "loki";
pub const TELEGRAF_NETWORK_POLICY_NAME: &str = "allow-from-prometheus-to-loki-telegraf";
pub const TELEGRAF_CONFIG_MAP_NAME: &str = "telegraf-config";

/// Actuator for every non-seed type
#[derive(Debug, Clone)]
pub struct ShootActuator {
    ctx: ActuatorContext,
}

impl ShootActuator {
    /// Create an actuator over the shared collaborators
    pub fn new(ctx: ActuatorContext) -> Self {
        Self { ctx }
    }

    async fn ensure_event_logger(&self, namespace: &str, cluster: &ClusterContext) -> Result<(), ControllerError> {
        let chart = charts::event_logger();
        if !self.ctx.config.is_event_logging_enabled() {
            debug!("Event logging disabled, removing event logger from {}", namespace);
            chart.delete(self.ctx.charts.as_ref(), namespace).await?;
            return Ok(());
        }

        let image = self.ctx.image_vector.find_image(charts::IMAGE_EVENT_LOGGER)?;
        let values = json!({
            "image": image.to_string(),
            "replicas": 1,
            "genericTokenKubeconfigSecretName": cluster.generic_token_kubeconfig_secret,
        });
        chart
            .apply(
                self.ctx.charts.as_ref(),
                &self.ctx.charts_path,
                namespace,
                &self.ctx.image_vector,
                values,
            )
            .await?;
        Ok(())
    }

    /// Deploy the node-logging path; adds its values to `loki`
    async fn enable_node_logging(&self, namespace: &str, cluster: &ClusterContext, loki: &mut Value) -> Result<NodeAgentConfig, ControllerError> {
        charts::kube_rbac_proxy()
            .apply(
                self.ctx.charts.as_ref(),
                &self.ctx.charts_path,
                namespace,
                &self.ctx.image_vector,
                json!({}),
            )
            .await?;

        let ingress_class = compute_nginx_ingress_class(&cluster.seed)?;

        let configs = secrets::configs_for(cluster);
        let bundles = self.ctx.secrets.ensure_all(namespace, &configs).await?;
        let tls = bundles
            .get(LOKI_TLS_NAME)
            .ok_or_else(|| ControllerError::InvalidConfig(format!("secret {} not found", LOKI_TLS_NAME)))?;
        let ca_bundle = bundles
            .get(CA_NAME)
            .and_then(|ca| ca.ca_bundle())
            .ok_or_else(|| ControllerError::InvalidConfig(format!("secret {} not found", CA_NAME)))?;

        let host = secrets::compute_ingress_host(cluster, LOKI_HOST_PREFIX);
        loki["rbacSidecarEnabled"] = json!(true);
        loki["ingress"] = json!({
            "class": ingress_class,
            "hosts": [{
                "hostName": host,
                "secretName": tls.name,
                "serviceName": LOKI_SERVICE_NAME,
                "servicePort": LOKI_SERVICE_PORT,
                "backendPath": LOKI_PUSH_PATH,
            }],
        });
        loki["genericTokenKubeconfigSecretName"] = json!(cluster.generic_token_kubeconfig_secret);

        let image = self.ctx.image_vector.find_image(charts::IMAGE_PROMTAIL)?.to_string();
        let node_agent = node_agent::build(
            true,
            NodeAgentInput {
                image: &image,
                ca_bundle,
                ingress_host: &host,
                api_server_url: cluster.api_server_url().unwrap_or_default(),
            },
        )?;

        self.ctx.secrets.cleanup(namespace, &configs).await?;
        info!("Node logging enabled for {} via {}", namespace, host);
        Ok(node_agent)
    }

    /// Remove every object of the node-logging path, whether or not it was created
    async fn disable_node_logging(&self, namespace: &str) -> Result<NodeAgentConfig, ControllerError> {
        charts::kube_rbac_proxy()
            .delete(self.ctx.charts.as_ref(), namespace)
            .await?;

        let objects = [
            ObjectRef::cluster_scoped(ObjectKind::MutatingWebhookConfiguration, MUTATING_WEBHOOK_NAME),
            ObjectRef::namespaced(ObjectKind::Ingress, namespace, INGRESS_NAME),
            ObjectRef::namespaced(ObjectKind::NetworkPolicy, namespace, TELEGRAF_NETWORK_POLICY_NAME),
            ObjectRef::namespaced(ObjectKind::ConfigMap, namespace, TELEGRAF_CONFIG_MAP_NAME),
        ];
        for object in &objects {
            self.ctx.seed.delete_object(object).await?;
        }
        debug!("Node logging disabled for {}", namespace);

        node_agent::build(
            false,
            NodeAgentInput {
                image: "",
                ca_bundle: &[],
                ingress_host: "",
                api_server_url: "",
            },
        )
    }

    /// Ship the node agent artifact and wait until the seed reports it healthy
    async fn publish_node_agent(&self, namespace: &str, node_agent: &NodeAgentConfig) -> Result<(), ControllerError> {
        let config_map = node_agent.to_config_map(namespace)?;
        let yaml = serde_yaml::to_string(&config_map)
            .map_err(|e| ControllerError::InvalidConfig(format!("cannot serialize {}: {}", node_agent::CONFIG_MAP_NAME, e)))?;
        let data = BTreeMap::from([(
            format!("configmap__{}__{}.yaml", namespace, node_agent::CONFIG_MAP_NAME),
            yaml.into_bytes(),
        )]);

        let seed = self.ctx.seed.as_ref();
        seed.apply_managed_resource(namespace, MANAGED_RESOURCE_NAME, MANAGED_RESOURCE_CLASS, false, data)
            .await?;
        tokio::time::timeout(
            MANAGED_RESOURCE_HEALTHY_TIMEOUT,
            seed.wait_managed_resource_healthy(namespace, MANAGED_RESOURCE_NAME),
        )
        .await
        .map_err(|_| {
            ControllerError::Timeout(format!(
                "managed resource {}/{} did not become healthy within {:?}",
                namespace, MANAGED_RESOURCE_NAME, MANAGED_RESOURCE_HEALTHY_TIMEOUT
            ))
        })??;
        Ok(())
    }

    /// Re-run admission on the pristine OSCs so the webhook merges the new artifact
    async fn touch_original_oscs(&self, namespace: &str) -> Result<(), ControllerError> {
        let seed = self.ctx.seed.as_ref();
        for osc in seed.list_operating_system_configs(namespace).await? {
            let Some(name) = osc.metadata.name.as_deref() else {
                continue;
            };
            if name.ends_with(ORIGINAL_OSC_SUFFIX) {
                seed.touch_operating_system_config(namespace, name).await?;
                debug!("Touched OperatingSystemConfig {}/{}", namespace, name);
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Actuator for ShootActuator {
    async fn reconcile(&self, logging: &Logging, cluster: Option<&ClusterContext>) -> Result<NodeAgentConfig, ControllerError> {
        let namespace = namespace_of(logging)?;
        let cluster =
            cluster.ok_or_else(|| ControllerError::InvalidConfig(format!("no cluster for namespace {}", namespace)))?;

        let mut loki = json!({
            "replicas": cluster.hibernation.log_store_replicas(),
        });

        self.ensure_event_logger(namespace, cluster).await?;

        let node_agent = if self.ctx.config.is_node_logging_enabled(cluster.purpose.as_deref()) {
            self.enable_node_logging(namespace, cluster, &mut loki).await?
        } else {
            self.disable_node_logging(namespace).await?
        };

        loki["priorityClassName"] = json!(PRIORITY_CLASS_SHOOT);
        loki["hvpa"] = json!({ "enabled": logging.spec.hvpa_enabled });
        if logging.spec.hvpa_enabled {
            if let Some(resources) = current_requests_values(self.ctx.seed.as_ref(), namespace).await? {
                loki["resources"] = resources;
            }
        }

        charts::shoot_bootstrap()
            .apply(
                self.ctx.charts.as_ref(),
                &self.ctx.charts_path,
                namespace,
                &self.ctx.image_vector,
                json!({ "loki": loki }),
            )
            .await?;

        self.publish_node_agent(namespace, &node_agent).await?;
        self.touch_original_oscs(namespace).await?;
        Ok(node_agent)
    }

    async fn delete(&self, logging: &Logging, _cluster: Option<&ClusterContext>) -> Result<(), ControllerError> {
        let namespace = namespace_of(logging)?;
        let applier = self.ctx.charts.as_ref();

        charts::event_logger().delete(applier, namespace).await?;
        charts::kube_rbac_proxy().delete(applier, namespace).await?;
        self.ctx.secrets.cleanup(namespace, &[]).await?;
        charts::shoot_bootstrap().delete(applier, namespace).await?;

        let seed = self.ctx.seed.as_ref();
        seed.delete_managed_resource(namespace, MANAGED_RESOURCE_NAME).await?;
        tokio::time::timeout(
            MANAGED_RESOURCE_DELETED_TIMEOUT,
            seed.wait_managed_resource_deleted(namespace, MANAGED_RESOURCE_NAME),
        )
        .await
        .map_err(|_| {
            ControllerError::Timeout(format!(
                "managed resource {}/{} was not deleted within {:?}",
                namespace, MANAGED_RESOURCE_NAME, MANAGED_RESOURCE_DELETED_TIMEOUT
            ))
        })??;
        info!("Removed logging stack from {}", namespace);
        Ok(())
    }
}
