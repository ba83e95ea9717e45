//! # Seed Actuator
//!
//! Deploys the seed-wide log shipper and log store (`seed-bootstrap` chart)
//! into the Logging's namespace, normally `garden`.

use super::filters;
use super::maintenance;
use super::{current_requests_values, namespace_of, Actuator, ActuatorContext, LOKI_NAME};
use crate::cluster::ClusterContext;
use crate::charts;
use crate::error::ControllerError;
use crate::node_agent::NodeAgentConfig;
use crds::Logging;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::time::Duration;
use tracing::{debug, info};

/// Namespace of the seed log store
pub const GARDEN_NAMESPACE: &str = "garden";
/// Data volume of the seed log store
pub const LOKI_PVC_NAME: &str = "loki-loki-0";
/// Fixed capacity of the seed log store
pub const LOKI_STORAGE: &str = "100Gi";
/// PriorityClass of the seed log store pods
pub const PRIORITY_CLASS_SEED: &str = "gardener-system-600";

/// Upper bound for the log store to scale down before its volume is resized
pub const SCALE_DOWN_TIMEOUT: Duration = Duration::from_secs(120);

/// Actuator for `type: seed`
#[derive(Debug, Clone)]
pub struct SeedActuator {
    ctx: ActuatorContext,
}

impl SeedActuator {
    /// Create an actuator over the shared collaborators
    pub fn new(ctx: ActuatorContext) -> Self {
        Self { ctx }
    }

    /// Bring the log store volume to the fixed capacity
    ///
    /// The volume is grown in place or, when it is too large, deleted. Either
    /// way the StatefulSet is scaled to zero first and deleted afterwards so
    /// the chart re-creates it with the new claim template.
    pub async fn resize_or_delete_data_volume(&self) -> Result<(), ControllerError> {
        let seed = self.ctx.seed.as_ref();
        let Some(current) = seed.get_pvc_storage(GARDEN_NAMESPACE, LOKI_PVC_NAME).await? else {
            debug!("No log store volume {}/{} yet", GARDEN_NAMESPACE, LOKI_PVC_NAME);
            return Ok(());
        };

        let ordering = compare_quantities(&current.0, LOKI_STORAGE)?;
        if ordering == Ordering::Equal {
            return Ok(());
        }

        info!(
            "Log store volume {}/{} is {}, expected {}; scaling down {}",
            GARDEN_NAMESPACE, LOKI_PVC_NAME, current.0, LOKI_STORAGE, LOKI_NAME
        );
        tokio::time::timeout(
            SCALE_DOWN_TIMEOUT,
            seed.scale_statefulset_and_wait(GARDEN_NAMESPACE, LOKI_NAME, 0),
        )
        .await
        .map_err(|_| {
            ControllerError::Timeout(format!(
                "statefulset {}/{} did not scale down within {:?}",
                GARDEN_NAMESPACE, LOKI_NAME, SCALE_DOWN_TIMEOUT
            ))
        })??;

        if ordering == Ordering::Less {
            seed.patch_pvc_storage(GARDEN_NAMESPACE, LOKI_PVC_NAME, &Quantity(LOKI_STORAGE.to_string()))
                .await?;
            info!("Grew log store volume to {}", LOKI_STORAGE);
        } else {
            seed.delete_pvc(GARDEN_NAMESPACE, LOKI_PVC_NAME).await?;
            info!("Deleted oversized log store volume {}", LOKI_PVC_NAME);
        }

        seed.delete_statefulset(GARDEN_NAMESPACE, LOKI_NAME).await?;
        Ok(())
    }

    /// Values of the `loki` sub-chart
    async fn loki_values(&self, logging: &Logging, namespace: &str) -> Result<Value, ControllerError> {
        let mut values = json!({
            "authEnabled": false,
            "storage": LOKI_STORAGE,
            "priorityClassName": PRIORITY_CLASS_SEED,
        });

        if logging.spec.hvpa_enabled {
            let window = maintenance::compute_window(self.ctx.seed.as_ref()).await?;
            values["hvpa"] = json!({
                "enabled": true,
                "maintenanceTimeWindow": {
                    "begin": window.begin,
                    "end": window.end,
                },
            });
            if let Some(resources) = current_requests_values(self.ctx.seed.as_ref(), namespace).await? {
                values["resources"] = resources;
            }
        }
        Ok(values)
    }
}

#[async_trait::async_trait]
impl Actuator for SeedActuator {
    async fn reconcile(&self, logging: &Logging, _cluster: Option<&ClusterContext>) -> Result<NodeAgentConfig, ControllerError> {
        let namespace = namespace_of(logging)?;

        self.resize_or_delete_data_volume().await?;
        let loki = self.loki_values(logging, namespace).await?;

        let config_maps = self
            .ctx
            .seed
            .list_config_maps(GARDEN_NAMESPACE, filters::CONFIGURATION_LABEL_SELECTOR)
            .await?;
        debug!("Found {} logging configurations from other extensions", config_maps.len());
        let additional = filters::aggregate(self.ctx.config.is_event_logging_enabled(), config_maps)?;

        let values = json!({
            "fluent-bit": {
                "additionalFilters": additional.filters,
                "additionalParsers": additional.parsers,
            },
            "loki": loki,
        });

        charts::seed_bootstrap()
            .apply(
                self.ctx.charts.as_ref(),
                &self.ctx.charts_path,
                namespace,
                &self.ctx.image_vector,
                values,
            )
            .await?;
        Ok(NodeAgentConfig::default())
    }

    async fn delete(&self, logging: &Logging, _cluster: Option<&ClusterContext>) -> Result<(), ControllerError> {
        let namespace = namespace_of(logging)?;
        charts::seed_bootstrap()
            .delete(self.ctx.charts.as_ref(), namespace)
            .await?;
        Ok(())
    }
}

/// Compare two storage quantities such as `100Gi` and `107374182400`
pub fn compare_quantities(a: &str, b: &str) -> Result<Ordering, ControllerError> {
    Ok(quantity_bytes(a)?.cmp(&quantity_bytes(b)?))
}

/// Bytes of a storage quantity, rounded up to a whole byte
///
/// Accepts a decimal mantissa (`1.5`) followed by either a binary or decimal
/// suffix (`Gi`, `G`) or a decimal exponent (`1e3`).
pub fn quantity_bytes(quantity: &str) -> Result<u128, ControllerError> {
    const SUFFIXES: [(&str, u128); 12] = [
        ("Ki", 1 << 10),
        ("Mi", 1 << 20),
        ("Gi", 1 << 30),
        ("Ti", 1 << 40),
        ("Pi", 1 << 50),
        ("Ei", 1 << 60),
        ("k", 1_000),
        ("M", 1_000_000),
        ("G", 1_000_000_000),
        ("T", 1_000_000_000_000),
        ("P", 1_000_000_000_000_000),
        ("E", 1_000_000_000_000_000_000),
    ];
    let invalid = || ControllerError::InvalidConfig(format!("unsupported storage quantity '{}'", quantity));
    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());

    let trimmed = quantity.trim();
    let (mantissa, factor, exponent) = match SUFFIXES
        .iter()
        .find_map(|(suffix, factor)| trimmed.strip_suffix(suffix).map(|n| (n, *factor)))
    {
        Some((mantissa, factor)) => (mantissa, factor, 0),
        None => match trimmed.split_once(['e', 'E']) {
            Some((mantissa, exponent)) => (mantissa, 1, exponent.parse::<i32>().map_err(|_| invalid())?),
            None => (trimmed, 1, 0),
        },
    };

    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
        return Err(invalid());
    }
    let digits: u128 = format!("{}{}", whole, fraction).parse().map_err(|_| invalid())?;
    let scaled = digits.checked_mul(factor).ok_or_else(invalid)?;

    let shift = i64::from(exponent) - fraction.len() as i64;
    let power = |n: i64| u32::try_from(n).ok().and_then(|n| 10u128.checked_pow(n)).ok_or_else(invalid);
    if shift >= 0 {
        scaled.checked_mul(power(shift)?).ok_or_else(invalid)
    } else {
        Ok(scaled.div_ceil(power(-shift)?))
    }
}
