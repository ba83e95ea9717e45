//! Reconciliation of `Logging` resources.
//!
//! The reconciler owns the lifecycle around the actuators: it fetches the
//! resource and its cluster, decides the operation, manages the finalizer
//! and writes the status checkpoints. `type: seed` goes to the seed
//! actuator, every other type to the shoot actuator.
//!
//! - `operation`: operation type and skip decision
//! - `status`: status patch builders

pub mod operation;
pub mod status;

#[cfg(test)]
mod reconciler_test;

use crate::actuator::seed::SeedActuator;
use crate::actuator::shoot::ShootActuator;
use crate::actuator::{Actuator, ActuatorContext};
use crate::cluster::ClusterContext;
use crate::error::ControllerError;
use crds::{LastOperationType, Logging, FINALIZER_NAME, OPERATION_ANNOTATION};
use operation::{compute_operation_type, should_skip};
use tracing::{debug, error, info, warn};

/// Status descriptions of one operation
struct Phase {
    operation: LastOperationType,
    processing: &'static str,
    succeeded: &'static str,
}

impl Phase {
    fn reconcile(operation: LastOperationType) -> Self {
        Self {
            operation,
            processing: "Reconciling the Logging",
            succeeded: "Successfully reconciled Logging",
        }
    }

    fn restore() -> Self {
        Self {
            operation: LastOperationType::Restore,
            processing: "Restoring the Logging",
            succeeded: "Successfully restored Logging",
        }
    }

    fn delete() -> Self {
        Self {
            operation: LastOperationType::Delete,
            processing: "Deleting the Logging",
            succeeded: "Successfully deleted Logging",
        }
    }

    fn migrate() -> Self {
        Self {
            operation: LastOperationType::Migrate,
            processing: "Migrating the Logging",
            succeeded: "Successfully migrated Logging",
        }
    }
}

/// Reconciles `Logging` resources.
#[derive(Debug)]
pub struct Reconciler {
    ctx: ActuatorContext,
    seed_actuator: SeedActuator,
    shoot_actuator: ShootActuator,
}

impl Reconciler {
    /// Create a reconciler whose actuators share `ctx`
    pub fn new(ctx: ActuatorContext) -> Self {
        Self {
            seed_actuator: SeedActuator::new(ctx.clone()),
            shoot_actuator: ShootActuator::new(ctx.clone()),
            ctx,
        }
    }

    fn actuator_for(&self, logging: &Logging) -> &dyn Actuator {
        if logging.spec.is_seed() {
            &self.seed_actuator
        } else {
            &self.shoot_actuator
        }
    }

    /// Drive the Logging `namespace/name` one step towards its desired state
    ///
    /// A missing resource is already finalized. Errors have been recorded in
    /// the status before they are returned.
    pub async fn process(&self, namespace: &str, name: &str) -> Result<(), ControllerError> {
        let Some(logging) = self.ctx.seed.get_logging(namespace, name).await? else {
            debug!("Logging {}/{} is gone, stop reconciling", namespace, name);
            return Ok(());
        };

        let cluster = if logging.spec.is_seed() {
            None
        } else {
            let cluster = self.ctx.seed.get_cluster(namespace).await?;
            Some(ClusterContext::from_cluster(&cluster))
        };

        let operation = compute_operation_type(&logging);
        info!("Reconciling Logging {}/{} (operation {})", namespace, name, operation);

        if should_skip(&logging, operation) {
            info!("Logging {}/{} was migrated away, skipping {}", namespace, name, operation);
            return Ok(());
        }

        let cluster = cluster.as_ref();
        if logging.metadata.deletion_timestamp.is_some() {
            return self.delete(&logging, cluster).await;
        }
        match operation {
            LastOperationType::Migrate => self.migrate(&logging, cluster).await,
            LastOperationType::Restore => {
                self.reconcile(&logging, cluster, Phase::restore()).await?;
                self.remove_operation_annotation(&logging).await
            }
            other => self.reconcile(&logging, cluster, Phase::reconcile(other)).await,
        }
    }

    /// Reconcile and restore: finalizer, Processing, actuator, Succeeded with units and files
    async fn reconcile(&self, logging: &Logging, cluster: Option<&ClusterContext>, phase: Phase) -> Result<(), ControllerError> {
        self.ensure_finalizer(logging).await?;

        let namespace = crate::actuator::namespace_of(logging)?;
        self.patch_status(
            logging,
            status::processing(
                phase.operation,
                phase.processing,
                Some(status::grafana_datasource(namespace)),
                chrono::Utc::now(),
            ),
        )
        .await?;

        let node_agent = match self.actuator_for(logging).reconcile(logging, cluster).await {
            Ok(node_agent) => node_agent,
            Err(e) => return Err(self.record_failure(logging, phase.operation, &e).await),
        };

        self.patch_status(
            logging,
            status::succeeded(
                phase.operation,
                phase.succeeded,
                logging.metadata.generation,
                Some(&node_agent),
                chrono::Utc::now(),
            )?,
        )
        .await?;
        info!(
            "{} of Logging {} succeeded ({} units, {} files)",
            phase.operation,
            object_key(logging),
            node_agent.units.len(),
            node_agent.files.len()
        );
        Ok(())
    }

    /// Tear the stack down and release the finalizer; a no-op without it
    async fn delete(&self, logging: &Logging, cluster: Option<&ClusterContext>) -> Result<(), ControllerError> {
        if !logging.has_finalizer() {
            info!("Deleting Logging {} is a no-op as there is no finalizer", object_key(logging));
            return Ok(());
        }

        self.run_teardown(logging, cluster, Phase::delete()).await?;

        let finalizers: Vec<String> = logging
            .metadata
            .finalizers
            .iter()
            .flatten()
            .filter(|f| f.as_str() != FINALIZER_NAME)
            .cloned()
            .collect();
        info!("Removing finalizer from Logging {}", object_key(logging));
        self.ctx.seed.set_logging_finalizers(logging, finalizers).await?;
        Ok(())
    }

    /// Tear the stack down, drop every finalizer and the migrate request
    async fn migrate(&self, logging: &Logging, cluster: Option<&ClusterContext>) -> Result<(), ControllerError> {
        self.run_teardown(logging, cluster, Phase::migrate()).await?;

        info!("Removing all finalizers from Logging {}", object_key(logging));
        self.ctx.seed.set_logging_finalizers(logging, Vec::new()).await?;
        self.remove_operation_annotation(logging).await
    }

    async fn run_teardown(&self, logging: &Logging, cluster: Option<&ClusterContext>, phase: Phase) -> Result<(), ControllerError> {
        self.patch_status(
            logging,
            status::processing(phase.operation, phase.processing, None, chrono::Utc::now()),
        )
        .await?;

        if let Err(e) = self.actuator_for(logging).delete(logging, cluster).await {
            return Err(self.record_failure(logging, phase.operation, &e).await);
        }

        self.patch_status(
            logging,
            status::succeeded(phase.operation, phase.succeeded, None, None, chrono::Utc::now())?,
        )
        .await
    }

    /// Write the Error checkpoint and return the wrapped error
    async fn record_failure(&self, logging: &Logging, operation: LastOperationType, source: &ControllerError) -> ControllerError {
        let err = ControllerError::in_operation(operation, source);
        error!("{} of Logging {} failed: {}", operation, object_key(logging), err);
        let patch = status::error(operation, &err.to_string(), chrono::Utc::now());
        if let Err(status_err) = self.patch_status(logging, patch).await {
            warn!("Failed to record error status for Logging {}: {}", object_key(logging), status_err);
        }
        err
    }

    async fn ensure_finalizer(&self, logging: &Logging) -> Result<(), ControllerError> {
        if logging.has_finalizer() {
            return Ok(());
        }
        info!("Adding finalizer to Logging {}", object_key(logging));
        let mut finalizers = logging.metadata.finalizers.clone().unwrap_or_default();
        finalizers.push(FINALIZER_NAME.to_string());
        self.ctx.seed.set_logging_finalizers(logging, finalizers).await?;
        Ok(())
    }

    async fn remove_operation_annotation(&self, logging: &Logging) -> Result<(), ControllerError> {
        debug!("Removing {} annotation from Logging {}", OPERATION_ANNOTATION, object_key(logging));
        self.ctx
            .seed
            .remove_logging_annotation(logging, OPERATION_ANNOTATION)
            .await?;
        Ok(())
    }

    async fn patch_status(&self, logging: &Logging, patch: serde_json::Value) -> Result<(), ControllerError> {
        let namespace = crate::actuator::namespace_of(logging)?;
        let name = logging.metadata.name.as_deref().unwrap_or_default();
        self.ctx.seed.patch_logging_status(namespace, name, patch).await?;
        Ok(())
    }
}

/// `namespace/name` of a Logging
pub fn object_key(logging: &Logging) -> String {
    format!(
        "{}/{}",
        logging.metadata.namespace.as_deref().unwrap_or_default(),
        logging.metadata.name.as_deref().unwrap_or_default()
    )
}
