//! Controller-specific error types.
//!
//! Collaborator errors (`SeedError`, `ChartError`) convert into
//! [`ControllerError`]; actuator failures are wrapped with the phase they
//! happened in before they reach the status checkpoint.

use chart_renderer::ChartError;
use crds::LastOperationType;
use kube::Error as KubeError;
use seed_client::SeedError;
use thiserror::Error;

/// Errors that can occur in the logging controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Seed API or secrets error
    #[error("Seed error: {0}")]
    Seed(#[from] SeedError),

    /// Chart rendering or application error
    #[error("Chart error: {0}")]
    Chart(#[from] ChartError),

    /// JSON serialization of a status or values document failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration or input
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An actuator step failed during the given operation
    #[error("Error {} Logging: {message}", operation_verb(.operation))]
    Actuator {
        operation: LastOperationType,
        message: String,
    },

    /// A bounded wait ran out
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Admission webhook failure
    #[error("Webhook error: {0}")]
    Webhook(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Wrap an error with the operation it interrupted
    pub fn in_operation(operation: LastOperationType, source: &ControllerError) -> Self {
        match source {
            // Already wrapped by an inner phase
            ControllerError::Actuator { message, .. } => ControllerError::Actuator {
                operation,
                message: message.clone(),
            },
            other => ControllerError::Actuator {
                operation,
                message: other.to_string(),
            },
        }
    }
}

/// Verb used in status descriptions, e.g. `reconciling`
pub fn operation_verb(operation: &LastOperationType) -> &'static str {
    match operation {
        LastOperationType::Create | LastOperationType::Reconcile => "reconciling",
        LastOperationType::Delete => "deleting",
        LastOperationType::Migrate => "migrating",
        LastOperationType::Restore => "restoring",
    }
}
