//! Last-operation bookkeeping shared by extension resources.
//!
//! Mirrors the `lastOperation` / `lastError` status fields every Gardener
//! extension resource carries.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of operation last attempted on a resource
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "PascalCase")]
pub enum LastOperationType {
    /// First reconciliation of a new resource
    Create,
    /// Regular reconciliation
    Reconcile,
    /// Deletion
    Delete,
    /// Control-plane migration away from this seed
    Migrate,
    /// Restoration after a migration
    Restore,
}

impl LastOperationType {
    /// The wire representation of the operation type
    pub fn as_str(self) -> &'static str {
        match self {
            LastOperationType::Create => "Create",
            LastOperationType::Reconcile => "Reconcile",
            LastOperationType::Delete => "Delete",
            LastOperationType::Migrate => "Migrate",
            LastOperationType::Restore => "Restore",
        }
    }
}

impl fmt::Display for LastOperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress state of the last operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "PascalCase")]
pub enum LastOperationState {
    /// Operation is running
    Processing,
    /// Operation finished successfully
    Succeeded,
    /// Operation failed and will be retried
    Error,
    /// Operation failed permanently
    Failed,
    /// Operation has not started yet
    Pending,
    /// Operation was aborted
    Aborted,
}

impl LastOperationState {
    /// The wire representation of the state
    pub fn as_str(self) -> &'static str {
        match self {
            LastOperationState::Processing => "Processing",
            LastOperationState::Succeeded => "Succeeded",
            LastOperationState::Error => "Error",
            LastOperationState::Failed => "Failed",
            LastOperationState::Pending => "Pending",
            LastOperationState::Aborted => "Aborted",
        }
    }
}

impl fmt::Display for LastOperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The most recently attempted operation on a resource
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastOperation {
    /// Operation type
    #[serde(rename = "type")]
    pub operation_type: LastOperationType,

    /// Operation state
    pub state: LastOperationState,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Progress in percent
    #[serde(default)]
    pub progress: i32,

    /// Time of the last state transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,
}

impl LastOperation {
    /// Whether this operation finished successfully
    pub fn succeeded(&self) -> bool {
        self.state == LastOperationState::Succeeded
    }
}

/// Details of the last failure
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastError {
    /// Error description
    pub description: String,

    /// Time the error was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,
}
