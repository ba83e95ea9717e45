//! Recording chart applier for unit tests

use crate::applier_trait::ChartApplierTrait;
use crate::error::ChartError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum ChartCall {
    Apply {
        release: String,
        path: PathBuf,
        namespace: String,
        values: serde_json::Value,
    },
    Delete {
        release: String,
        namespace: String,
    },
}

/// Mock ChartApplier for testing
///
/// Keeps the currently installed releases per namespace so tests can check
/// presence after a sequence of reconciliations.
#[derive(Debug, Clone, Default)]
pub struct MockChartApplier {
    calls: Arc<Mutex<Vec<ChartCall>>>,
    installed: Arc<Mutex<HashMap<(String, String), serde_json::Value>>>,
    failing: Arc<Mutex<Vec<String>>>,
}

impl MockChartApplier {
    /// Create an empty mock
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every apply of `release` fail
    pub fn fail_release(&self, release: &str) {
        self.failing.lock().unwrap().push(release.to_string());
    }

    /// Recorded calls, in order
    pub fn calls(&self) -> Vec<ChartCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Values of an installed release
    pub fn installed(&self, release: &str, namespace: &str) -> Option<serde_json::Value> {
        self.installed
            .lock()
            .unwrap()
            .get(&(release.to_string(), namespace.to_string()))
            .cloned()
    }

    /// Values of every apply of `release`, oldest first
    pub fn applied_values(&self, release: &str) -> Vec<serde_json::Value> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ChartCall::Apply { release: r, values, .. } if r == release => Some(values),
                _ => None,
            })
            .collect()
    }

    /// Releases deleted, in order
    pub fn deleted(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ChartCall::Delete { release, .. } => Some(release),
                ChartCall::Apply { .. } => None,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl ChartApplierTrait for MockChartApplier {
    async fn apply(&self, release: &str, path: &Path, namespace: &str, values: &serde_json::Value) -> Result<(), ChartError> {
        self.calls.lock().unwrap().push(ChartCall::Apply {
            release: release.to_string(),
            path: path.to_path_buf(),
            namespace: namespace.to_string(),
            values: values.clone(),
        });
        if self.failing.lock().unwrap().iter().any(|r| r == release) {
            return Err(ChartError::Helm {
                command: "upgrade".to_string(),
                release: release.to_string(),
                stderr: "injected failure".to_string(),
            });
        }
        self.installed
            .lock()
            .unwrap()
            .insert((release.to_string(), namespace.to_string()), values.clone());
        Ok(())
    }

    async fn delete(&self, release: &str, namespace: &str) -> Result<(), ChartError> {
        self.calls.lock().unwrap().push(ChartCall::Delete {
            release: release.to_string(),
            namespace: namespace.to_string(),
        });
        self.installed
            .lock()
            .unwrap()
            .remove(&(release.to_string(), namespace.to_string()));
        Ok(())
    }
}
