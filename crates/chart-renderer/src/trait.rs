//! ChartApplier trait for mocking

use crate::error::ChartError;
use std::path::Path;

/// Installs and removes rendered charts in a namespace
#[async_trait::async_trait]
pub trait ChartApplierTrait: Send + Sync {
    /// Install or upgrade `release` from the chart at `path` with `values`
    async fn apply(&self, release: &str, path: &Path, namespace: &str, values: &serde_json::Value) -> Result<(), ChartError>;

    /// Remove `release`; an absent release is not an error
    async fn delete(&self, release: &str, namespace: &str) -> Result<(), ChartError>;
}
