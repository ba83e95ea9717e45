//! Helm-backed chart applier

use crate::applier_trait::ChartApplierTrait;
use crate::error::ChartError;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Runs the `helm` binary found on `PATH`
#[derive(Debug, Clone)]
pub struct HelmChartApplier {
    binary: String,
}

impl Default for HelmChartApplier {
    fn default() -> Self {
        Self {
            binary: "helm".to_string(),
        }
    }
}

impl HelmChartApplier {
    /// Applier using `helm` from `PATH`
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific helm binary
    pub fn with_binary(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
        }
    }
}

fn check(command: &str, release: &str, output: &std::process::Output) -> Result<(), ChartError> {
    if output.status.success() {
        return Ok(());
    }
    Err(ChartError::Helm {
        command: command.to_string(),
        release: release.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

#[async_trait::async_trait]
impl ChartApplierTrait for HelmChartApplier {
    async fn apply(&self, release: &str, path: &Path, namespace: &str, values: &serde_json::Value) -> Result<(), ChartError> {
        let values_yaml = serde_yaml::to_string(values)?;
        debug!("helm upgrade --install {} {} -n {}", release, path.display(), namespace);

        let mut child = Command::new(&self.binary)
            .args(["upgrade", "--install", release])
            .arg(path)
            .args(["--namespace", namespace, "-f", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(values_yaml.as_bytes()).await?;
        }
        let output = child.wait_with_output().await?;
        check("upgrade", release, &output)
    }

    async fn delete(&self, release: &str, namespace: &str) -> Result<(), ChartError> {
        debug!("helm uninstall {} -n {}", release, namespace);
        let output = Command::new(&self.binary)
            .args(["uninstall", release, "--namespace", namespace, "--ignore-not-found"])
            .output()
            .await?;
        check("uninstall", release, &output)
    }
}
