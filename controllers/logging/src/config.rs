//! Controller configuration
//!
//! Two sources: the extension configuration document named by
//! `LOGGING_CONFIG` (feature gates and node-logging policy), and process
//! settings taken from the environment. Both are loaded once in `main` and
//! passed down explicitly.

use crate::error::ControllerError;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Feature gate toggling the shoot event logger
pub const FEATURE_EVENT_LOGGING: &str = "eventLoggingEnabled";
/// Feature gate toggling node logging for shoots
pub const FEATURE_SHOOT_NODE_LOGGING: &str = "shootNodeLoggingEnabled";

/// API version accepted in the configuration document
pub const CONFIG_API_VERSION: &str = "logging.extensions.config.gardener.cloud/v1alpha1";
/// Kind accepted in the configuration document
pub const CONFIG_KIND: &str = "Configuration";

/// Resync period when the configuration does not set one
pub const DEFAULT_SYNC_PERIOD: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckConfig {
    /// Go-style duration, e.g. `30s`, `5m`, `1h30m`
    #[serde(default)]
    pub sync_period: Option<String>,
}

/// Extension configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub health_check_config: Option<HealthCheckConfig>,
    /// Shoot purposes that get node logging
    #[serde(default)]
    pub shoot_purposes_with_node_logging: BTreeSet<String>,
    #[serde(default)]
    pub feature_gates: BTreeMap<String, bool>,
}

impl Configuration {
    /// Parse and validate a configuration document
    pub fn from_yaml(yaml: &str) -> Result<Self, ControllerError> {
        let config: Configuration = serde_yaml::from_str(yaml)
            .map_err(|e| ControllerError::InvalidConfig(format!("cannot parse configuration: {}", e)))?;

        if let Some(api_version) = config.api_version.as_deref().filter(|v| *v != CONFIG_API_VERSION) {
            return Err(ControllerError::InvalidConfig(format!(
                "unsupported apiVersion {}, expected {}",
                api_version, CONFIG_API_VERSION
            )));
        }
        if let Some(kind) = config.kind.as_deref().filter(|k| *k != CONFIG_KIND) {
            return Err(ControllerError::InvalidConfig(format!(
                "unsupported kind {}, expected {}",
                kind, CONFIG_KIND
            )));
        }
        // Surface a bad sync period at start-up rather than on first requeue
        config.sync_period()?;
        Ok(config)
    }

    /// Read the configuration file at `path`
    pub fn from_file(path: &Path) -> Result<Self, ControllerError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ControllerError::InvalidConfig(format!("cannot read configuration {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    fn feature_enabled(&self, gate: &str) -> bool {
        self.feature_gates.get(gate).copied().unwrap_or(false)
    }

    pub fn is_event_logging_enabled(&self) -> bool {
        self.feature_enabled(FEATURE_EVENT_LOGGING)
    }

    /// Node logging needs the gate and a purpose on the allow-list
    pub fn is_node_logging_enabled(&self, purpose: Option<&str>) -> bool {
        if !self.feature_enabled(FEATURE_SHOOT_NODE_LOGGING) {
            return false;
        }
        match purpose {
            Some(purpose) if !purpose.is_empty() => self.shoot_purposes_with_node_logging.contains(purpose),
            _ => false,
        }
    }

    /// Requeue interval after a successful reconciliation
    pub fn sync_period(&self) -> Result<Duration, ControllerError> {
        match self.health_check_config.as_ref().and_then(|h| h.sync_period.as_deref()) {
            Some(period) => parse_duration(period),
            None => Ok(DEFAULT_SYNC_PERIOD),
        }
    }
}

/// Parse a Go-style duration made of hour, minute and second components
pub fn parse_duration(value: &str) -> Result<Duration, ControllerError> {
    let invalid = || ControllerError::InvalidConfig(format!("invalid duration '{}': expected e.g. 30s, 5m, 1h30m", value));

    let re = Regex::new(r"^(?:(?P<h>\d+)h)?(?:(?P<m>\d+)m)?(?:(?P<s>\d+)s)?$")
        .map_err(|e| ControllerError::InvalidConfig(format!("failed to compile regex: {}", e)))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }
    let captures = re.captures(trimmed).ok_or_else(invalid)?;

    let component = |name: &str, factor: u64| -> Result<u64, ControllerError> {
        match captures.name(name) {
            Some(m) => m.as_str().parse::<u64>().map(|n| n * factor).map_err(|_| invalid()),
            None => Ok(0),
        }
    };
    let seconds = component("h", 3600)? + component("m", 60)? + component("s", 1)?;
    if seconds == 0 {
        return Err(invalid());
    }
    Ok(Duration::from_secs(seconds))
}

/// Process settings from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub config_path: PathBuf,
    pub watch_namespace: Option<String>,
    pub webhook_addr: SocketAddr,
    pub charts_path: PathBuf,
}

impl Settings {
    /// Read settings through `lookup`, normally `std::env::var`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_path = lookup("LOGGING_CONFIG")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ControllerError::InvalidConfig("LOGGING_CONFIG environment variable is required".to_string()))?;
        let webhook_addr = lookup("WEBHOOK_ADDR")
            .unwrap_or_else(|| "0.0.0.0:9443".to_string())
            .parse()
            .map_err(|e| ControllerError::InvalidConfig(format!("invalid WEBHOOK_ADDR: {}", e)))?;

        Ok(Self {
            config_path: PathBuf::from(config_path),
            watch_namespace: lookup("WATCH_NAMESPACE").filter(|v| !v.is_empty()),
            webhook_addr,
            charts_path: PathBuf::from(lookup("CHARTS_PATH").unwrap_or_else(|| "charts".to_string())),
        })
    }

    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
apiVersion: logging.extensions.config.gardener.cloud/v1alpha1
kind: Configuration
healthCheckConfig:
  syncPeriod: 5m
shootPurposesWithNodeLogging:
- evaluation
- development
featureGates:
  eventLoggingEnabled: true
  shootNodeLoggingEnabled: true
"#;

    #[test]
    fn test_parse_configuration() {
        let config = Configuration::from_yaml(CONFIG).unwrap();
        assert!(config.is_event_logging_enabled());
        assert!(config.is_node_logging_enabled(Some("evaluation")));
        assert!(!config.is_node_logging_enabled(Some("production")));
        assert!(!config.is_node_logging_enabled(Some("")));
        assert!(!config.is_node_logging_enabled(None));
        assert_eq!(config.sync_period().unwrap(), Duration::from_secs(300));
    }

    #[test]
    fn test_node_logging_requires_gate() {
        let config = Configuration::from_yaml(
            "shootPurposesWithNodeLogging: [evaluation]\nfeatureGates: {shootNodeLoggingEnabled: false}\n",
        )
        .unwrap();
        assert!(!config.is_node_logging_enabled(Some("evaluation")));
        assert!(!config.is_event_logging_enabled());
        assert_eq!(config.sync_period().unwrap(), DEFAULT_SYNC_PERIOD);
    }

    #[test]
    fn test_rejects_foreign_kind() {
        let err = Configuration::from_yaml("apiVersion: v1\nkind: ConfigMap\n").unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("10 minutes").is_err());
    }

    #[test]
    fn test_settings_from_lookup() {
        let settings = Settings::from_lookup(|key| match key {
            "LOGGING_CONFIG" => Some("/etc/logging/config.yaml".to_string()),
            "WATCH_NAMESPACE" => Some(String::new()),
            _ => None,
        })
        .unwrap();
        assert_eq!(settings.config_path, PathBuf::from("/etc/logging/config.yaml"));
        assert_eq!(settings.watch_namespace, None);
        assert_eq!(settings.webhook_addr.port(), 9443);
        assert_eq!(settings.charts_path, PathBuf::from("charts"));

        assert!(Settings::from_lookup(|_| None).is_err());
    }
}
