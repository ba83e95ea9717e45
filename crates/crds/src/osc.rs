//! OperatingSystemConfig projection and node unit/file descriptors
//!
//! Only `spec.units` and `spec.files` are interpreted; every other spec field
//! is carried through untouched.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Suffix of OperatingSystemConfigs holding the pristine, pre-mutation template
pub const ORIGINAL_OSC_SUFFIX: &str = "-original";

/// Node configuration of a worker pool
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[kube(
    group = "extensions.gardener.cloud",
    version = "v1alpha1",
    kind = "OperatingSystemConfig",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct OperatingSystemConfigSpec {
    /// Systemd units placed on the node
    #[serde(default)]
    pub units: Vec<Unit>,

    /// Files placed on the node
    #[serde(default)]
    pub files: Vec<File>,

    /// Fields this extension does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Action systemd performs on a unit after it is written
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnitCommand {
    /// `systemctl start`
    Start,
    /// `systemctl restart`
    Restart,
    /// `systemctl stop`
    Stop,
}

/// One systemd unit
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    /// Unit name, e.g. `promtail.service`
    pub name: String,

    /// Action taken after the unit is written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<UnitCommand>,

    /// Whether the unit is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable: Option<bool>,

    /// Full unit file content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Drop-ins written next to the unit
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drop_ins: Vec<DropIn>,

    /// Fields this extension does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Drop-in override for a unit
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct DropIn {
    /// File name, e.g. `10-override.conf`
    pub name: String,
    /// Drop-in content
    pub content: String,
}

/// One file placed on the node
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct File {
    /// Absolute path on the node
    pub path: String,

    /// Octal file mode as a decimal integer (e.g. 0o644 = 420)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<i32>,

    /// Where the content comes from
    pub content: FileContent,

    /// Fields this extension does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Source of a file's content; exactly one source is set
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    /// Content read from a Secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<FileContentSecretRef>,

    /// Content embedded in the spec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<FileContentInline>,

    /// Write the content without decoding it on the node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmit_unencoded: Option<bool>,

    /// Fields this extension does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Secret key holding a file's content
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileContentSecretRef {
    /// Secret name
    pub name: String,
    /// Key within the Secret
    pub data_key: String,
}

/// Inline file payload
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct FileContentInline {
    /// `b64` or empty for plain text
    pub encoding: String,
    /// Payload in `encoding`
    pub data: String,
}

impl OperatingSystemConfig {
    /// Whether this is the pristine template the mutating webhook rewrites
    pub fn is_original(&self) -> bool {
        self.metadata
            .name
            .as_deref()
            .is_some_and(|name| name.ends_with(ORIGINAL_OSC_SUFFIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_keeps_unknown_fields() {
        let raw = serde_json::json!({
            "type": "coreos",
            "purpose": "provision",
            "units": [{"name": "kubelet.service", "enable": true}],
            "files": [],
        });
        let spec: OperatingSystemConfigSpec = serde_json::from_value(raw).unwrap();
        assert_eq!(spec.units.len(), 1);
        assert_eq!(spec.extra.get("type"), Some(&serde_json::json!("coreos")));

        let back = serde_json::to_value(&spec).unwrap();
        assert_eq!(back["purpose"], "provision");
    }

    #[test]
    fn test_unit_yaml_uses_camel_case() {
        let unit = Unit {
            name: "promtail.service".to_string(),
            command: Some(UnitCommand::Restart),
            enable: Some(true),
            content: None,
            drop_ins: vec![DropIn {
                name: "10-override.conf".to_string(),
                content: "[Service]".to_string(),
            }],
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&unit).unwrap();
        assert!(yaml.contains("dropIns:"));
        assert!(yaml.contains("command: restart"));
    }

    #[test]
    fn test_units_and_files_keep_unknown_fields() {
        let raw = serde_json::json!({
            "units": [{"name": "kubelet.service", "filePaths": ["/var/lib/kubelet/config"]}],
            "files": [{
                "path": "/etc/motd",
                "hostName": "node-a",
                "content": {"inline": {"encoding": "", "data": "hi"}, "imageRef": {"image": "alpine"}},
            }],
        });
        let spec: OperatingSystemConfigSpec = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(spec.units[0].extra["filePaths"], serde_json::json!(["/var/lib/kubelet/config"]));
        assert_eq!(spec.files[0].extra["hostName"], "node-a");
        assert!(spec.files[0].content.extra.contains_key("imageRef"));

        let back = serde_json::to_value(&spec).unwrap();
        assert_eq!(back["units"], raw["units"]);
        assert_eq!(back["files"], raw["files"]);
    }

    #[test]
    fn test_is_original() {
        let mut osc = OperatingSystemConfig::new("pool-a-original", OperatingSystemConfigSpec::default());
        assert!(osc.is_original());
        osc.metadata.name = Some("pool-a-downloader".to_string());
        assert!(!osc.is_original());
    }
}
