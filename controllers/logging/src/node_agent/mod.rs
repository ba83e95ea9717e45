//! # Node Agent Configuration
//!
//! Builds the systemd units and files that run promtail on every shoot node
//! and packages them into the `promtail-config` ConfigMap the OSC webhook
//! reads. With node logging disabled the same two units are still emitted,
//! rewritten to disable themselves, so nodes that ran promtail before stop it.
//!
//! Output is a pure function of the inputs: identical inputs yield identical
//! units and files, and files are always emitted in the same order.

mod templates;

use crate::error::ControllerError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use crds::{File, FileContent, FileContentInline, Unit, UnitCommand};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

pub const UNIT_NAME: &str = "promtail.service";
pub const UNIT_NAME_FETCH_TOKEN: &str = "promtail-fetch-token.service";

pub const PATH_SET_ACTIVE_JOURNAL_SCRIPT: &str = "/var/lib/promtail/scripts/set_active_journal_file.sh";
pub const PATH_FETCH_TOKEN_SCRIPT: &str = "/var/lib/promtail/scripts/fetch-token.sh";
pub const PATH_AUTH_TOKEN: &str = "/var/lib/promtail/auth-token";
pub const PATH_CONFIG: &str = "/var/lib/promtail/config/config";
pub const PATH_CA_CERT: &str = "/var/lib/promtail/ca.crt";

pub const SERVER_PORT: u16 = 3001;
pub const POSITIONS_FILE: &str = "/var/log/positions.yaml";
const BINARY_DIR: &str = "/opt/bin";

/// Name of the ConfigMap carrying the serialized units and files
pub const CONFIG_MAP_NAME: &str = "promtail-config";
pub const DATA_KEY_UNITS: &str = "promtailUnits";
pub const DATA_KEY_FILES: &str = "promtailFiles";

const PERMISSIONS_CONFIG: i32 = 0o644;
const PERMISSIONS_FETCH_TOKEN: i32 = 0o744;
const PERMISSIONS_CA: i32 = 0o644;
const PERMISSIONS_JOURNAL_SCRIPT: i32 = 0o755;

/// Inputs of an enabled node agent
#[derive(Debug, Clone, Copy)]
pub struct NodeAgentInput<'a> {
    /// promtail container image
    pub image: &'a str,
    /// CA bundle trusted for the log store ingress
    pub ca_bundle: &'a [u8],
    /// Host of the log store ingress
    pub ingress_host: &'a str,
    /// API server URL used to fetch the token and discover pods
    pub api_server_url: &'a str,
}

/// Units and files to place on every node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeAgentConfig {
    pub units: Vec<Unit>,
    pub files: Vec<File>,
}

/// Build the node agent's units and files
///
/// `input` is only consulted when `enabled`.
pub fn build(enabled: bool, input: NodeAgentInput<'_>) -> Result<NodeAgentConfig, ControllerError> {
    if !enabled {
        return Ok(NodeAgentConfig {
            units: disabled_units(),
            files: Vec::new(),
        });
    }

    let copy_binary = format!(
        "/usr/bin/docker run --rm -v {dir}:{dir}:rw --entrypoint /bin/sh {image} -c \"cp /usr/bin/promtail {dir}\"",
        dir = BINARY_DIR,
        image = input.image,
    );
    let set_journal = format!("/bin/sh {}", PATH_SET_ACTIVE_JOURNAL_SCRIPT);
    let start = format!("{}/promtail -config.file={}", BINARY_DIR, PATH_CONFIG);

    let units = vec![
        unit(UNIT_NAME, templates::promtail_unit(&[&copy_binary, &set_journal], &start)),
        unit(UNIT_NAME_FETCH_TOKEN, templates::fetch_token_unit(&[], PATH_FETCH_TOKEN_SCRIPT)),
    ];

    let ca = String::from_utf8_lossy(input.ca_bundle);
    let files = vec![
        inline_file(
            PATH_CONFIG,
            PERMISSIONS_CONFIG,
            &templates::promtail_config(input.ingress_host, input.api_server_url)?,
        ),
        inline_file(
            PATH_FETCH_TOKEN_SCRIPT,
            PERMISSIONS_FETCH_TOKEN,
            &templates::fetch_token_script(input.api_server_url),
        ),
        inline_file(PATH_CA_CERT, PERMISSIONS_CA, ca.trim()),
        inline_file(
            PATH_SET_ACTIVE_JOURNAL_SCRIPT,
            PERMISSIONS_JOURNAL_SCRIPT,
            &templates::set_active_journal_file_script(),
        ),
    ];

    Ok(NodeAgentConfig { units, files })
}

fn disabled_units() -> Vec<Unit> {
    let promtail_start = format!(
        "/bin/sh -c \"echo service {} is removed!; while true; do sleep 86400; done\"",
        UNIT_NAME
    );
    let fetch_token_start = format!(
        "/bin/sh -c \"rm -f {}; echo service {} is removed!; while true; do sleep 86400; done\"",
        PATH_AUTH_TOKEN, UNIT_NAME_FETCH_TOKEN
    );
    vec![
        unit(
            UNIT_NAME,
            templates::promtail_unit(
                &[
                    &format!("/bin/systemctl disable {}", UNIT_NAME),
                    "/bin/sh -c \"echo 'service does not have configuration'\"",
                ],
                &promtail_start,
            ),
        ),
        unit(
            UNIT_NAME_FETCH_TOKEN,
            templates::fetch_token_unit(
                &[&format!("/bin/systemctl disable {}", UNIT_NAME_FETCH_TOKEN)],
                &fetch_token_start,
            ),
        ),
    ]
}

fn unit(name: &str, content: String) -> Unit {
    Unit {
        name: name.to_string(),
        command: Some(UnitCommand::Restart),
        enable: Some(true),
        content: Some(content),
        ..Default::default()
    }
}

fn inline_file(path: &str, permissions: i32, content: &str) -> File {
    File {
        path: path.to_string(),
        permissions: Some(permissions),
        content: FileContent {
            inline: Some(FileContentInline {
                encoding: "b64".to_string(),
                data: STANDARD.encode(content),
            }),
            ..Default::default()
        },
        ..Default::default()
    }
}

impl NodeAgentConfig {
    /// Package the units and files as the `promtail-config` ConfigMap
    pub fn to_config_map(&self, namespace: &str) -> Result<ConfigMap, ControllerError> {
        let serialize = |what: &str, yaml: Result<String, serde_yaml::Error>| {
            yaml.map(|s| ByteString(s.into_bytes()))
                .map_err(|e| ControllerError::InvalidConfig(format!("cannot serialize promtail {}: {}", what, e)))
        };

        let mut binary_data = BTreeMap::new();
        binary_data.insert(DATA_KEY_UNITS.to_string(), serialize("units", serde_yaml::to_string(&self.units))?);
        binary_data.insert(DATA_KEY_FILES.to_string(), serialize("files", serde_yaml::to_string(&self.files))?);

        let labels = BTreeMap::from([
            ("app".to_string(), "promtail".to_string()),
            ("role".to_string(), "logging".to_string()),
        ]);

        Ok(ConfigMap {
            metadata: ObjectMeta {
                name: Some(CONFIG_MAP_NAME.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            binary_data: Some(binary_data),
            ..Default::default()
        })
    }

    /// Read units and files back from a `promtail-config` ConfigMap
    ///
    /// Missing keys decode as empty lists.
    pub fn from_config_map(config_map: &ConfigMap) -> Result<Self, ControllerError> {
        let binary = config_map.binary_data.as_ref();
        let decode_units = match binary.and_then(|b| b.get(DATA_KEY_UNITS)) {
            Some(data) if !data.0.is_empty() => serde_yaml::from_slice(&data.0)
                .map_err(|e| ControllerError::InvalidConfig(format!("cannot decode promtail units: {}", e)))?,
            _ => Vec::new(),
        };
        let decode_files = match binary.and_then(|b| b.get(DATA_KEY_FILES)) {
            Some(data) if !data.0.is_empty() => serde_yaml::from_slice(&data.0)
                .map_err(|e| ControllerError::InvalidConfig(format!("cannot decode promtail files: {}", e)))?,
            _ => Vec::new(),
        };
        Ok(Self {
            units: decode_units,
            files: decode_files,
        })
    }
}
