//! Merging of the published node agent into OperatingSystemConfigs
//!
//! An incoming unit replaces every existing unit with the same name, an
//! incoming file every existing file with the same path. Replaced items are
//! removed and the incoming one is appended, so a second merge of the same
//! set leaves the result unchanged.

use crate::error::ControllerError;
use crate::node_agent::{NodeAgentConfig, CONFIG_MAP_NAME};
use crds::{File, OperatingSystemConfigSpec, Unit};
use seed_client::SeedClientTrait;
use tracing::debug;

/// Merge `incoming` into `units`, keyed by unit name
pub fn ensure_units(units: &mut Vec<Unit>, incoming: &[Unit]) {
    for unit in incoming {
        units.retain(|u| u.name != unit.name);
        units.push(unit.clone());
    }
}

/// Merge `incoming` into `files`, keyed by path
pub fn ensure_files(files: &mut Vec<File>, incoming: &[File]) {
    for file in incoming {
        files.retain(|f| f.path != file.path);
        files.push(file.clone());
    }
}

/// Node agent published for the cluster whose control plane lives in `namespace`
///
/// `None` when nothing was published yet: no ConfigMap or no data in it.
pub async fn published_node_agent(
    seed: &dyn SeedClientTrait,
    namespace: &str,
) -> Result<Option<NodeAgentConfig>, ControllerError> {
    let Some(config_map) = seed.get_config_map(namespace, CONFIG_MAP_NAME).await? else {
        debug!("No {} in {}, node logging was never configured", CONFIG_MAP_NAME, namespace);
        return Ok(None);
    };
    if config_map.binary_data.as_ref().is_none_or(|data| data.is_empty()) {
        return Ok(None);
    }
    NodeAgentConfig::from_config_map(&config_map).map(Some)
}

/// Apply the published node agent to an OSC spec; returns whether anything was merged
pub fn merge(spec: &mut OperatingSystemConfigSpec, node_agent: &NodeAgentConfig) -> bool {
    if node_agent.units.is_empty() && node_agent.files.is_empty() {
        return false;
    }
    ensure_units(&mut spec.units, &node_agent.units);
    ensure_files(&mut spec.files, &node_agent.files);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crds::{FileContent, FileContentInline, UnitCommand};
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;
    use seed_client::MockSeedClient;

    fn unit(name: &str, content: &str) -> Unit {
        Unit {
            name: name.to_string(),
            command: Some(UnitCommand::Restart),
            enable: Some(true),
            content: Some(content.to_string()),
            ..Default::default()
        }
    }

    fn file(path: &str, data: &str) -> File {
        File {
            path: path.to_string(),
            permissions: Some(0o644),
            content: FileContent {
                inline: Some(FileContentInline {
                    encoding: String::new(),
                    data: data.to_string(),
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_ensure_units_replaces_by_name() {
        let mut units = vec![unit("kubelet.service", "k"), unit("promtail.service", "old")];
        ensure_units(&mut units, &[unit("promtail.service", "new")]);

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].name, "kubelet.service");
        assert_eq!(units[1].content.as_deref(), Some("new"));

        // Merging again changes nothing
        let before = units.clone();
        ensure_units(&mut units, &[unit("promtail.service", "new")]);
        assert_eq!(units, before);
    }

    #[test]
    fn test_ensure_units_removes_duplicates_of_the_key() {
        let mut units = vec![
            unit("promtail.service", "a"),
            unit("kubelet.service", "k"),
            unit("promtail.service", "b"),
        ];
        ensure_units(&mut units, &[unit("promtail.service", "c")]);
        let promtail: Vec<_> = units.iter().filter(|u| u.name == "promtail.service").collect();
        assert_eq!(promtail.len(), 1);
        assert_eq!(promtail[0].content.as_deref(), Some("c"));
    }

    #[test]
    fn test_ensure_files_later_content_wins() {
        let mut files = vec![file("/etc/kubelet", "k")];
        ensure_files(
            &mut files,
            &[file("/var/lib/promtail/config/config", "one"), file("/var/lib/promtail/config/config", "two")],
        );
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].path, "/var/lib/promtail/config/config");
        assert_eq!(files[1].content.inline.as_ref().unwrap().data, "two");
    }

    #[test]
    fn test_merge_empty_node_agent_is_a_noop() {
        let mut spec = create_test_osc(
            "osc",
            "shoot--dev--foo",
            vec![unit("kubelet.service", "k")],
            vec![file("/etc/kubelet", "k")],
        )
        .spec;
        let before = spec.clone();
        assert!(!merge(&mut spec, &NodeAgentConfig::default()));
        assert_eq!(spec, before);
    }

    #[tokio::test]
    async fn test_published_node_agent_absent() {
        let seed = MockSeedClient::new();
        assert!(published_node_agent(&seed, "shoot--dev--foo").await.unwrap().is_none());

        seed.add_config_map(ConfigMap {
            metadata: ObjectMeta {
                name: Some(CONFIG_MAP_NAME.to_string()),
                namespace: Some("shoot--dev--foo".to_string()),
                ..Default::default()
            },
            ..Default::default()
        });
        assert!(published_node_agent(&seed, "shoot--dev--foo").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_published_node_agent_decodes_config_map() {
        let seed = MockSeedClient::new();
        let published = NodeAgentConfig {
            units: vec![unit("promtail.service", "u")],
            files: vec![file("/var/lib/promtail/ca.crt", "ca")],
        };
        seed.add_config_map(published.to_config_map("shoot--dev--foo").unwrap());

        let decoded = published_node_agent(&seed, "shoot--dev--foo").await.unwrap();
        assert_eq!(decoded, Some(published));
    }
}
