//! Status patches
//!
//! Every status write of the reconciler is one of the three checkpoints
//! below, sent as a merge patch of the `status` subresource. The JSON is
//! assembled by hand so the wire names match the CRD schema exactly.

use crate::error::ControllerError;
use crate::node_agent::NodeAgentConfig;
use chrono::{DateTime, Utc};
use crds::{LastOperationState, LastOperationType};
use serde_json::{json, Value};

/// Progress reported while an operation runs
pub const PROGRESS_PROCESSING: i32 = 1;
/// Progress reported when an operation failed
pub const PROGRESS_ERROR: i32 = 50;
/// Progress reported when an operation finished
pub const PROGRESS_SUCCEEDED: i32 = 100;

/// Grafana datasource pointing at the log store of `namespace`
pub fn grafana_datasource(namespace: &str) -> String {
    format!(
        "\n- name: loki\n  type: loki\n  access: proxy\n  url: http://loki.{}.svc:3100",
        namespace
    )
}

fn last_operation(
    operation: LastOperationType,
    state: LastOperationState,
    progress: i32,
    description: &str,
    now: DateTime<Utc>,
) -> Value {
    json!({
        "type": operation.as_str(),
        "state": state.as_str(),
        "progress": progress,
        "description": description,
        "lastUpdateTime": now,
    })
}

/// Operation started; optionally publishes the Grafana datasource
pub fn processing(
    operation: LastOperationType,
    description: &str,
    grafana_datasource: Option<String>,
    now: DateTime<Utc>,
) -> Value {
    let mut status = json!({
        "lastOperation": last_operation(
            operation,
            LastOperationState::Processing,
            PROGRESS_PROCESSING,
            description,
            now,
        ),
    });
    if let Some(datasource) = grafana_datasource {
        status["grafanaDatasource"] = json!(datasource);
    }
    json!({ "status": status })
}

/// Operation failed with `description`; also recorded as `lastError`
pub fn error(operation: LastOperationType, description: &str, now: DateTime<Utc>) -> Value {
    json!({
        "status": {
            "lastOperation": last_operation(operation, LastOperationState::Error, PROGRESS_ERROR, description, now),
            "lastError": {
                "description": description,
                "lastUpdateTime": now,
            },
        }
    })
}

/// Operation finished; clears `lastError` and records the observed generation
///
/// `node_agent` replaces the published units and files when given.
pub fn succeeded(
    operation: LastOperationType,
    description: &str,
    observed_generation: Option<i64>,
    node_agent: Option<&NodeAgentConfig>,
    now: DateTime<Utc>,
) -> Result<Value, ControllerError> {
    let mut status = json!({
        "lastOperation": last_operation(
            operation,
            LastOperationState::Succeeded,
            PROGRESS_SUCCEEDED,
            description,
            now,
        ),
        "lastError": null,
    });
    if let Some(generation) = observed_generation {
        status["observedGeneration"] = json!(generation);
    }
    if let Some(node_agent) = node_agent {
        status["units"] = serde_json::to_value(&node_agent.units)?;
        status["files"] = serde_json::to_value(&node_agent.files)?;
    }
    Ok(json!({ "status": status }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_grafana_datasource() {
        assert_eq!(
            grafana_datasource("shoot--dev--foo"),
            "\n- name: loki\n  type: loki\n  access: proxy\n  url: http://loki.shoot--dev--foo.svc:3100"
        );
    }

    #[test]
    fn test_processing_patch() {
        let patch = processing(
            LastOperationType::Create,
            "Reconciling the Logging",
            Some("ds".to_string()),
            now(),
        );
        assert_eq!(
            patch,
            json!({
                "status": {
                    "lastOperation": {
                        "type": "Create",
                        "state": "Processing",
                        "progress": 1,
                        "description": "Reconciling the Logging",
                        "lastUpdateTime": "2024-05-01T12:00:00Z",
                    },
                    "grafanaDatasource": "ds",
                }
            })
        );

        let patch = processing(LastOperationType::Delete, "Deleting the Logging", None, now());
        assert!(patch["status"].get("grafanaDatasource").is_none());
    }

    #[test]
    fn test_error_patch_records_last_error() {
        let patch = error(LastOperationType::Delete, "Error deleting Logging: boom", now());
        assert_eq!(patch["status"]["lastOperation"]["state"], "Error");
        assert_eq!(patch["status"]["lastOperation"]["progress"], 50);
        assert_eq!(patch["status"]["lastError"]["description"], "Error deleting Logging: boom");
    }

    #[test]
    fn test_success_patch() {
        let node_agent = NodeAgentConfig::default();
        let patch = succeeded(
            LastOperationType::Reconcile,
            "Successfully reconciled Logging",
            Some(3),
            Some(&node_agent),
            now(),
        )
        .unwrap();
        let status = &patch["status"];
        assert_eq!(status["lastOperation"]["state"], "Succeeded");
        assert_eq!(status["lastOperation"]["progress"], 100);
        assert_eq!(status["lastError"], Value::Null);
        assert_eq!(status["observedGeneration"], 3);
        assert_eq!(status["units"], json!([]));
        assert_eq!(status["files"], json!([]));

        let patch = succeeded(LastOperationType::Delete, "Successfully deleted Logging", None, None, now()).unwrap();
        assert!(patch["status"].get("units").is_none());
        assert!(patch["status"].get("observedGeneration").is_none());
    }

    #[test]
    fn test_success_patch_serializes_units_and_files() {
        let mut unit = crds::Unit {
            name: "promtail.service".to_string(),
            ..Default::default()
        };
        unit.extra.insert("filePaths".to_string(), json!(["/var/lib/promtail/config/config"]));
        let node_agent = NodeAgentConfig {
            units: vec![unit],
            files: Vec::new(),
        };

        let patch = succeeded(LastOperationType::Create, "done", Some(1), Some(&node_agent), now()).unwrap();
        assert_eq!(
            patch["status"]["units"],
            json!([{"name": "promtail.service", "filePaths": ["/var/lib/promtail/config/config"]}])
        );
    }
}
