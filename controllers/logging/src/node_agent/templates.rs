//! Text content of the promtail units, scripts and configuration

use super::{
    PATH_AUTH_TOKEN, PATH_CA_CERT, PATH_CONFIG, POSITIONS_FILE, SERVER_PORT, UNIT_NAME, UNIT_NAME_FETCH_TOKEN,
};
use crate::error::ControllerError;
use serde_json::json;

const PERSISTENT_JOURNAL_DIR: &str = "/var/log/journal";
const VOLATILE_JOURNAL_DIR: &str = "/run/log/journal";
const KUBELET_CA: &str = "/var/lib/kubelet/ca.crt";
const KUBELET_CLIENT_CERT: &str = "/var/lib/kubelet/pki/kubelet-client-current.pem";
const TOKEN_SECRET: &str = "gardener-promtail";

fn exec_start_pre_lines(pre: &[&str]) -> String {
    pre.iter()
        .filter(|line| !line.is_empty())
        .map(|line| format!("ExecStartPre={}\n", line))
        .collect()
}

/// `promtail.service`
pub fn promtail_unit(pre: &[&str], start: &str) -> String {
    format!(
        "[Unit]
Description=promtail daemon
Documentation=https://grafana.com/docs/loki/latest/clients/promtail/
After={fetch_token}
[Install]
WantedBy=multi-user.target
[Service]
CPUAccounting=yes
MemoryAccounting=yes
CPUQuota=3%
CPUQuotaPeriodSec=1000ms
MemoryMin=29M
MemoryHigh=400M
MemoryMax=800M
MemorySwapMax=0
Restart=always
RestartSec=5
EnvironmentFile=/etc/environment
{pre}ExecStart={start}
",
        fetch_token = UNIT_NAME_FETCH_TOKEN,
        pre = exec_start_pre_lines(pre),
        start = start,
    )
}

/// `promtail-fetch-token.service`; restarts hourly to refresh the token
pub fn fetch_token_unit(pre: &[&str], start: &str) -> String {
    format!(
        "[Unit]
Description=promtail token fetcher
Before={promtail}
After=network-online.target
[Install]
WantedBy=multi-user.target
[Service]
Restart=always
RestartSec=3600
EnvironmentFile=/etc/environment
{pre}ExecStart={start}
",
        promtail = UNIT_NAME,
        pre = exec_start_pre_lines(pre),
        start = start,
    )
}

/// Fetches the promtail token from the shoot API server with the kubelet's credentials
pub fn fetch_token_script(api_server_url: &str) -> String {
    format!(
        r#"#!/bin/bash -eu

if ! SECRET="$(wget \
  -qO- \
  --header         "Accept: application/yaml" \
  --ca-certificate "{kubelet_ca}" \
  --certificate    "{kubelet_cert}" \
  --private-key    "{kubelet_cert}" \
  "{api_server}/api/v1/namespaces/kube-system/secrets/{secret}")"; then

  echo "Could not retrieve the promtail token secret"
  exit 1
fi

echo "$SECRET" | sed -n 's/^  token: //p' | base64 -d > "{token}"
echo "Successfully fetched the promtail token"
"#,
        kubelet_ca = KUBELET_CA,
        kubelet_cert = KUBELET_CLIENT_CERT,
        api_server = api_server_url.trim_end_matches('/'),
        secret = TOKEN_SECRET,
        token = PATH_AUTH_TOKEN,
    )
}

/// Points the journal scrape at the volatile journal when no persistent one exists
pub fn set_active_journal_file_script() -> String {
    format!(
        r#"#!/bin/bash -eu

PERSISTENT="{persistent}"
VOLATILE="{volatile}"
CONFIG="{config}"

if [ ! -d "$PERSISTENT" ] && [ -d "$VOLATILE" ]; then
  sed -i -e "s|$PERSISTENT|$VOLATILE|g" "$CONFIG"
elif [ -d "$PERSISTENT" ]; then
  sed -i -e "s|$VOLATILE|$PERSISTENT|g" "$CONFIG"
fi
"#,
        persistent = PERSISTENT_JOURNAL_DIR,
        volatile = VOLATILE_JOURNAL_DIR,
        config = PATH_CONFIG,
    )
}

/// promtail configuration pushing to `https://<ingress_host>/loki/api/v1/push`
pub fn promtail_config(ingress_host: &str, api_server_url: &str) -> Result<String, ControllerError> {
    let config = json!({
        "server": {
            "disable": true,
            "log_level": "info",
            "http_listen_port": SERVER_PORT,
        },
        "client": {
            "url": format!("https://{}/loki/api/v1/push", ingress_host),
            "batchwait": "10s",
            "batchsize": 1_048_576,
            "bearer_token_file": PATH_AUTH_TOKEN,
            "tls_config": {
                "ca_file": PATH_CA_CERT,
                "server_name": ingress_host,
            },
        },
        "positions": {
            "filename": POSITIONS_FILE,
        },
        "scrape_configs": [
            {
                "job_name": "journal",
                "journal": {
                    "json": false,
                    "max_age": "12h",
                    "path": PERSISTENT_JOURNAL_DIR,
                    "labels": {
                        "job": "systemd-journal",
                        "origin": "systemd-journal",
                    },
                },
                "relabel_configs": [
                    {
                        "action": "drop",
                        "regex": r"^cri-containerd-.+\.scope$",
                        "source_labels": ["__journal__systemd_unit"],
                    },
                    {
                        "source_labels": ["__journal__systemd_unit"],
                        "target_label": "unit",
                    },
                    {
                        "source_labels": ["__journal__hostname"],
                        "target_label": "nodename",
                    },
                ],
            },
            {
                "job_name": "kubernetes-pods",
                "pipeline_stages": [{"cri": {}}],
                "kubernetes_sd_configs": [
                    {
                        "role": "pod",
                        "api_server": api_server_url,
                        "tls_config": {"ca_file": KUBELET_CA},
                        "bearer_token_file": PATH_AUTH_TOKEN,
                    },
                ],
                "relabel_configs": [
                    {
                        "action": "replace",
                        "source_labels": ["__meta_kubernetes_namespace"],
                        "target_label": "namespace_name",
                    },
                    {
                        "action": "replace",
                        "source_labels": ["__meta_kubernetes_pod_name"],
                        "target_label": "pod_name",
                    },
                    {
                        "action": "replace",
                        "source_labels": ["__meta_kubernetes_pod_container_name"],
                        "target_label": "container_name",
                    },
                    {
                        "replacement": "/var/log/pods/*$1/*.log",
                        "separator": "/",
                        "source_labels": ["__meta_kubernetes_pod_uid", "__meta_kubernetes_pod_container_name"],
                        "target_label": "__path__",
                    },
                ],
            },
        ],
    });
    serde_yaml::to_string(&config)
        .map_err(|e| ControllerError::InvalidConfig(format!("cannot render promtail config: {}", e)))
}
