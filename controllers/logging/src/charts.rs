//! Chart components installed by the actuators
//!
//! Paths are relative to the charts directory from `CHARTS_PATH`.

use chart_renderer::Chart;

pub const IMAGE_LOKI: &str = "loki";
pub const IMAGE_LOKI_CURATOR: &str = "loki-curator";
pub const IMAGE_KUBE_RBAC_PROXY: &str = "kube-rbac-proxy";
pub const IMAGE_TELEGRAF: &str = "telegraf";
pub const IMAGE_EVENT_LOGGER: &str = "event-logger";
pub const IMAGE_FLUENT_BIT: &str = "fluent-bit";
pub const IMAGE_FLUENT_BIT_PLUGIN_INSTALLER: &str = "fluent-bit-plugin-installer";
pub const IMAGE_ALPINE: &str = "alpine";
pub const IMAGE_PROMTAIL: &str = "promtail";

/// Sub-chart holding the log store
pub const SUB_CHART_LOKI: &str = "loki";
/// Sub-chart holding the log shipper
pub const SUB_CHART_FLUENT_BIT: &str = "fluent-bit";

/// Seed-wide log shipper and log store
pub fn seed_bootstrap() -> Chart {
    Chart::new("seed-bootstrap", "seed-bootstrap", &[])
        .with_sub_chart(
            SUB_CHART_FLUENT_BIT,
            &[IMAGE_FLUENT_BIT, IMAGE_FLUENT_BIT_PLUGIN_INSTALLER, IMAGE_ALPINE],
        )
        .with_sub_chart(SUB_CHART_LOKI, &[IMAGE_LOKI, IMAGE_LOKI_CURATOR, IMAGE_EVENT_LOGGER])
}

/// Per-shoot log store and its monitoring
pub fn shoot_bootstrap() -> Chart {
    Chart::new("shoot-bootstrap", "shoot-bootstrap", &[])
        .with_sub_chart(
            SUB_CHART_LOKI,
            &[
                IMAGE_LOKI,
                IMAGE_LOKI_CURATOR,
                IMAGE_KUBE_RBAC_PROXY,
                IMAGE_TELEGRAF,
                IMAGE_EVENT_LOGGER,
            ],
        )
        .with_sub_chart("monitoring", &[])
}

/// Shoot event logger
pub fn event_logger() -> Chart {
    Chart::new("event-logger", "shoot-event-logger", &[IMAGE_EVENT_LOGGER])
}

/// RBAC for the log store's auth sidecar
pub fn kube_rbac_proxy() -> Chart {
    Chart::new("kube-rbac-proxy", "shoot-kube-rbac-proxy", &[])
}
