//! Log shipper filters and parsers contributed by other extensions
//!
//! Extensions publish fluent-bit snippets in ConfigMaps labelled
//! `extensions.gardener.cloud/configuration=logging` in the `garden`
//! namespace. Their `rewrite_tag` filters that re-tag user-exposed logs are
//! replaced by a `modify` filter tagging the record for multi-tenancy.

use crate::error::ControllerError;
use k8s_openapi::api::core::v1::ConfigMap;
use regex::Regex;

/// Label selecting logging configuration ConfigMaps
pub const CONFIGURATION_LABEL_SELECTOR: &str = "extensions.gardener.cloud/configuration=logging";
pub const DATA_KEY_KUBERNETES_FILTER: &str = "filter-kubernetes.conf";
pub const DATA_KEY_PARSER: &str = "parser.conf";

const FILTER_SEPARATOR: &str = "[FILTER]";
const PLACEHOLDER: &str = "__PLACE_HOLDER__";
const MODIFY_FILTER: &str = "
    Name          modify
    Match         kubernetes.*
    Condition     Key_value_matches tag __PLACE_HOLDER__
    Add           __gardener_multitenant_id__ operator;user
";

/// Filter for the shoot event logger's records
pub const EVENT_LOGGER_FILTER: &str = "[FILTER]
    Name          parser
    Match         kubernetes.*event-logger*event-logger*
    Key_Name      log
    Parser        eventLoggerParser
    Reserve_Data  True

[FILTER]
    Name          modify
    Match         kubernetes.*event-logger*event-logger*
    Add           __gardener_multitenant_id__ operator;user
";

/// Aggregated fluent-bit snippets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdditionalConfig {
    pub filters: String,
    pub parsers: String,
}

/// Rewrite one ConfigMap's `filter-kubernetes.conf`
pub fn rewrite_filters(filters: &str) -> Result<String, ControllerError> {
    let rewrite_tag = Regex::new(r"\$tag\s+(.+?)\s+user-exposed\.\$TAG\s+true")
        .map_err(|e| ControllerError::InvalidConfig(format!("failed to compile regex: {}", e)))?;

    let mut out = String::new();
    for token in filters.split(FILTER_SEPARATOR) {
        let token = if token.contains("rewrite_tag") {
            match rewrite_tag.captures(token).and_then(|c| c.get(1)) {
                Some(tag) => MODIFY_FILTER.replacen(PLACEHOLDER, tag.as_str(), 1),
                None => continue,
            }
        } else {
            token.to_string()
        };
        if !token.trim().is_empty() {
            out.push_str(FILTER_SEPARATOR);
        }
        out.push_str(&token);
    }
    Ok(out.trim_end_matches(' ').to_string())
}

/// Concatenate filters and parsers of `config_maps`, sorted by name
pub fn aggregate(event_logging: bool, mut config_maps: Vec<ConfigMap>) -> Result<AdditionalConfig, ControllerError> {
    config_maps.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));

    let mut config = AdditionalConfig::default();
    if event_logging {
        config.filters.push_str(EVENT_LOGGER_FILTER);
    }

    for cm in &config_maps {
        let value = |key: &str| {
            cm.data
                .as_ref()
                .and_then(|d| d.get(key))
                .map(String::as_str)
                .unwrap_or_default()
        };
        config.filters.push_str(&rewrite_filters(value(DATA_KEY_KUBERNETES_FILTER))?);
        config.filters.push('\n');
        config.parsers.push_str(value(DATA_KEY_PARSER));
        config.parsers.push('\n');
    }
    Ok(config)
}
