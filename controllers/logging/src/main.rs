//! Logging Controller
//!
//! Lifecycle controller for the logging stacks of a Gardener seed:
//! - `Logging` of type `seed`: the seed-wide log store and its bootstrap
//! - `Logging` of type `shoot`: per-shoot log store, event logger and the
//!   promtail node agent published for the OSC webhook
//!
//! The OSC webhook merges the published node agent into every
//! OperatingSystemConfig of a shoot control plane.

mod actuator;
mod backoff;
mod charts;
mod cluster;
mod config;
mod controller;
mod error;
mod node_agent;
mod reconciler;
mod secrets;
mod watcher;
mod webhook;

#[cfg(test)]
mod test_utils;

use crate::config::{Configuration, Settings};
use anyhow::{Context, Result};
use controller::Controller;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting Logging Controller");

    let settings = Settings::from_env().context("Failed to read settings from the environment")?;
    let config = Configuration::from_file(&settings.config_path)
        .with_context(|| format!("Failed to load configuration from {}", settings.config_path.display()))?;

    info!("Configuration:");
    info!("  Config file: {}", settings.config_path.display());
    info!("  Namespace: {}", settings.watch_namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Webhook address: {}", settings.webhook_addr);
    info!("  Charts: {}", settings.charts_path.display());
    info!("  Event logging: {}", config.is_event_logging_enabled());
    info!("  Sync period: {:?}", config.sync_period()?);

    let controller = Controller::new(settings, config)
        .await
        .context("Failed to initialize the controller")?;
    controller.run().await?;

    Ok(())
}
