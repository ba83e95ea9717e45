//! Main controller implementation.
//!
//! Wires the collaborators into a [`Reconciler`] and runs the Logging
//! watcher next to the OSC webhook server. Either task exiting stops the
//! controller.

use crate::actuator::ActuatorContext;
use crate::config::{Configuration, Settings};
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::secrets::MANAGER_IDENTITY;
use crate::watcher::{watch_loggings, WatchContext};
use crate::webhook::{self, WebhookState};
use chart_renderer::{HelmChartApplier, ImageVector};
use kube::Client;
use seed_client::{SecretsManager, SeedClient, SeedClientTrait};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Image vector shipped with the charts
const IMAGES_YAML: &str = include_str!("../../../charts/images.yaml");

/// Logging watcher plus OSC webhook.
pub struct Controller {
    watcher: JoinHandle<Result<(), ControllerError>>,
    webhook: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its tasks.
    pub async fn new(settings: Settings, config: Configuration) -> Result<Self, ControllerError> {
        info!("Initializing Logging Controller");

        let client = Client::try_default().await?;

        let image_vector = ImageVector::from_yaml(IMAGES_YAML)?.with_env_override()?;
        let sync_period = config.sync_period()?;

        let seed: Arc<dyn SeedClientTrait> = Arc::new(SeedClient::new(client.clone()));
        let ctx = ActuatorContext {
            seed: seed.clone(),
            secrets: Arc::new(SecretsManager::new(client.clone(), MANAGER_IDENTITY)),
            charts: Arc::new(HelmChartApplier::new()),
            image_vector: Arc::new(image_vector),
            config: Arc::new(config),
            charts_path: settings.charts_path.clone(),
        };
        let reconciler = Arc::new(Reconciler::new(ctx));

        let watch_ctx = Arc::new(WatchContext::new(reconciler, sync_period));
        let watcher = tokio::spawn(watch_loggings(client, settings.watch_namespace.clone(), watch_ctx));
        let webhook = tokio::spawn(webhook::serve(settings.webhook_addr, Arc::new(WebhookState { seed })));

        Ok(Self { watcher, webhook })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Logging Controller running");

        // Both tasks run forever; the first to exit decides the outcome
        tokio::select! {
            result = &mut self.watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Logging watcher panicked: {}", e)))??;
            }
            result = &mut self.webhook => {
                result.map_err(|e| ControllerError::Webhook(format!("OSC webhook panicked: {}", e)))??;
            }
        }

        Ok(())
    }
}
