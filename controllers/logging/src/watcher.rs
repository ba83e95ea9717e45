//! Kubernetes resource watchers.
//!
//! `Logging` resources are reconciled through `kube_runtime::Controller`,
//! which handles reconnection and queueing. A change to a `Cluster` requeues
//! every `Logging` in the control-plane namespace of the same name, so
//! hibernation and purpose changes are picked up without a `Logging` edit.

use crate::backoff::BackoffRegistry;
use crate::error::ControllerError;
use crate::reconciler::{object_key, Reconciler};
use crds::{Cluster, Logging, LOGGING_TYPE_SEED, LOGGING_TYPE_SHOOT, TECHNICAL_ID_PREFIX};
use futures::StreamExt;
use kube::{Api, Client};
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Namespace of the seed-wide Logging
pub const GARDEN_NAMESPACE: &str = "garden";

const DEBOUNCE: Duration = Duration::from_secs(1);
const CONCURRENCY: u16 = 5;

/// State shared by all reconcile calls
#[derive(Debug)]
pub struct WatchContext {
    reconciler: Arc<Reconciler>,
    backoff: BackoffRegistry,
    sync_period: Duration,
}

impl WatchContext {
    pub fn new(reconciler: Arc<Reconciler>, sync_period: Duration) -> Self {
        Self {
            reconciler,
            backoff: BackoffRegistry::new(),
            sync_period,
        }
    }
}

/// Whether this controller is responsible for `logging`
///
/// Only the `garden` namespace and shoot control-plane namespaces carry
/// Loggings, and only the `seed` and `shoot` types are known.
pub fn is_watched(logging: &Logging) -> bool {
    let in_scope = logging
        .metadata
        .namespace
        .as_deref()
        .is_some_and(|ns| ns == GARDEN_NAMESPACE || ns.starts_with(TECHNICAL_ID_PREFIX));
    in_scope && matches!(logging.spec.logging_type.as_str(), LOGGING_TYPE_SEED | LOGGING_TYPE_SHOOT)
}

/// Loggings living in the control-plane namespace of `cluster`
pub fn loggings_for_cluster(cluster: &Cluster, loggings: &[Arc<Logging>]) -> Vec<ObjectRef<Logging>> {
    let Some(namespace) = cluster.metadata.name.as_deref() else {
        return Vec::new();
    };
    loggings
        .iter()
        .filter(|l| l.metadata.namespace.as_deref() == Some(namespace))
        .map(|l| ObjectRef::from_obj(l.as_ref()))
        .collect()
}

async fn reconcile(logging: Arc<Logging>, ctx: Arc<WatchContext>) -> Result<Action, ControllerError> {
    if !is_watched(&logging) {
        debug!("Ignoring Logging {}", object_key(&logging));
        return Ok(Action::await_change());
    }

    let key = object_key(&logging);
    let namespace = logging.metadata.namespace.as_deref().unwrap_or_default();
    let name = logging.metadata.name.as_deref().unwrap_or_default();
    ctx.reconciler.process(namespace, name).await?;

    ctx.backoff.reset(&key);
    debug!("Requeueing Logging {} in {:?}", key, ctx.sync_period);
    Ok(Action::requeue(ctx.sync_period))
}

fn error_policy(logging: Arc<Logging>, error: &ControllerError, ctx: Arc<WatchContext>) -> Action {
    let key = object_key(&logging);
    let delay = ctx.backoff.next_delay(&key);
    error!("Reconciliation of Logging {} failed: {}, retrying in {:?}", key, error, delay);
    Action::requeue(delay)
}

/// Watch Loggings (in `namespace`, or everywhere) and their Clusters until the stream ends
pub async fn watch_loggings(
    client: Client,
    namespace: Option<String>,
    ctx: Arc<WatchContext>,
) -> Result<(), ControllerError> {
    let loggings: Api<Logging> = match namespace.as_deref() {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };
    let clusters: Api<Cluster> = Api::all(client);
    info!(
        "Starting Logging watcher in {}",
        namespace.as_deref().unwrap_or("all namespaces")
    );

    let controller = Controller::new(loggings, watcher::Config::default());
    let store = controller.store();
    let controller_config = ControllerConfig::default()
        .debounce(DEBOUNCE)
        .concurrency(CONCURRENCY);

    controller
        .watches(clusters, watcher::Config::default(), move |cluster: Cluster| {
            loggings_for_cluster(&cluster, &store.state())
        })
        .with_config(controller_config)
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled {}", obj),
                Err(e) => error!("Controller error for Logging: {}", e),
            }
        })
        .await;

    Err(ControllerError::Watch("Logging watch stream ended".to_string()))
}
