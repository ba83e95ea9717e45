//! # OSC Mutating Webhook
//!
//! Serves the admission webhook that merges the published promtail units
//! and files into every OperatingSystemConfig of a shoot's control plane.
//!
//! Endpoints:
//! - `POST /webhooks/osc` - mutating AdmissionReview for OperatingSystemConfigs
//! - `GET /healthz` - liveness probe
//!
//! TLS is terminated in front of the server.

pub mod ensurer;


use crate::error::ControllerError;
use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use crds::OperatingSystemConfig;
use json_patch::{AddOperation, Patch, PatchOperation};
use jsonptr::PointerBuf;
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use seed_client::SeedClientTrait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Path the MutatingWebhookConfiguration points at
pub const OSC_WEBHOOK_PATH: &str = "/webhooks/osc";

/// Shared state of the webhook handlers
#[derive(Clone)]
pub struct WebhookState {
    /// Where published node agents are read from
    pub seed: Arc<dyn SeedClientTrait>,
}

impl std::fmt::Debug for WebhookState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookState").finish_non_exhaustive()
    }
}

/// Create the webhook router
pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(OSC_WEBHOOK_PATH, post(mutate_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(state)
}

/// Serve the webhook on `addr` until the listener fails
pub async fn serve(addr: SocketAddr, state: Arc<WebhookState>) -> Result<(), ControllerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ControllerError::Webhook(format!("cannot bind {}: {}", addr, e)))?;
    info!("OSC webhook listening on {}", addr);

    axum::serve(listener, router(state))
        .await
        .map_err(|e| ControllerError::Webhook(e.to_string()))
}

async fn healthz_handler() -> &'static str {
    "ok"
}

/// Handle a mutating admission review for an OperatingSystemConfig
///
/// Malformed reviews are answered with a denial.
pub async fn mutate_handler(
    State(state): State<Arc<WebhookState>>,
    body: Bytes,
) -> Json<AdmissionReview<DynamicObject>> {
    let review: AdmissionReview<OperatingSystemConfig> = match serde_json::from_slice(&body) {
        Ok(review) => review,
        Err(e) => {
            warn!("Failed to decode admission review: {}", e);
            return Json(AdmissionResponse::invalid(format!("cannot decode admission review: {}", e)).into_review());
        }
    };
    let request: AdmissionRequest<OperatingSystemConfig> = match review.try_into() {
        Ok(request) => request,
        Err(e) => {
            warn!("Admission review carries no request: {}", e);
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    Json(mutate(&state, &request).await.into_review())
}

async fn mutate(state: &WebhookState, request: &AdmissionRequest<OperatingSystemConfig>) -> AdmissionResponse {
    if !matches!(request.operation, Operation::Create | Operation::Update) {
        return AdmissionResponse::from(request);
    }
    let Some(osc) = request.object.as_ref() else {
        debug!(uid = %request.uid, "No object in admission request, allowing unchanged");
        return AdmissionResponse::from(request);
    };

    let namespace = request
        .namespace
        .clone()
        .or_else(|| osc.metadata.namespace.clone())
        .unwrap_or_default();

    let patch = match node_agent_patch(state.seed.as_ref(), &namespace, osc).await {
        Ok(Some(patch)) => patch,
        Ok(None) => return AdmissionResponse::from(request),
        Err(e) => {
            error!(uid = %request.uid, "Failed to merge node agent into OSC {}/{}: {}", namespace, request.name, e);
            return AdmissionResponse::from(request).deny(e.to_string());
        }
    };

    info!(
        uid = %request.uid,
        "Merging promtail units and files into OSC {}/{}",
        namespace,
        request.name
    );
    match AdmissionResponse::from(request).with_patch(patch) {
        Ok(response) => response,
        Err(e) => {
            error!(uid = %request.uid, "Failed to serialize patch: {}", e);
            AdmissionResponse::from(request).deny(format!("patch serialization error: {}", e))
        }
    }
}

/// Patch setting the merged units and files, `None` if nothing was published
///
/// Uses `add`, which replaces existing lists and creates missing ones.
async fn node_agent_patch(
    seed: &dyn SeedClientTrait,
    namespace: &str,
    osc: &OperatingSystemConfig,
) -> Result<Option<Patch>, ControllerError> {
    let Some(node_agent) = ensurer::published_node_agent(seed, namespace).await? else {
        return Ok(None);
    };

    let mut spec = osc.spec.clone();
    if !ensurer::merge(&mut spec, &node_agent) {
        return Ok(None);
    }

    let to_value = |what: &str, value: Result<serde_json::Value, serde_json::Error>| {
        value.map_err(|e| ControllerError::Webhook(format!("cannot serialize {}: {}", what, e)))
    };
    Ok(Some(Patch(vec![
        PatchOperation::Add(AddOperation {
            path: PointerBuf::from_tokens(["spec", "units"]),
            value: to_value("units", serde_json::to_value(&spec.units))?,
        }),
        PatchOperation::Add(AddOperation {
            path: PointerBuf::from_tokens(["spec", "files"]),
            value: to_value("files", serde_json::to_value(&spec.files))?,
        }),
    ])))
}
