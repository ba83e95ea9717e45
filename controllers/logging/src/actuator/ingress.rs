//! Ingress class selection

use crate::error::ControllerError;
use crds::Seed;

pub const INGRESS_CLASS_NGINX: &str = "nginx";
pub const INGRESS_CLASS_NGINX_GARDENER: &str = "nginx-gardener";
pub const INGRESS_CLASS_NGINX_INGRESS_GARDENER: &str = "nginx-ingress-gardener";

/// Ingress class for the seed: the managed controller switched class names
/// with Kubernetes 1.22
pub fn compute_nginx_ingress_class(seed: &Seed) -> Result<&'static str, ControllerError> {
    let version = seed
        .status
        .kubernetes_version
        .as_deref()
        .ok_or_else(|| ControllerError::InvalidConfig("seed kubernetes version is not set".to_string()))?;
    let (major, minor) = parse_major_minor(version)?;
    let managed = seed.uses_managed_nginx();

    Ok(if managed && (major, minor) >= (1, 22) {
        INGRESS_CLASS_NGINX_INGRESS_GARDENER
    } else if managed {
        INGRESS_CLASS_NGINX_GARDENER
    } else {
        INGRESS_CLASS_NGINX
    })
}

/// Major and minor of versions like `v1.24.3-gke.100` or `1.21.0+k3s1`
pub fn parse_major_minor(version: &str) -> Result<(u64, u64), ControllerError> {
    let invalid = || ControllerError::InvalidConfig(format!("invalid kubernetes version '{}'", version));

    let trimmed = version.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    let core = trimmed.split(['-', '+']).next().unwrap_or_default();

    let mut parts = core.split('.');
    let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let minor = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    Ok((major, minor))
}
