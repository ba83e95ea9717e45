//! Read-only view of the owning cluster
//!
//! Built fresh from the `Cluster` object on every reconciliation and never
//! cached.

use crds::{AdvertisedAddress, Cluster, MaintenanceTimeWindow, Seed};

/// Hibernation phase of a shoot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HibernationState {
    Awake,
    /// Hibernation requested, not yet reached
    Hibernating,
    /// Wake-up requested, still hibernated
    WakingUp,
    Hibernated,
}

impl HibernationState {
    /// Derive the phase from the requested and the observed state
    pub fn from_flags(enabled: bool, is_hibernated: bool) -> Self {
        match (enabled, is_hibernated) {
            (true, true) => HibernationState::Hibernated,
            (true, false) => HibernationState::Hibernating,
            (false, true) => HibernationState::WakingUp,
            (false, false) => HibernationState::Awake,
        }
    }

    /// Desired log-store replicas: zero only once fully hibernated
    pub fn log_store_replicas(self) -> i32 {
        match self {
            HibernationState::Hibernated => 0,
            HibernationState::Awake | HibernationState::Hibernating | HibernationState::WakingUp => 1,
        }
    }
}

/// Projection of a `Cluster` used by the shoot actuator
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterContext {
    /// Cluster name, equal to the control-plane namespace
    pub name: String,
    pub hibernation: HibernationState,
    pub creation_in_progress: bool,
    pub purpose: Option<String>,
    pub technical_id: String,
    pub advertised_addresses: Vec<AdvertisedAddress>,
    pub maintenance_window: Option<MaintenanceTimeWindow>,
    pub seed: Seed,
    pub generic_token_kubeconfig_secret: String,
}

impl ClusterContext {
    pub fn from_cluster(cluster: &Cluster) -> Self {
        let shoot = &cluster.spec.shoot;
        Self {
            name: cluster.metadata.name.clone().unwrap_or_default(),
            hibernation: HibernationState::from_flags(shoot.hibernation_enabled(), shoot.status.is_hibernated),
            creation_in_progress: shoot.creation_in_progress(),
            purpose: shoot.spec.purpose.clone(),
            technical_id: shoot.status.technical_id.clone(),
            advertised_addresses: shoot.status.advertised_addresses.clone(),
            maintenance_window: shoot
                .spec
                .maintenance
                .as_ref()
                .and_then(|m| m.time_window.clone()),
            seed: cluster.spec.seed.clone(),
            generic_token_kubeconfig_secret: cluster.generic_token_kubeconfig_secret_name(),
        }
    }

    /// Technical ID without the `shoot--` prefix
    pub fn short_technical_id(&self) -> String {
        self.technical_id.replacen(crds::TECHNICAL_ID_PREFIX, "", 1)
    }

    /// Best-effort API server URL: `internal`, else the first `external`,
    /// else the first advertised address
    pub fn api_server_url(&self) -> Option<&str> {
        let by_name = |name: &str| self.advertised_addresses.iter().find(|a| a.name == name);
        by_name("internal")
            .or_else(|| by_name("external"))
            .or_else(|| self.advertised_addresses.first())
            .map(|a| a.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_cluster;

    #[test]
    fn test_hibernation_states() {
        assert_eq!(HibernationState::from_flags(true, true), HibernationState::Hibernated);
        assert_eq!(HibernationState::from_flags(true, false), HibernationState::Hibernating);
        assert_eq!(HibernationState::from_flags(false, true), HibernationState::WakingUp);
        assert_eq!(HibernationState::from_flags(false, false), HibernationState::Awake);
    }

    #[test]
    fn test_only_hibernated_scales_to_zero() {
        assert_eq!(HibernationState::Hibernated.log_store_replicas(), 0);
        for state in [
            HibernationState::Awake,
            HibernationState::Hibernating,
            HibernationState::WakingUp,
        ] {
            assert_eq!(state.log_store_replicas(), 1, "{:?}", state);
        }
    }

    fn address(name: &str, url: &str) -> AdvertisedAddress {
        AdvertisedAddress {
            name: name.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_api_server_url_precedence() {
        let mut ctx = ClusterContext::from_cluster(&create_test_cluster("shoot--dev--foo", Some("evaluation")));

        ctx.advertised_addresses = vec![
            address("unmanaged", "https://a"),
            address("external", "https://ext1"),
            address("external", "https://ext2"),
            address("internal", "https://int"),
        ];
        assert_eq!(ctx.api_server_url(), Some("https://int"));

        ctx.advertised_addresses.pop();
        assert_eq!(ctx.api_server_url(), Some("https://ext1"));

        ctx.advertised_addresses = vec![address("unmanaged", "https://a"), address("other", "https://b")];
        assert_eq!(ctx.api_server_url(), Some("https://a"));

        ctx.advertised_addresses.clear();
        assert_eq!(ctx.api_server_url(), None);
    }

    #[test]
    fn test_context_from_cluster() {
        let ctx = ClusterContext::from_cluster(&create_test_cluster("shoot--dev--foo", Some("evaluation")));
        assert_eq!(ctx.name, "shoot--dev--foo");
        assert_eq!(ctx.short_technical_id(), "dev--foo");
        assert_eq!(ctx.hibernation, HibernationState::Awake);
        assert_eq!(ctx.purpose.as_deref(), Some("evaluation"));
        assert_eq!(ctx.generic_token_kubeconfig_secret, "generic-token-kubeconfig");
    }
}
