//! Certificate secrets of the node-logging ingress

use crate::cluster::ClusterContext;
use seed_client::SecretConfig;

/// Identity of the secrets manager owning these secrets
pub const MANAGER_IDENTITY: &str = "extension-logging";
/// Logical name of the CA
pub const CA_NAME: &str = "ca-extension-logging";
/// Logical name of the log store's ingress certificate
pub const LOKI_TLS_NAME: &str = "loki-tls";
/// Organisation of the ingress certificate
pub const INGRESS_ORGANIZATION: &str = "gardener.cloud:monitoring:ingress";
/// Validity of the ingress certificate
pub const INGRESS_TLS_VALIDITY_DAYS: i64 = 730;
/// Host prefix of the log store ingress
pub const LOKI_HOST_PREFIX: &str = "l";

/// `<prefix>-<short technical id>.<seed ingress domain>`
pub fn compute_ingress_host(cluster: &ClusterContext, prefix: &str) -> String {
    format!(
        "{}-{}.{}",
        prefix,
        cluster.short_technical_id(),
        cluster.seed.ingress_domain().unwrap_or_default()
    )
}

/// Secret configs for a shoot with node logging, CA first
pub fn configs_for(cluster: &ClusterContext) -> Vec<SecretConfig> {
    let host = compute_ingress_host(cluster, LOKI_HOST_PREFIX);
    vec![
        SecretConfig::ca(CA_NAME).persisted(),
        SecretConfig::server(LOKI_TLS_NAME, &host, CA_NAME)
            .with_organization(vec![INGRESS_ORGANIZATION.to_string()])
            .with_dns_names(vec![host.clone()])
            .with_validity_days(INGRESS_TLS_VALIDITY_DAYS),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_cluster;
    use seed_client::CertificateKind;

    #[test]
    fn test_ingress_host() {
        let ctx = ClusterContext::from_cluster(&create_test_cluster("shoot--dev--foo", None));
        assert_eq!(compute_ingress_host(&ctx, "l"), "l-dev--foo.ingress.seed.example.com");
    }

    #[test]
    fn test_configs_for_shoot() {
        let ctx = ClusterContext::from_cluster(&create_test_cluster("shoot--dev--foo", None));
        let configs = configs_for(&ctx);
        assert_eq!(configs.len(), 2);

        assert_eq!(configs[0].name, CA_NAME);
        assert_eq!(configs[0].kind, CertificateKind::Ca);
        assert!(configs[0].persist);

        let tls = &configs[1];
        assert_eq!(tls.common_name, "l-dev--foo.ingress.seed.example.com");
        assert_eq!(tls.dns_names, vec![tls.common_name.clone()]);
        assert_eq!(tls.organization, vec![INGRESS_ORGANIZATION.to_string()]);
        assert_eq!(tls.validity_days, 730);
        assert_eq!(tls.signed_by.as_deref(), Some(CA_NAME));
    }
}
