//! Certificate secrets
//!
//! Secrets are addressed by a stable logical name (`ca-extension-logging`,
//! `loki-tls`). The stored Secret is named `<logical>-<hash>` where the hash
//! covers the secret's configuration and, for signed certificates, the name
//! of the signing CA secret. Changing either therefore produces a new Secret
//! and [`SecretsManagerTrait::cleanup`] removes the superseded one.

mod cert;
mod manager;

pub use manager::SecretsManager;

use crate::error::SeedError;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Label marking secrets owned by a secrets manager
pub const LABEL_MANAGED_BY: &str = "managed-by";
/// Value of [`LABEL_MANAGED_BY`]
pub const MANAGED_BY_SECRETS_MANAGER: &str = "secrets-manager";
/// Label carrying the manager identity
pub const LABEL_MANAGER_IDENTITY: &str = "manager-identity";
/// Label carrying the logical secret name
pub const LABEL_NAME: &str = "name";
/// Label set on secrets that survive a cleanup without config
pub const LABEL_PERSIST: &str = "persist";
/// Annotation holding the RFC 3339 issue time
pub const ANNOTATION_ISSUED_AT: &str = "secrets-manager.gardener.cloud/issued-at";
/// Annotation holding the RFC 3339 expiry time
pub const ANNOTATION_VALID_UNTIL: &str = "secrets-manager.gardener.cloud/valid-until";

/// Data key of a CA certificate
pub const DATA_KEY_CA_CERT: &str = "ca.crt";
/// Data key of a CA private key
pub const DATA_KEY_CA_KEY: &str = "ca.key";
/// Data key of the CA bundle distributed to clients
pub const DATA_KEY_CA_BUNDLE: &str = "bundle.crt";
/// Data key of a server certificate
pub const DATA_KEY_TLS_CERT: &str = "tls.crt";
/// Data key of a server private key
pub const DATA_KEY_TLS_KEY: &str = "tls.key";

/// Default CA validity
pub const DEFAULT_CA_VALIDITY_DAYS: i64 = 3650;
/// Default server certificate validity
pub const DEFAULT_SERVER_VALIDITY_DAYS: i64 = 365;

/// What kind of certificate a config describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CertificateKind {
    /// Self-signed certificate authority
    Ca,
    /// Server certificate signed by a CA
    Server,
}

/// Desired certificate secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretConfig {
    /// Logical name
    pub name: String,
    /// Subject common name
    pub common_name: String,
    /// Subject organizations
    pub organization: Vec<String>,
    /// Subject alternative names
    pub dns_names: Vec<String>,
    /// CA or server certificate
    pub kind: CertificateKind,
    /// Lifetime of an issued certificate
    pub validity_days: i64,
    /// Logical name of the CA that signs this certificate
    pub signed_by: Option<String>,
    /// Survive partial cleanups
    pub persist: bool,
}

impl SecretConfig {
    /// A self-signed CA whose common name equals its logical name
    pub fn ca(name: &str) -> Self {
        Self {
            name: name.to_string(),
            common_name: name.to_string(),
            organization: Vec::new(),
            dns_names: Vec::new(),
            kind: CertificateKind::Ca,
            validity_days: DEFAULT_CA_VALIDITY_DAYS,
            signed_by: None,
            persist: false,
        }
    }

    /// A server certificate signed by `ca`
    pub fn server(name: &str, common_name: &str, ca: &str) -> Self {
        Self {
            name: name.to_string(),
            common_name: common_name.to_string(),
            organization: Vec::new(),
            dns_names: Vec::new(),
            kind: CertificateKind::Server,
            validity_days: DEFAULT_SERVER_VALIDITY_DAYS,
            signed_by: Some(ca.to_string()),
            persist: false,
        }
    }

    /// Set the subject organizations
    #[must_use]
    pub fn with_organization(mut self, organization: Vec<String>) -> Self {
        self.organization = organization;
        self
    }

    /// Set the subject alternative names
    #[must_use]
    pub fn with_dns_names(mut self, dns_names: Vec<String>) -> Self {
        self.dns_names = dns_names;
        self
    }

    /// Set the certificate lifetime
    #[must_use]
    pub fn with_validity_days(mut self, days: i64) -> Self {
        self.validity_days = days;
        self
    }

    /// Keep the secret through cleanups that pass no config
    #[must_use]
    pub fn persisted(mut self) -> Self {
        self.persist = true;
        self
    }

    /// Name of the Secret storing this config, given the signing CA secret name
    pub fn secret_name(&self, signer_secret: Option<&str>) -> Result<String, SeedError> {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(self)?);
        if let Some(signer) = signer_secret {
            hasher.update(signer.as_bytes());
        }
        let digest = format!("{:x}", hasher.finalize());
        Ok(format!("{}-{}", self.name, &digest[..8]))
    }
}

/// Stored secret names of `configs` by logical name, resolving signers in order
pub fn secret_names(configs: &[SecretConfig]) -> Result<BTreeMap<String, String>, SeedError> {
    let mut names = BTreeMap::new();
    for config in configs {
        let signer = match &config.signed_by {
            Some(ca) => Some(names.get(ca).cloned().ok_or_else(|| {
                SeedError::InvalidState(format!("CA {} must be listed before {}", ca, config.name))
            })?),
            None => None,
        };
        let name = config.secret_name(signer.as_deref())?;
        names.insert(config.name.clone(), name);
    }
    Ok(names)
}

/// One issued secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretBundle {
    /// Name of the stored Secret
    pub name: String,
    /// Logical name
    pub logical_name: String,
    /// Secret data by key, e.g. `tls.crt`
    pub data: BTreeMap<String, Vec<u8>>,
}

impl SecretBundle {
    /// CA bundle (`bundle.crt`) of a CA secret
    pub fn ca_bundle(&self) -> Option<&[u8]> {
        self.data.get(DATA_KEY_CA_BUNDLE).map(Vec::as_slice)
    }
}

/// Issues, rotates and garbage-collects certificate secrets in a namespace
#[async_trait::async_trait]
pub trait SecretsManagerTrait: Send + Sync {
    /// Make sure a current secret exists for every config, in order; CAs must
    /// precede the certificates they sign. Returns bundles by logical name.
    async fn ensure_all(&self, namespace: &str, configs: &[SecretConfig]) -> Result<BTreeMap<String, SecretBundle>, SeedError>;

    /// The current secret for a logical name
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<SecretBundle>, SeedError>;

    /// Delete managed secrets not produced by `in_use`. Persisted secrets are
    /// only removed by a full cleanup (empty `in_use`).
    async fn cleanup(&self, namespace: &str, in_use: &[SecretConfig]) -> Result<(), SeedError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_name_is_stable() {
        let config = SecretConfig::ca("ca-extension-logging").persisted();
        let first = config.secret_name(None).unwrap();
        let second = config.secret_name(None).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("ca-extension-logging-"));
        assert_eq!(first.len(), "ca-extension-logging-".len() + 8);
    }

    #[test]
    fn test_secret_name_changes_with_config_and_signer() {
        let config = SecretConfig::server("loki-tls", "l-dev--foo.ingress.example.com", "ca-extension-logging")
            .with_dns_names(vec!["l-dev--foo.ingress.example.com".to_string()]);
        let base = config.secret_name(Some("ca-extension-logging-aaaaaaaa")).unwrap();

        let other_signer = config.secret_name(Some("ca-extension-logging-bbbbbbbb")).unwrap();
        assert_ne!(base, other_signer);

        let other_host = config
            .clone()
            .with_dns_names(vec!["l-dev--bar.ingress.example.com".to_string()])
            .secret_name(Some("ca-extension-logging-aaaaaaaa"))
            .unwrap();
        assert_ne!(base, other_host);
    }

    #[test]
    fn test_secret_names_requires_ca_first() {
        let ca = SecretConfig::ca("ca-extension-logging");
        let server = SecretConfig::server("loki-tls", "host", "ca-extension-logging");

        let names = secret_names(&[ca.clone(), server.clone()]).unwrap();
        let ca_name = names.get("ca-extension-logging").unwrap();
        assert_eq!(names.get("loki-tls").unwrap(), &server.secret_name(Some(ca_name)).unwrap());

        assert!(matches!(secret_names(&[server, ca]), Err(SeedError::InvalidState(_))));
    }
}
