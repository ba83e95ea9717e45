//! Kube-backed secrets manager

use super::cert::{self, IssuedCertificate, SigningCa};
use super::{
    secret_names, CertificateKind, SecretBundle, SecretConfig, SecretsManagerTrait, ANNOTATION_ISSUED_AT,
    ANNOTATION_VALID_UNTIL, DATA_KEY_CA_BUNDLE, DATA_KEY_CA_CERT, DATA_KEY_CA_KEY, DATA_KEY_TLS_CERT,
    DATA_KEY_TLS_KEY, LABEL_MANAGED_BY, LABEL_MANAGER_IDENTITY, LABEL_NAME, LABEL_PERSIST,
    MANAGED_BY_SECRETS_MANAGER,
};
use crate::error::{is_not_found, SeedError};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams};
use kube::Client;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Issues certificates with rcgen and stores them as labelled Secrets
#[derive(Clone)]
pub struct SecretsManager {
    client: Client,
    identity: String,
}

impl std::fmt::Debug for SecretsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsManager")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl SecretsManager {
    /// Create a manager; `identity` scopes which secrets it owns
    pub fn new(client: Client, identity: &str) -> Self {
        Self {
            client,
            identity: identity.to_string(),
        }
    }

    fn api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn identity_selector(&self) -> String {
        format!(
            "{}={},{}={}",
            LABEL_MANAGED_BY, MANAGED_BY_SECRETS_MANAGER, LABEL_MANAGER_IDENTITY, self.identity
        )
    }

    async fn store(&self, namespace: &str, secret_name: &str, config: &SecretConfig, issued: &IssuedCertificate) -> Result<SecretBundle, SeedError> {
        let data = bundle_data(config.kind, issued);
        let secret = serde_json::json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {
                "name": secret_name,
                "namespace": namespace,
                "labels": {
                    LABEL_MANAGED_BY: MANAGED_BY_SECRETS_MANAGER,
                    LABEL_MANAGER_IDENTITY: self.identity,
                    LABEL_NAME: config.name,
                    LABEL_PERSIST: config.persist.to_string(),
                },
                "annotations": {
                    ANNOTATION_ISSUED_AT: issued.issued_at.to_rfc3339(),
                    ANNOTATION_VALID_UNTIL: issued.valid_until.to_rfc3339(),
                },
            },
            "type": "Opaque",
            "data": data
                .iter()
                .map(|(k, v)| (k.clone(), ByteString(v.clone())))
                .collect::<BTreeMap<_, _>>(),
        });
        self.api(namespace)
            .patch(secret_name, &PatchParams::apply(&self.identity).force(), &Patch::Apply(&secret))
            .await?;
        info!("Issued secret {}/{} for {}", namespace, secret_name, config.name);
        Ok(SecretBundle {
            name: secret_name.to_string(),
            logical_name: config.name.clone(),
            data,
        })
    }
}

fn bundle_data(kind: CertificateKind, issued: &IssuedCertificate) -> BTreeMap<String, Vec<u8>> {
    let mut data = BTreeMap::new();
    match kind {
        CertificateKind::Ca => {
            data.insert(DATA_KEY_CA_CERT.to_string(), issued.cert_pem.clone().into_bytes());
            data.insert(DATA_KEY_CA_KEY.to_string(), issued.key_pem.clone().into_bytes());
            data.insert(DATA_KEY_CA_BUNDLE.to_string(), issued.cert_pem.clone().into_bytes());
        }
        CertificateKind::Server => {
            data.insert(DATA_KEY_TLS_CERT.to_string(), issued.cert_pem.clone().into_bytes());
            data.insert(DATA_KEY_TLS_KEY.to_string(), issued.key_pem.clone().into_bytes());
        }
    }
    data
}

fn annotation_time(secret: &Secret, key: &str) -> Option<DateTime<Utc>> {
    secret
        .metadata
        .annotations
        .as_ref()?
        .get(key)
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn secret_to_bundle(secret: Secret, logical_name: &str) -> Result<SecretBundle, SeedError> {
    let name = secret
        .metadata
        .name
        .ok_or_else(|| SeedError::InvalidState(format!("secret for {} has no name", logical_name)))?;
    let data = secret
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.0))
        .collect();
    Ok(SecretBundle {
        name,
        logical_name: logical_name.to_string(),
        data,
    })
}

fn pem(bundle: &SecretBundle, key: &str) -> Result<String, SeedError> {
    let bytes = bundle
        .data
        .get(key)
        .ok_or_else(|| SeedError::InvalidState(format!("secret {} misses {}", bundle.name, key)))?;
    String::from_utf8(bytes.clone()).map_err(|e| SeedError::Certificate(e.to_string()))
}

/// CA bundle of this batch that signs `config`
///
/// Only CAs are self-signed. A certificate whose CA was not ensured earlier
/// in the batch is an error.
fn signing_ca<'a>(
    config: &SecretConfig,
    batch: &'a BTreeMap<String, SecretBundle>,
) -> Result<Option<&'a SecretBundle>, SeedError> {
    let Some(ca) = config.signed_by.as_deref() else {
        return Ok(None);
    };
    batch.get(ca).map(Some).ok_or_else(|| {
        SeedError::Certificate(format!("CA {} signing {} was not ensured before it", ca, config.name))
    })
}

#[async_trait::async_trait]
impl SecretsManagerTrait for SecretsManager {
    async fn ensure_all(&self, namespace: &str, configs: &[SecretConfig]) -> Result<BTreeMap<String, SecretBundle>, SeedError> {
        let names = secret_names(configs)?;
        let mut bundles: BTreeMap<String, SecretBundle> = BTreeMap::new();
        let mut reissued = BTreeSet::new();
        let now = Utc::now();

        for config in configs {
            let secret_name = names
                .get(&config.name)
                .ok_or_else(|| SeedError::InvalidState(format!("no secret name for {}", config.name)))?;
            let signer = signing_ca(config, &bundles)?;
            let signer_reissued = config.signed_by.as_ref().is_some_and(|ca| reissued.contains(ca));

            let existing = self.api(namespace).get_opt(secret_name).await?;
            let current = existing.filter(|secret| {
                let fresh = match (
                    annotation_time(secret, ANNOTATION_ISSUED_AT),
                    annotation_time(secret, ANNOTATION_VALID_UNTIL),
                ) {
                    (Some(issued), Some(until)) => !cert::needs_renewal(issued, until, now),
                    _ => false,
                };
                fresh && !signer_reissued
            });

            let bundle = match current {
                Some(secret) => {
                    debug!("Secret {}/{} is current", namespace, secret_name);
                    secret_to_bundle(secret, &config.name)?
                }
                None => {
                    let issued = match signer {
                        Some(ca) => {
                            let cert_pem = pem(ca, DATA_KEY_CA_CERT)?;
                            let key_pem = pem(ca, DATA_KEY_CA_KEY)?;
                            cert::issue(config, Some(SigningCa { cert_pem: &cert_pem, key_pem: &key_pem }), now)?
                        }
                        None => cert::issue(config, None, now)?,
                    };
                    reissued.insert(config.name.clone());
                    self.store(namespace, secret_name, config, &issued).await?
                }
            };
            bundles.insert(config.name.clone(), bundle);
        }
        Ok(bundles)
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<Option<SecretBundle>, SeedError> {
        let selector = format!("{},{}={}", self.identity_selector(), LABEL_NAME, name);
        let mut secrets = self.api(namespace).list(&ListParams::default().labels(&selector)).await?.items;
        secrets.sort_by_key(|s| annotation_time(s, ANNOTATION_ISSUED_AT));
        secrets.pop().map(|s| secret_to_bundle(s, name)).transpose()
    }

    async fn cleanup(&self, namespace: &str, in_use: &[SecretConfig]) -> Result<(), SeedError> {
        let keep: BTreeSet<String> = secret_names(in_use)?.into_values().collect();
        let full_cleanup = in_use.is_empty();
        let api = self.api(namespace);
        let secrets = api.list(&ListParams::default().labels(&self.identity_selector())).await?.items;

        for secret in secrets {
            let Some(name) = secret.metadata.name.clone() else {
                continue;
            };
            let persisted = secret
                .metadata
                .labels
                .as_ref()
                .and_then(|l| l.get(LABEL_PERSIST))
                .is_some_and(|v| v == "true");
            if keep.contains(&name) || (persisted && !full_cleanup) {
                continue;
            }
            info!("Deleting superseded secret {}/{}", namespace, name);
            match api.delete(&name, &DeleteParams::default()).await {
                Ok(_) => {}
                Err(e) if is_not_found(&e) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
