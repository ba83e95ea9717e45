//! In-memory secrets manager

use crate::error::SeedError;
use crate::secrets::{
    secret_names, CertificateKind, SecretBundle, SecretConfig, SecretsManagerTrait, DATA_KEY_CA_BUNDLE,
    DATA_KEY_CA_CERT, DATA_KEY_CA_KEY, DATA_KEY_TLS_CERT, DATA_KEY_TLS_KEY,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Mock secrets manager
///
/// Produces placeholder PEM data under the same secret names the real
/// manager would use and records every call.
#[derive(Debug, Clone, Default)]
pub struct MockSecretsManager {
    pub(crate) secrets: Arc<Mutex<HashMap<(String, String), SecretBundle>>>,
    pub(crate) ensured: Arc<Mutex<Vec<(String, Vec<SecretConfig>)>>>,
    pub(crate) cleanups: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    pub(crate) fail: Arc<Mutex<bool>>,
}

impl MockSecretsManager {
    /// Create an empty mock
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `ensure_all` fail
    pub fn fail_ensure(&self) {
        *self.fail.lock().unwrap() = true;
    }

    /// Config lists passed to `ensure_all`, by namespace
    pub fn ensured(&self) -> Vec<(String, Vec<SecretConfig>)> {
        self.ensured.lock().unwrap().clone()
    }

    /// Logical names passed to `cleanup`, by namespace
    pub fn cleanups(&self) -> Vec<(String, Vec<String>)> {
        self.cleanups.lock().unwrap().clone()
    }
}

fn placeholder_data(config: &SecretConfig) -> BTreeMap<String, Vec<u8>> {
    let mut data = BTreeMap::new();
    match config.kind {
        CertificateKind::Ca => {
            let cert = format!("-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----\n", config.name);
            data.insert(DATA_KEY_CA_CERT.to_string(), cert.clone().into_bytes());
            data.insert(DATA_KEY_CA_KEY.to_string(), b"ca-key".to_vec());
            data.insert(DATA_KEY_CA_BUNDLE.to_string(), cert.into_bytes());
        }
        CertificateKind::Server => {
            data.insert(DATA_KEY_TLS_CERT.to_string(), config.common_name.clone().into_bytes());
            data.insert(DATA_KEY_TLS_KEY.to_string(), b"tls-key".to_vec());
        }
    }
    data
}

#[async_trait::async_trait]
impl SecretsManagerTrait for MockSecretsManager {
    async fn ensure_all(&self, namespace: &str, configs: &[SecretConfig]) -> Result<BTreeMap<String, SecretBundle>, SeedError> {
        self.ensured
            .lock()
            .unwrap()
            .push((namespace.to_string(), configs.to_vec()));
        if *self.fail.lock().unwrap() {
            return Err(SeedError::Certificate("injected failure".to_string()));
        }

        let names = secret_names(configs)?;
        let mut bundles = BTreeMap::new();
        let mut stored = self.secrets.lock().unwrap();
        for config in configs {
            let name = names.get(&config.name).cloned().unwrap_or_default();
            let bundle = SecretBundle {
                name,
                logical_name: config.name.clone(),
                data: placeholder_data(config),
            };
            stored.insert((namespace.to_string(), config.name.clone()), bundle.clone());
            bundles.insert(config.name.clone(), bundle);
        }
        Ok(bundles)
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<Option<SecretBundle>, SeedError> {
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn cleanup(&self, namespace: &str, in_use: &[SecretConfig]) -> Result<(), SeedError> {
        let names: Vec<String> = in_use.iter().map(|c| c.name.clone()).collect();
        self.secrets
            .lock()
            .unwrap()
            .retain(|(ns, logical), _| ns != namespace || names.contains(logical));
        self.cleanups.lock().unwrap().push((namespace.to_string(), names));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_all_uses_hashed_names() {
        let manager = MockSecretsManager::new();
        let configs = vec![
            SecretConfig::ca("ca-extension-logging").persisted(),
            SecretConfig::server("loki-tls", "host.example.com", "ca-extension-logging"),
        ];
        let bundles = manager.ensure_all("shoot--dev--foo", &configs).await.unwrap();

        let names = secret_names(&configs).unwrap();
        assert_eq!(bundles["loki-tls"].name, names["loki-tls"]);
        assert!(bundles["ca-extension-logging"].ca_bundle().is_some());

        manager.cleanup("shoot--dev--foo", &[]).await.unwrap();
        assert!(manager.get("shoot--dev--foo", "loki-tls").await.unwrap().is_none());
        assert_eq!(manager.cleanups(), vec![("shoot--dev--foo".to_string(), vec![])]);
    }

    #[tokio::test]
    async fn test_server_certificate_needs_its_ca_in_the_batch() {
        let manager = MockSecretsManager::new();
        manager
            .ensure_all("shoot--dev--foo", &[SecretConfig::ca("ca-unknown")])
            .await
            .unwrap();

        let orphan = vec![SecretConfig::server("loki-tls", "host.example.com", "ca-unknown")];
        let err = manager.ensure_all("shoot--dev--foo", &orphan).await.unwrap_err();
        assert!(err.to_string().contains("ca-unknown"), "{}", err);
        assert!(manager.get("shoot--dev--foo", "loki-tls").await.unwrap().is_none());
    }
}
