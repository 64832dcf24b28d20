// In-memory secret store

use async_trait::async_trait;
use azfile_azure::{AzureError, Result, SecretSource};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::mock::CallRecorder;

type SecretData = BTreeMap<String, Vec<u8>>;

/// Secrets held in memory, keyed by namespace and name.
#[derive(Clone, Default)]
pub struct FakeSecretSource {
    secrets: Arc<Mutex<HashMap<(String, String), SecretData>>>,
    failure: Arc<Mutex<Option<String>>>,
    calls: CallRecorder,
}

impl FakeSecretSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one key to a secret, creating the secret when needed.
    pub fn with_secret(self, namespace: &str, name: &str, key: &str, value: &str) -> Self {
        self.secrets
            .lock()
            .entry((namespace.to_string(), name.to_string()))
            .or_default()
            .insert(key.to_string(), value.as_bytes().to_vec());
        self
    }

    /// Make every read fail, like an unreachable API server.
    pub fn failing(self, message: &str) -> Self {
        *self.failure.lock() = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> &CallRecorder {
        &self.calls
    }
}

#[async_trait]
impl SecretSource for FakeSecretSource {
    async fn get_secret_data(&self, namespace: &str, name: &str) -> Result<SecretData> {
        self.calls.record("get_secret_data", &[namespace, name]);

        if let Some(message) = self.failure.lock().clone() {
            return Err(AzureError::secret(namespace, name, message));
        }

        self.secrets
            .lock()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| AzureError::secret(namespace, name, "secret not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_secret_source() {
        let source = FakeSecretSource::new().with_secret("kube-system", "azure-cloud-provider", "cloud-config", "a: b");

        let data = source
            .get_secret_data("kube-system", "azure-cloud-provider")
            .await
            .unwrap();
        assert_eq!(data["cloud-config"], b"a: b".to_vec());

        assert!(source.get_secret_data("default", "missing").await.is_err());
        assert_eq!(source.calls().count("get_secret_data"), 2);
    }

    #[tokio::test]
    async fn test_failing_secret_source() {
        let source = FakeSecretSource::new().failing("connection refused");
        let err = source.get_secret_data("ns", "name").await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }
}
