//! Access to cluster secrets holding the cloud config.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::Result;

/// Read access to a secret store, the Kubernetes API in production.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Decoded data of the secret `namespace/name`.
    async fn get_secret_data(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, Vec<u8>>>;
}
