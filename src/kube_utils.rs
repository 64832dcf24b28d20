//! Kubernetes client and secret access.

use async_trait::async_trait;
use azfile_azure::{AzureError, SecretSource};
use k8s_openapi::api::core::v1::Secret;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DriverError, Result};

/// Connection timeout for the API server.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Read timeout for API server requests.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

const SERVICE_HOST_ENV: &str = "KUBERNETES_SERVICE_HOST";

/// Create a client from a kubeconfig file or the in-cluster service account.
///
/// Returns `Ok(None)` when there is nothing to connect with: the kubeconfig
/// file does not exist, or no path was given and the process is not running
/// inside a cluster. Any other failure is an error.
pub async fn create_kube_client(kubeconfig: Option<&Path>) -> Result<Option<Client>> {
    let mut config = match kubeconfig {
        Some(path) => {
            if !path.exists() {
                info!(path = %path.display(), "kubeconfig not found, running without kubernetes client");
                return Ok(None);
            }
            let kubeconfig = Kubeconfig::read_from(path)
                .map_err(|e| DriverError::Kube(format!("failed to read kubeconfig: {}", e)))?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| DriverError::Kube(format!("failed to load kubeconfig: {}", e)))?
        }
        None => {
            if std::env::var_os(SERVICE_HOST_ENV).is_none() {
                info!("not running in a cluster, running without kubernetes client");
                return Ok(None);
            }
            Config::incluster()
                .map_err(|e| DriverError::Kube(format!("failed to load in-cluster config: {}", e)))?
        }
    };

    config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
    config.read_timeout = Some(DEFAULT_READ_TIMEOUT);
    let client = Client::try_from(config)
        .map_err(|e| DriverError::Kube(format!("failed to create client: {}", e)))?;
    Ok(Some(client))
}

/// Secrets read through the Kubernetes API.
#[derive(Clone)]
pub struct KubeSecretSource {
    client: Client,
}

impl KubeSecretSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretSource for KubeSecretSource {
    async fn get_secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> azfile_azure::Result<BTreeMap<String, Vec<u8>>> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = secrets
            .get(name)
            .await
            .map_err(|e| AzureError::secret(namespace, name, e.to_string()))?;

        let data = secret.data.unwrap_or_default();
        debug!(namespace, name, keys = data.len(), "read secret");
        Ok(data.into_iter().map(|(key, value)| (key, value.0)).collect())
    }
}
