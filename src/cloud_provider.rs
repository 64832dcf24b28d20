//! Cloud provider bootstrap.
//!
//! Configuration comes from the cluster secret when a Kubernetes client is
//! available, otherwise from a credentials file on the host. Missing
//! configuration never stops the driver: it is logged and the driver runs
//! with an unconfigured cloud.

use azfile_azure::{Cloud, CloudConfig, InitSecretConfig, SecretSource};
use azfile_config::{ConfigLoader, EnvLoader, FileFormat};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::kube_utils::{KubeSecretSource, create_kube_client};

/// Default credentials file on Linux nodes.
pub const DEFAULT_CRED_FILE_PATH_LINUX: &str = "/etc/kubernetes/azure.json";
/// Default credentials file on Windows nodes.
pub const DEFAULT_CRED_FILE_PATH_WINDOWS: &str = "C:\\k\\azure.json";
/// Environment variable overriding the credentials file location.
pub const CREDENTIAL_FILE_ENV: &str = "AZURE_CREDENTIAL_FILE";

/// Inputs to [`get_cloud_provider`].
#[derive(Debug, Clone, Default)]
pub struct CloudProviderOptions {
    /// Kubeconfig path, in-cluster config when `None`.
    pub kubeconfig: Option<PathBuf>,
    /// Node name, empty for the controller.
    pub node_id: String,
    /// Cloud config secret name, default when empty.
    pub secret_name: String,
    /// Cloud config secret namespace, default when empty.
    pub secret_namespace: String,
    pub user_agent: String,
    /// Credentials file, resolved from the environment when `None`.
    pub credential_file: Option<PathBuf>,
}

impl CloudProviderOptions {
    /// Whether the driver runs as the controller rather than on a node.
    pub fn is_controller(&self) -> bool {
        self.node_id.is_empty()
    }
}

/// Build the cloud the driver works against.
///
/// Fails only when a Kubernetes client was expected but could not be created.
pub async fn get_cloud_provider(options: &CloudProviderOptions) -> Result<Cloud> {
    let secret_source = create_kube_client(options.kubeconfig.as_deref())
        .await?
        .map(|client| Arc::new(KubeSecretSource::new(client)) as Arc<dyn SecretSource>);

    Ok(bootstrap_cloud(secret_source, options).await)
}

/// Load the cloud config from the secret, falling back to the credentials file.
pub async fn bootstrap_cloud(secret_source: Option<Arc<dyn SecretSource>>, options: &CloudProviderOptions) -> Cloud {
    let init_secret = InitSecretConfig::new(&options.secret_name, &options.secret_namespace);
    let mut cloud = Cloud::builder()
        .init_secret(init_secret.clone())
        .user_agent(options.user_agent.clone())
        .build();

    if let Some(source) = &secret_source {
        cloud.set_secret_source(source.clone());
        info!(
            namespace = %init_secret.secret_namespace,
            name = %init_secret.secret_name,
            "reading cloud config from secret"
        );
        if let Err(err) = cloud.initialize_from_secret().await {
            warn!(error = %err, "failed to initialize cloud from secret");
        }
    }

    let mut configured = cloud.config().has_identity();
    if !configured {
        let path = credential_file_path(options.credential_file.as_deref());
        info!(path = %path.display(), "could not read cloud config from secret, reading credentials file");
        match load_cloud_from_file(&path, &options.user_agent) {
            Ok(mut from_file) => {
                from_file.set_init_secret(init_secret);
                cloud = from_file;
                configured = true;
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to get cloud config from file, driver will run without cloud config"
                );
            }
        }
    }

    if let Some(source) = secret_source
        && !cloud.has_secret_source()
    {
        cloud.set_secret_source(source);
    }

    if configured && options.is_controller() {
        info!("disabling instance metadata in controller");
        cloud.config_mut().use_instance_metadata = false;
    }

    cloud
}

/// Credentials file location: explicit path, then `AZURE_CREDENTIAL_FILE`,
/// then the platform default.
pub fn credential_file_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(path) = EnvLoader::default()
        .lookup(CREDENTIAL_FILE_ENV)
        .filter(|p| !p.is_empty())
    {
        return PathBuf::from(path);
    }
    if cfg!(windows) {
        PathBuf::from(DEFAULT_CRED_FILE_PATH_WINDOWS)
    } else {
        PathBuf::from(DEFAULT_CRED_FILE_PATH_LINUX)
    }
}

/// Read a credentials file and build a cloud from it.
///
/// The file is parsed as YAML whatever its name, which covers JSON content.
pub fn load_cloud_from_file(path: &Path, user_agent: &str) -> azfile_azure::Result<Cloud> {
    let config: CloudConfig = ConfigLoader::new(FileFormat::Yaml).load_as(path)?;
    Cloud::new(config, user_agent)
}
