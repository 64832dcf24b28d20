//! Cloud container holding the configuration and the resource clients.

use azfile_config::{ConfigLoader, FileFormat, Validate};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clients::{SubnetsClient, VirtualMachinesClient, VmssVmClient};
use crate::config::{CloudConfig, CredentialsSource, InitSecretConfig};
use crate::secret::SecretSource;
use crate::{AzureError, Result};

/// Azure cloud: configuration plus the clients built from it.
///
/// Clients are optional. A cloud whose configuration failed to load still
/// exists, it just has no clients, and every accessor reports what is missing.
#[derive(Clone)]
pub struct Cloud {
    config: CloudConfig,
    init_secret: InitSecretConfig,
    user_agent: String,
    vm_client: Option<Arc<dyn VirtualMachinesClient>>,
    vmss_vm_client: Option<Arc<dyn VmssVmClient>>,
    subnets_client: Option<Arc<dyn SubnetsClient>>,
    secret_source: Option<Arc<dyn SecretSource>>,
}

impl Cloud {
    /// Validate `config` and build Resource Manager clients for it.
    pub fn new(config: CloudConfig, user_agent: impl Into<String>) -> Result<Self> {
        let mut cloud = Self::builder().user_agent(user_agent).build();
        cloud.apply_config(config)?;
        Ok(cloud)
    }

    /// Create a builder, typically to inject substitute clients.
    pub fn builder() -> CloudBuilder {
        CloudBuilder::default()
    }

    /// Load the cloud config from the configured secret and apply it.
    pub async fn initialize_from_secret(&mut self) -> Result<()> {
        let source = self.secret_source()?;
        let InitSecretConfig {
            secret_name,
            secret_namespace,
            cloud_config_key,
        } = &self.init_secret;

        debug!(namespace = %secret_namespace, name = %secret_name, "reading cloud config secret");
        let data = source.get_secret_data(secret_namespace, secret_name).await?;
        let raw = data.get(cloud_config_key.as_str()).ok_or_else(|| {
            AzureError::secret(
                secret_namespace,
                secret_name,
                format!("key {} not found", cloud_config_key),
            )
        })?;
        let text = std::str::from_utf8(raw).map_err(|e| {
            AzureError::secret(secret_namespace, secret_name, format!("invalid UTF-8: {}", e))
        })?;

        // YAML parsing also accepts the JSON form of the document.
        let config: CloudConfig = ConfigLoader::new(FileFormat::Yaml)
            .parse_as(text)
            .map_err(|e| AzureError::secret(secret_namespace, secret_name, e.to_string()))?;

        self.apply_config(config)?;
        info!(
            namespace = %self.init_secret.secret_namespace,
            name = %self.init_secret.secret_name,
            "cloud config loaded from secret"
        );
        Ok(())
    }

    /// Replace the configuration and rebuild the clients.
    ///
    /// A config without credentials is kept when `useInstanceMetadata` is
    /// set; the cloud then has no Resource Manager clients.
    pub fn apply_config(&mut self, config: CloudConfig) -> Result<()> {
        config.validate()?;
        if !config.user_agent.is_empty() {
            self.user_agent = config.user_agent.clone();
        }
        match config.credentials() {
            Ok(credentials) => self.build_clients(&config, &credentials)?,
            Err(err) if config.use_instance_metadata => {
                warn!(error = %err, "no credentials in cloud config, running without resource manager clients");
                self.clear_clients();
            }
            Err(err) => return Err(err),
        }
        self.config = config;
        Ok(())
    }

    fn clear_clients(&mut self) {
        self.vm_client = None;
        self.vmss_vm_client = None;
        self.subnets_client = None;
    }

    #[cfg(feature = "arm")]
    fn build_clients(&mut self, config: &CloudConfig, credentials: &CredentialsSource) -> Result<()> {
        use crate::arm::{
            ArmClient, ArmClientConfig, ArmSubnetsClient, ArmVirtualMachinesClient,
            ArmVmssVmClient, CredentialToken,
        };

        let env = config.environment()?;
        let token = Arc::new(CredentialToken::from_source(credentials, &env)?);

        let mut arm_config =
            ArmClientConfig::new(env.resource_manager_endpoint.clone(), config.subscription_id.clone());
        if !self.user_agent.is_empty() {
            arm_config = arm_config.with_user_agent(self.user_agent.clone());
        }
        let arm = ArmClient::new(arm_config, token)?;

        let compute_version = config.compute_api_version();
        self.vm_client = Some(Arc::new(ArmVirtualMachinesClient::new(arm.clone(), compute_version)));
        self.vmss_vm_client = Some(Arc::new(ArmVmssVmClient::new(arm.clone(), compute_version)));
        self.subnets_client = Some(Arc::new(ArmSubnetsClient::new(arm)));

        debug!(cloud = env.name, subscription = %config.subscription_id, "resource manager clients ready");
        Ok(())
    }

    #[cfg(not(feature = "arm"))]
    fn build_clients(&mut self, _config: &CloudConfig, _credentials: &CredentialsSource) -> Result<()> {
        Ok(())
    }

    /// Current configuration.
    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    /// Mutable access to the configuration. Clients are not rebuilt.
    pub fn config_mut(&mut self) -> &mut CloudConfig {
        &mut self.config
    }

    pub fn init_secret(&self) -> &InitSecretConfig {
        &self.init_secret
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Resource group of the virtual network.
    pub fn vnet_resource_group(&self) -> &str {
        self.config.vnet_resource_group()
    }

    pub fn vm_client(&self) -> Result<Arc<dyn VirtualMachinesClient>> {
        self.vm_client
            .clone()
            .ok_or_else(|| AzureError::not_configured("VirtualMachinesClient"))
    }

    pub fn vmss_vm_client(&self) -> Result<Arc<dyn VmssVmClient>> {
        self.vmss_vm_client
            .clone()
            .ok_or_else(|| AzureError::not_configured("VirtualMachineScaleSetVMsClient"))
    }

    pub fn subnets_client(&self) -> Result<Arc<dyn SubnetsClient>> {
        self.subnets_client
            .clone()
            .ok_or_else(|| AzureError::not_configured("SubnetsClient"))
    }

    pub fn secret_source(&self) -> Result<Arc<dyn SecretSource>> {
        self.secret_source
            .clone()
            .ok_or_else(|| AzureError::not_configured("SecretSource"))
    }

    pub fn has_secret_source(&self) -> bool {
        self.secret_source.is_some()
    }

    /// Attach the secret store used by [`initialize_from_secret`](Self::initialize_from_secret).
    pub fn set_secret_source(&mut self, source: Arc<dyn SecretSource>) {
        self.secret_source = Some(source);
    }

    /// Point [`initialize_from_secret`](Self::initialize_from_secret) at another secret.
    pub fn set_init_secret(&mut self, init_secret: InitSecretConfig) {
        self.init_secret = init_secret;
    }
}

impl fmt::Debug for Cloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cloud")
            .field("config", &self.config)
            .field("init_secret", &self.init_secret)
            .field("user_agent", &self.user_agent)
            .field("vm_client", &self.vm_client.is_some())
            .field("vmss_vm_client", &self.vmss_vm_client.is_some())
            .field("subnets_client", &self.subnets_client.is_some())
            .field("secret_source", &self.secret_source.is_some())
            .finish()
    }
}

/// Builder for [`Cloud`]. No validation and no clients are built implicitly.
#[derive(Default)]
pub struct CloudBuilder {
    config: CloudConfig,
    init_secret: InitSecretConfig,
    user_agent: String,
    vm_client: Option<Arc<dyn VirtualMachinesClient>>,
    vmss_vm_client: Option<Arc<dyn VmssVmClient>>,
    subnets_client: Option<Arc<dyn SubnetsClient>>,
    secret_source: Option<Arc<dyn SecretSource>>,
}

impl CloudBuilder {
    pub fn config(mut self, config: CloudConfig) -> Self {
        self.config = config;
        self
    }

    pub fn init_secret(mut self, init_secret: InitSecretConfig) -> Self {
        self.init_secret = init_secret;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn vm_client(mut self, client: Arc<dyn VirtualMachinesClient>) -> Self {
        self.vm_client = Some(client);
        self
    }

    pub fn vmss_vm_client(mut self, client: Arc<dyn VmssVmClient>) -> Self {
        self.vmss_vm_client = Some(client);
        self
    }

    pub fn subnets_client(mut self, client: Arc<dyn SubnetsClient>) -> Self {
        self.subnets_client = Some(client);
        self
    }

    pub fn secret_source(mut self, source: Arc<dyn SecretSource>) -> Self {
        self.secret_source = Some(source);
        self
    }

    pub fn build(self) -> Cloud {
        Cloud {
            config: self.config,
            init_secret: self.init_secret,
            user_agent: self.user_agent,
            vm_client: self.vm_client,
            vmss_vm_client: self.vmss_vm_client,
            subnets_client: self.subnets_client,
            secret_source: self.secret_source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct MapSecret(BTreeMap<String, Vec<u8>>);

    #[async_trait]
    impl SecretSource for MapSecret {
        async fn get_secret_data(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, Vec<u8>>> {
            if namespace == "kube-system" && name == "azure-cloud-provider" {
                Ok(self.0.clone())
            } else {
                Err(AzureError::secret(namespace, name, "not found"))
            }
        }
    }

    fn secret_with(key: &str, value: &str) -> Arc<dyn SecretSource> {
        let mut data = BTreeMap::new();
        data.insert(key.to_string(), value.as_bytes().to_vec());
        Arc::new(MapSecret(data))
    }

    const YAML_CONFIG: &str = "
tenantId: tenant
subscriptionId: sub
resourceGroup: rg
location: westus2
vnetName: vnet
subnetName: subnet
aadClientId: client
aadClientSecret: secret
";

    #[test]
    fn test_empty_cloud_reports_missing_clients() {
        let cloud = Cloud::builder().build();
        assert!(matches!(
            cloud.subnets_client(),
            Err(AzureError::ClientNotConfigured("SubnetsClient"))
        ));
        assert_eq!(
            cloud.subnets_client().err().map(|e| e.to_string()).as_deref(),
            Some("SubnetsClient is not configured")
        );
        assert!(cloud.vm_client().is_err());
        assert!(cloud.vmss_vm_client().is_err());
        assert!(!cloud.has_secret_source());
    }

    #[test]
    fn test_new_rejects_incomplete_config() {
        let config = CloudConfig::builder().identity("tenant", "").build();
        assert!(matches!(Cloud::new(config, "ua"), Err(AzureError::Config(_))));
    }

    #[test]
    fn test_config_without_credentials_kept_with_instance_metadata() {
        let config = CloudConfig::builder()
            .identity("tenant", "sub")
            .resource_group("rg", "westus2")
            .network("", "vnet", "subnet")
            .use_instance_metadata(true)
            .build();
        let cloud = Cloud::new(config, "ua").unwrap();
        assert_eq!(cloud.config().location, "westus2");
        assert_eq!(cloud.config().vnet_name, "vnet");
        assert!(cloud.subnets_client().is_err());
        assert!(cloud.vm_client().is_err());
    }

    #[test]
    fn test_config_without_credentials_rejected_without_instance_metadata() {
        let config = CloudConfig::builder()
            .identity("tenant", "sub")
            .resource_group("rg", "westus2")
            .build();
        assert!(matches!(Cloud::new(config, "ua"), Err(AzureError::Auth(_))));
    }

    #[cfg(feature = "arm")]
    #[test]
    fn test_new_builds_clients() {
        let config = CloudConfig::builder()
            .identity("tenant", "sub")
            .resource_group("rg", "westus2")
            .service_principal("client", "secret")
            .build();
        let cloud = Cloud::new(config, "azfile/test").unwrap();
        assert!(cloud.subnets_client().is_ok());
        assert!(cloud.vm_client().is_ok());
        assert_eq!(cloud.user_agent(), "azfile/test");
    }

    #[tokio::test]
    async fn test_initialize_from_secret() {
        let mut cloud = Cloud::builder()
            .secret_source(secret_with("cloud-config", YAML_CONFIG))
            .build();
        cloud.initialize_from_secret().await.unwrap();
        assert_eq!(cloud.config().subscription_id, "sub");
        assert_eq!(cloud.vnet_resource_group(), "rg");
    }

    #[tokio::test]
    async fn test_initialize_from_secret_accepts_json() {
        let json = r#"{"tenantId":"t","subscriptionId":"s","resourceGroup":"r","useManagedIdentityExtension":true}"#;
        let mut cloud = Cloud::builder()
            .secret_source(secret_with("cloud-config", json))
            .build();
        cloud.initialize_from_secret().await.unwrap();
        assert!(cloud.config().use_managed_identity_extension);
    }

    #[tokio::test]
    async fn test_initialize_from_secret_missing_key() {
        let mut cloud = Cloud::builder()
            .secret_source(secret_with("other", YAML_CONFIG))
            .build();
        let err = cloud.initialize_from_secret().await.unwrap_err();
        assert!(matches!(err, AzureError::Secret { .. }));
        assert!(!cloud.config().has_identity());
    }

    #[tokio::test]
    async fn test_initialize_from_secret_without_source() {
        let mut cloud = Cloud::builder().build();
        assert!(matches!(
            cloud.initialize_from_secret().await,
            Err(AzureError::ClientNotConfigured("SecretSource"))
        ));
    }
}
