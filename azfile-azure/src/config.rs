//! Azure cloud configuration.
//!
//! [`CloudConfig`] is the `azure.json` document shared by the Kubernetes
//! Azure integrations, whether it comes from a node file or from the
//! `cloud-config` key of a cluster secret.

use azfile_config::{ConfigValidator, Validate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// API version for compute resources.
pub const COMPUTE_API_VERSION: &str = "2020-12-01";
/// API version for compute resources on Azure Stack.
pub const AZURE_STACK_COMPUTE_API_VERSION: &str = "2017-12-01";
/// API version for network resources.
pub const NETWORK_API_VERSION: &str = "2021-02-01";
/// Cloud name of Azure Stack.
pub const AZURE_STACK_CLOUD_NAME: &str = "AZURESTACKCLOUD";

/// Default secret holding the cloud config.
pub const DEFAULT_SECRET_NAME: &str = "azure-cloud-provider";
/// Default namespace of the cloud config secret.
pub const DEFAULT_SECRET_NAMESPACE: &str = "kube-system";
/// Default secret key holding the cloud config document.
pub const DEFAULT_CLOUD_CONFIG_KEY: &str = "cloud-config";

/// VM type for standalone virtual machines.
pub const VM_TYPE_STANDARD: &str = "standard";
/// VM type for uniform scale sets.
pub const VM_TYPE_VMSS: &str = "vmss";
/// VM type for flexible scale sets.
pub const VM_TYPE_VMSS_FLEX: &str = "vmssflex";

/// Azure cloud environment and its endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudEnvironment {
    /// Canonical environment name.
    pub name: &'static str,
    /// Resource Manager endpoint, trailing slash included.
    pub resource_manager_endpoint: String,
    /// Active Directory authority, trailing slash included.
    pub active_directory_endpoint: String,
}

impl CloudEnvironment {
    /// Azure public cloud.
    pub fn public() -> Self {
        Self::known(
            "AzurePublicCloud",
            "https://management.azure.com/",
            "https://login.microsoftonline.com/",
        )
    }

    fn known(name: &'static str, resource_manager: &str, active_directory: &str) -> Self {
        Self {
            name,
            resource_manager_endpoint: resource_manager.to_string(),
            active_directory_endpoint: active_directory.to_string(),
        }
    }

    /// Look up an environment by its config name, case-insensitive.
    ///
    /// An empty name selects the public cloud.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "" | "AZUREPUBLICCLOUD" => Some(Self::public()),
            "AZURECHINACLOUD" => Some(Self::known(
                "AzureChinaCloud",
                "https://management.chinacloudapi.cn/",
                "https://login.chinacloudapi.cn/",
            )),
            "AZUREUSGOVERNMENTCLOUD" => Some(Self::known(
                "AzureUSGovernmentCloud",
                "https://management.usgovcloudapi.net/",
                "https://login.microsoftonline.us/",
            )),
            "AZUREGERMANCLOUD" => Some(Self::known(
                "AzureGermanCloud",
                "https://management.microsoftazure.de/",
                "https://login.microsoftonline.de/",
            )),
            _ => None,
        }
    }
}

/// Where the cloud config secret lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitSecretConfig {
    pub secret_name: String,
    pub secret_namespace: String,
    pub cloud_config_key: String,
}

impl Default for InitSecretConfig {
    fn default() -> Self {
        Self {
            secret_name: DEFAULT_SECRET_NAME.to_string(),
            secret_namespace: DEFAULT_SECRET_NAMESPACE.to_string(),
            cloud_config_key: DEFAULT_CLOUD_CONFIG_KEY.to_string(),
        }
    }
}

impl InitSecretConfig {
    /// Secret coordinates, falling back to defaults for empty values.
    pub fn new(secret_name: &str, secret_namespace: &str) -> Self {
        let defaults = Self::default();
        Self {
            secret_name: non_empty_or(secret_name, defaults.secret_name),
            secret_namespace: non_empty_or(secret_namespace, defaults.secret_namespace),
            cloud_config_key: defaults.cloud_config_key,
        }
    }
}

fn non_empty_or(value: &str, default: String) -> String {
    if value.is_empty() {
        default
    } else {
        value.to_string()
    }
}

/// Credentials used to obtain Resource Manager tokens.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialsSource {
    /// Service principal with client secret.
    ServicePrincipal {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    /// Managed identity through the instance metadata service.
    ManagedIdentity {
        /// User-assigned identity, system-assigned when `None`.
        client_id: Option<String>,
    },
}

impl fmt::Debug for CredentialsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServicePrincipal {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ServicePrincipal")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
            Self::ManagedIdentity { client_id } => f
                .debug_struct("ManagedIdentity")
                .field("client_id", client_id)
                .finish(),
        }
    }
}

/// Azure cloud configuration (`azure.json`).
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CloudConfig {
    /// Cloud environment name, public cloud when empty.
    pub cloud: String,
    pub tenant_id: String,
    pub subscription_id: String,
    pub aad_client_id: String,
    pub aad_client_secret: String,
    pub resource_group: String,
    pub location: String,
    pub vnet_name: String,
    /// Resource group of the virtual network when it differs from `resource_group`.
    pub vnet_resource_group: String,
    pub subnet_name: String,
    pub security_group_name: String,
    pub route_table_name: String,
    /// `standard`, `vmss` or `vmssflex`.
    pub vm_type: String,
    pub use_managed_identity_extension: bool,
    #[serde(rename = "userAssignedIdentityID")]
    pub user_assigned_identity_id: String,
    pub use_instance_metadata: bool,
    /// Resource Manager endpoint override, required on Azure Stack.
    pub resource_manager_endpoint: String,
    /// Active Directory endpoint override.
    pub active_directory_endpoint: String,
    pub user_agent: String,
}

impl fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudConfig")
            .field("cloud", &self.cloud)
            .field("tenant_id", &self.tenant_id)
            .field("subscription_id", &self.subscription_id)
            .field("aad_client_id", &self.aad_client_id)
            .field(
                "aad_client_secret",
                &if self.aad_client_secret.is_empty() { "" } else { "<redacted>" },
            )
            .field("resource_group", &self.resource_group)
            .field("location", &self.location)
            .field("vnet_name", &self.vnet_name)
            .field("vnet_resource_group", &self.vnet_resource_group)
            .field("subnet_name", &self.subnet_name)
            .field("vm_type", &self.vm_type)
            .field("use_managed_identity_extension", &self.use_managed_identity_extension)
            .field("use_instance_metadata", &self.use_instance_metadata)
            .finish_non_exhaustive()
    }
}

impl CloudConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder.
    pub fn builder() -> CloudConfigBuilder {
        CloudConfigBuilder::new()
    }

    /// Whether the identity fields needed to address resources are present.
    pub fn has_identity(&self) -> bool {
        !self.tenant_id.is_empty() && !self.subscription_id.is_empty() && !self.resource_group.is_empty()
    }

    /// Resource group of the virtual network.
    pub fn vnet_resource_group(&self) -> &str {
        if self.vnet_resource_group.is_empty() {
            &self.resource_group
        } else {
            &self.vnet_resource_group
        }
    }

    /// Whether this config targets Azure Stack.
    pub fn is_azure_stack(&self) -> bool {
        self.cloud.eq_ignore_ascii_case(AZURE_STACK_CLOUD_NAME)
    }

    /// Compute API version for the configured cloud.
    pub fn compute_api_version(&self) -> &'static str {
        if self.is_azure_stack() {
            AZURE_STACK_COMPUTE_API_VERSION
        } else {
            COMPUTE_API_VERSION
        }
    }

    /// Resolve the environment, applying endpoint overrides.
    pub fn environment(&self) -> crate::Result<CloudEnvironment> {
        let mut env = if self.is_azure_stack() {
            if self.resource_manager_endpoint.is_empty() {
                return Err(crate::AzureError::Config(
                    "resourceManagerEndpoint is required for Azure Stack".to_string(),
                ));
            }
            CloudEnvironment {
                name: "AzureStackCloud",
                resource_manager_endpoint: String::new(),
                active_directory_endpoint: CloudEnvironment::public().active_directory_endpoint,
            }
        } else {
            CloudEnvironment::from_name(&self.cloud).ok_or_else(|| {
                crate::AzureError::Config(format!("unknown cloud environment '{}'", self.cloud))
            })?
        };

        if !self.resource_manager_endpoint.is_empty() {
            env.resource_manager_endpoint = with_trailing_slash(&self.resource_manager_endpoint);
        }
        if !self.active_directory_endpoint.is_empty() {
            env.active_directory_endpoint = with_trailing_slash(&self.active_directory_endpoint);
        }
        Ok(env)
    }

    /// Credentials to use for Resource Manager calls.
    pub fn credentials(&self) -> crate::Result<CredentialsSource> {
        if self.use_managed_identity_extension {
            let client_id = Some(self.user_assigned_identity_id.clone()).filter(|id| !id.is_empty());
            return Ok(CredentialsSource::ManagedIdentity { client_id });
        }
        if !self.aad_client_id.is_empty() && !self.aad_client_secret.is_empty() {
            return Ok(CredentialsSource::ServicePrincipal {
                tenant_id: self.tenant_id.clone(),
                client_id: self.aad_client_id.clone(),
                client_secret: self.aad_client_secret.clone(),
            });
        }
        Err(crate::AzureError::Auth(
            "no credentials provided for Azure cloud provider".to_string(),
        ))
    }
}

fn with_trailing_slash(endpoint: &str) -> String {
    if endpoint.ends_with('/') {
        endpoint.to_string()
    } else {
        format!("{}/", endpoint)
    }
}

impl Validate for CloudConfig {
    fn validate(&self) -> azfile_config::Result<()> {
        ConfigValidator::not_empty(&self.tenant_id, "tenantId")?;
        ConfigValidator::not_empty(&self.subscription_id, "subscriptionId")?;
        ConfigValidator::not_empty(&self.resource_group, "resourceGroup")?;
        if !self.vm_type.is_empty() {
            ConfigValidator::one_of(
                &self.vm_type.to_lowercase().as_str(),
                &[VM_TYPE_STANDARD, VM_TYPE_VMSS, VM_TYPE_VMSS_FLEX],
                "vmType",
            )?;
        }
        ConfigValidator::is_url(&self.resource_manager_endpoint, "resourceManagerEndpoint")?;
        ConfigValidator::is_url(&self.active_directory_endpoint, "activeDirectoryEndpoint")?;
        Ok(())
    }
}

/// Builder for cloud configuration.
#[derive(Debug, Clone, Default)]
pub struct CloudConfigBuilder {
    config: CloudConfig,
}

impl CloudConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cloud environment name.
    pub fn cloud(mut self, cloud: impl Into<String>) -> Self {
        self.config.cloud = cloud.into();
        self
    }

    /// Set tenant and subscription.
    pub fn identity(mut self, tenant_id: impl Into<String>, subscription_id: impl Into<String>) -> Self {
        self.config.tenant_id = tenant_id.into();
        self.config.subscription_id = subscription_id.into();
        self
    }

    /// Set the resource group and location.
    pub fn resource_group(mut self, resource_group: impl Into<String>, location: impl Into<String>) -> Self {
        self.config.resource_group = resource_group.into();
        self.config.location = location.into();
        self
    }

    /// Set the node network.
    pub fn network(
        mut self,
        vnet_resource_group: impl Into<String>,
        vnet_name: impl Into<String>,
        subnet_name: impl Into<String>,
    ) -> Self {
        self.config.vnet_resource_group = vnet_resource_group.into();
        self.config.vnet_name = vnet_name.into();
        self.config.subnet_name = subnet_name.into();
        self
    }

    /// Use service principal credentials.
    pub fn service_principal(mut self, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        self.config.aad_client_id = client_id.into();
        self.config.aad_client_secret = client_secret.into();
        self.config.use_managed_identity_extension = false;
        self
    }

    /// Use managed identity, optionally user-assigned.
    pub fn managed_identity(mut self, client_id: Option<String>) -> Self {
        self.config.use_managed_identity_extension = true;
        self.config.user_assigned_identity_id = client_id.unwrap_or_default();
        self
    }

    /// Set the VM type.
    pub fn vm_type(mut self, vm_type: impl Into<String>) -> Self {
        self.config.vm_type = vm_type.into();
        self
    }

    /// Enable instance metadata lookups.
    pub fn use_instance_metadata(mut self, enabled: bool) -> Self {
        self.config.use_instance_metadata = enabled;
        self
    }

    /// Override the Resource Manager endpoint.
    pub fn resource_manager_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.resource_manager_endpoint = endpoint.into();
        self
    }

    /// Override the Active Directory endpoint.
    pub fn active_directory_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.active_directory_endpoint = endpoint.into();
        self
    }

    /// Build the configuration.
    pub fn build(self) -> CloudConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azfile_config::{ConfigLoader, FileFormat};

    const AZURE_JSON: &str = r#"{
        "cloud": "AzurePublicCloud",
        "tenantId": "tenant",
        "subscriptionId": "subscription",
        "aadClientId": "client",
        "aadClientSecret": "secret",
        "resourceGroup": "rg",
        "location": "westus2",
        "vmType": "vmss",
        "subnetName": "aks-subnet",
        "securityGroupName": "aks-nsg",
        "vnetName": "aks-vnet",
        "vnetResourceGroup": "",
        "routeTableName": "aks-rt",
        "userAssignedIdentityID": "",
        "useInstanceMetadata": true,
        "loadBalancerSku": "Standard",
        "maximumLoadBalancerRuleCount": 250
    }"#;

    #[test]
    fn test_parse_azure_json() {
        let config: CloudConfig = ConfigLoader::new(FileFormat::Json).parse_as(AZURE_JSON).unwrap();
        assert_eq!(config.tenant_id, "tenant");
        assert_eq!(config.vnet_name, "aks-vnet");
        assert!(config.use_instance_metadata);
        assert!(config.has_identity());
        assert!(config.validate().is_ok());
        assert_eq!(config.vnet_resource_group(), "rg");
    }

    #[test]
    fn test_vnet_resource_group_override() {
        let config = CloudConfig::builder()
            .resource_group("rg", "eastus")
            .network("network-rg", "vnet", "subnet")
            .build();
        assert_eq!(config.vnet_resource_group(), "network-rg");
    }

    #[test]
    fn test_credentials_selection() {
        let sp = CloudConfig::builder()
            .identity("t", "s")
            .service_principal("id", "secret")
            .build();
        assert!(matches!(sp.credentials().unwrap(), CredentialsSource::ServicePrincipal { .. }));

        let msi = CloudConfig::builder()
            .identity("t", "s")
            .managed_identity(Some("uami".to_string()))
            .build();
        assert_eq!(
            msi.credentials().unwrap(),
            CredentialsSource::ManagedIdentity {
                client_id: Some("uami".to_string())
            }
        );

        assert!(CloudConfig::new().credentials().is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = CloudConfig::builder().service_principal("id", "hunter2").build();
        let rendered = format!("{:?} {:?}", config, config.credentials().unwrap());
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_environment_resolution() {
        let config = CloudConfig::builder().cloud("azurechinacloud").build();
        assert_eq!(
            config.environment().unwrap().resource_manager_endpoint,
            "https://management.chinacloudapi.cn/"
        );

        let unknown = CloudConfig::builder().cloud("MarsCloud").build();
        assert!(unknown.environment().is_err());

        let stack = CloudConfig::builder().cloud("AzureStackCloud").build();
        assert!(stack.environment().is_err());
        assert_eq!(stack.compute_api_version(), AZURE_STACK_COMPUTE_API_VERSION);

        let stack = CloudConfig::builder()
            .cloud("AzureStackCloud")
            .resource_manager_endpoint("https://management.local.azurestack.external")
            .build();
        assert_eq!(
            stack.environment().unwrap().resource_manager_endpoint,
            "https://management.local.azurestack.external/"
        );
    }

    #[test]
    fn test_validation_rejects_unknown_vm_type() {
        let config = CloudConfig::builder()
            .identity("t", "s")
            .resource_group("rg", "eastus")
            .vm_type("vmas")
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_init_secret_defaults() {
        let secret = InitSecretConfig::new("", "");
        assert_eq!(secret, InitSecretConfig::default());
        let secret = InitSecretConfig::new("custom", "storage");
        assert_eq!(secret.secret_name, "custom");
        assert_eq!(secret.secret_namespace, "storage");
        assert_eq!(secret.cloud_config_key, DEFAULT_CLOUD_CONFIG_KEY);
    }
}
