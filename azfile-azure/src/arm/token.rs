//! Bearer tokens for Resource Manager.

use async_trait::async_trait;
use azure_core::auth::TokenCredential;
use azure_identity::{
    ClientSecretCredential, ImdsId, TokenCredentialOptions, VirtualMachineManagedIdentityCredential,
};
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::config::{CloudEnvironment, CredentialsSource};
use crate::{AzureError, Result};

/// Source of bearer tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// A token valid for the Resource Manager audience.
    async fn token(&self) -> Result<String>;
}

/// Fixed, pre-issued token.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

/// Token from an Azure SDK credential, scoped to a Resource Manager endpoint.
///
/// Caching and refresh are left to the credential.
pub struct CredentialToken {
    credential: Arc<dyn TokenCredential>,
    scope: String,
}

impl CredentialToken {
    /// `resource` is the Resource Manager endpoint the token is issued for.
    pub fn new(credential: Arc<dyn TokenCredential>, resource: &str) -> Self {
        Self {
            credential,
            scope: resource_scope(resource),
        }
    }

    /// Token for `source` against the endpoints of `env`.
    pub fn from_source(source: &CredentialsSource, env: &CloudEnvironment) -> Result<Self> {
        let credential = build_credential(source, env)?;
        Ok(Self::new(credential, &env.resource_manager_endpoint))
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}

#[async_trait]
impl TokenProvider for CredentialToken {
    async fn token(&self) -> Result<String> {
        let token = self
            .credential
            .get_token(&[self.scope.as_str()])
            .await
            .map_err(|e| AzureError::Auth(format!("failed to acquire token for {}: {}", self.scope, e)))?;
        Ok(token.token.secret().to_string())
    }
}

fn resource_scope(resource: &str) -> String {
    format!("{}/.default", resource.trim_end_matches('/'))
}

/// Build the SDK credential for a credentials source.
pub fn build_credential(
    source: &CredentialsSource,
    env: &CloudEnvironment,
) -> Result<Arc<dyn TokenCredential>> {
    match source {
        CredentialsSource::ServicePrincipal {
            tenant_id,
            client_id,
            client_secret,
        } => {
            let authority = Url::parse(&env.active_directory_endpoint).map_err(|e| {
                AzureError::Config(format!(
                    "invalid active directory endpoint '{}': {}",
                    env.active_directory_endpoint, e
                ))
            })?;
            debug!(client_id = %client_id, authority = %authority, "using service principal credential");
            Ok(Arc::new(ClientSecretCredential::new(
                azure_core::new_http_client(),
                authority,
                tenant_id.clone(),
                client_id.clone(),
                client_secret.clone(),
            )))
        }
        CredentialsSource::ManagedIdentity { client_id } => {
            debug!(client_id = ?client_id, "using managed identity credential");
            let id = match client_id {
                Some(id) => ImdsId::ClientId(id.clone()),
                None => ImdsId::SystemAssigned,
            };
            Ok(Arc::new(VirtualMachineManagedIdentityCredential::new(
                id,
                TokenCredentialOptions::default(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_principal() -> CredentialsSource {
        CredentialsSource::ServicePrincipal {
            tenant_id: "tenant".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
        }
    }

    #[test]
    fn test_resource_scope() {
        assert_eq!(
            resource_scope("https://management.azure.com/"),
            "https://management.azure.com/.default"
        );
        assert_eq!(
            resource_scope("https://management.chinacloudapi.cn"),
            "https://management.chinacloudapi.cn/.default"
        );
    }

    #[test]
    fn test_credential_token_from_source() {
        let env = CloudEnvironment::public();

        let sp = CredentialToken::from_source(&service_principal(), &env).unwrap();
        assert_eq!(sp.scope(), "https://management.azure.com/.default");

        let msi = CredentialToken::from_source(
            &CredentialsSource::ManagedIdentity {
                client_id: Some("uami".to_string()),
            },
            &env,
        )
        .unwrap();
        assert_eq!(msi.scope(), sp.scope());

        let system = CredentialsSource::ManagedIdentity { client_id: None };
        assert!(build_credential(&system, &env).is_ok());
    }

    #[test]
    fn test_invalid_authority_is_rejected() {
        let mut env = CloudEnvironment::public();
        env.active_directory_endpoint = "not a url".to_string();

        let err = build_credential(&service_principal(), &env).err().unwrap();
        assert!(matches!(err, AzureError::Config(ref m) if m.contains("not a url")));
    }

    #[tokio::test]
    async fn test_static_token() {
        assert_eq!(StaticToken::new("t").token().await.unwrap(), "t");
    }
}
