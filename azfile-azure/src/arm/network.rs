//! Network clients over Resource Manager.

use async_trait::async_trait;
use tracing::debug;

use super::ArmClient;
use crate::RetryError;
use crate::clients::SubnetsClient;
use crate::config::NETWORK_API_VERSION;
use crate::models::Subnet;

/// Subnets client.
#[derive(Clone)]
pub struct ArmSubnetsClient {
    arm: ArmClient,
}

impl ArmSubnetsClient {
    pub fn new(arm: ArmClient) -> Self {
        Self { arm }
    }

    fn subnet_id(&self, resource_group: &str, virtual_network_name: &str, subnet_name: &str) -> String {
        self.arm.resource_id(
            resource_group,
            &format!(
                "Microsoft.Network/virtualNetworks/{}/subnets/{}",
                virtual_network_name, subnet_name
            ),
        )
    }
}

#[async_trait]
impl SubnetsClient for ArmSubnetsClient {
    async fn get(
        &self,
        resource_group: &str,
        virtual_network_name: &str,
        subnet_name: &str,
        expand: &str,
    ) -> Result<Subnet, RetryError> {
        let expand = Some(expand).filter(|e| !e.is_empty());
        self.arm
            .get_resource(
                &self.subnet_id(resource_group, virtual_network_name, subnet_name),
                NETWORK_API_VERSION,
                expand,
            )
            .await
    }

    async fn create_or_update(
        &self,
        resource_group: &str,
        virtual_network_name: &str,
        subnet_name: &str,
        subnet: &Subnet,
    ) -> Result<(), RetryError> {
        debug!(resource_group, vnet = virtual_network_name, subnet = subnet_name, "writing subnet");
        let future = self
            .arm
            .put_resource(
                &self.subnet_id(resource_group, virtual_network_name, subnet_name),
                NETWORK_API_VERSION,
                subnet,
            )
            .await?;
        self.arm.wait_for_async_operation(&future).await
    }
}
