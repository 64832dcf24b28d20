//! Azure file driver and subnet reconciliation.

use azfile_azure::{Cloud, STORAGE_SERVICE, ServiceEndpoint};
use azfile_distributed::{KeyedLock, LockMap};
use tracing::{debug, info};

use crate::cloud_provider::{CloudProviderOptions, get_cloud_provider};
use crate::error::{DriverError, Result};

/// Default driver name.
pub const DEFAULT_DRIVER_NAME: &str = "file.csi.azure.com";

/// Driver identity.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub name: String,
    /// Node name, empty for the controller.
    pub node_id: String,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_DRIVER_NAME.to_string(),
            node_id: String::new(),
        }
    }
}

/// Azure file driver state shared by all requests.
pub struct Driver {
    name: String,
    node_id: String,
    cloud: Cloud,
    subnet_lock_map: LockMap,
}

impl Driver {
    /// Create a driver over an already bootstrapped cloud.
    pub fn new(options: DriverOptions, cloud: Cloud) -> Self {
        Self {
            name: options.name,
            node_id: options.node_id,
            cloud,
            subnet_lock_map: LockMap::new(),
        }
    }

    /// Bootstrap the cloud provider and create the driver.
    pub async fn bootstrap(options: DriverOptions, cloud_options: &CloudProviderOptions) -> Result<Self> {
        let cloud = get_cloud_provider(cloud_options).await?;
        info!(driver = %options.name, node = %options.node_id, "driver initialized");
        Ok(Self::new(options, cloud))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn cloud(&self) -> &Cloud {
        &self.cloud
    }

    /// Make sure the driver's subnet has the storage service endpoint.
    pub async fn update_subnet_service_endpoints(&self) -> Result<()> {
        let config = self.cloud.config();
        self.ensure_subnet_service_endpoint(
            self.cloud.vnet_resource_group(),
            &config.vnet_name,
            &config.subnet_name,
            STORAGE_SERVICE,
            &config.location,
        )
        .await
        .map(|_| ())
    }

    /// Add a `service` endpoint for `location` to a subnet unless an endpoint
    /// for that service already exists.
    ///
    /// Calls for the same subnet are serialized. Returns whether the subnet
    /// was written.
    pub async fn ensure_subnet_service_endpoint(
        &self,
        resource_group: &str,
        vnet_name: &str,
        subnet_name: &str,
        service: &str,
        location: &str,
    ) -> Result<bool> {
        let client = self.cloud.subnets_client()?;

        let lock_key = format!("{}{}{}", resource_group, vnet_name, subnet_name);
        let _guard = self.subnet_lock_map.lock_entry(&lock_key).await;

        let mut subnet = client
            .get(resource_group, vnet_name, subnet_name, "")
            .await
            .map_err(|e| {
                DriverError::remote(
                    format!("failed to get the subnet {} under vnet {}", subnet_name, vnet_name),
                    e,
                )
            })?;

        if subnet.has_service_endpoint(service) {
            debug!(subnet = subnet_name, vnet = vnet_name, service, "service endpoint already present");
            return Ok(false);
        }

        subnet
            .service_endpoints_mut()
            .push(ServiceEndpoint::new(service, location));

        info!(
            subnet = subnet_name,
            vnet = vnet_name,
            resource_group,
            service,
            location,
            "adding service endpoint to subnet"
        );
        client
            .create_or_update(resource_group, vnet_name, subnet_name, &subnet)
            .await
            .map_err(|e| {
                DriverError::remote(
                    format!("failed to update the subnet {} under vnet {}", subnet_name, vnet_name),
                    e,
                )
            })?;

        Ok(true)
    }
}
