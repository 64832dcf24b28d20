//! # azfile Azure
//!
//! Azure compute and network clients, cloud configuration and credentials for
//! the azfile driver.
//!
//! ## Clients
//!
//! [`VirtualMachinesClient`], [`VmssVmClient`] and [`SubnetsClient`] are
//! object-safe traits. The `arm` feature (on by default) provides REST
//! implementations over Azure Resource Manager; tests substitute in-memory
//! versions. Every call fails with a [`RetryError`] that tells the caller
//! whether retrying makes sense.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use azfile_azure::{Cloud, CloudConfig};
//!
//! let config = CloudConfig::builder()
//!     .identity("tenant", "subscription")
//!     .resource_group("rg", "westus2")
//!     .network("", "vnet", "subnet")
//!     .managed_identity(None)
//!     .build();
//!
//! let cloud = Cloud::new(config, "azfile")?;
//! let subnet = cloud
//!     .subnets_client()?
//!     .get(cloud.vnet_resource_group(), "vnet", "subnet", "")
//!     .await?;
//! ```
//!
//! ## Features
//!
//! - `arm`: Resource Manager REST clients (`reqwest`), authenticated through
//!   `azure_identity` credentials.

#[cfg(feature = "arm")]
pub mod arm;
pub mod clients;
mod cloud;
mod config;
mod error;
pub mod models;
mod retry;
mod secret;

pub use clients::{SubnetsClient, VirtualMachinesClient, VmssVmClient};
pub use cloud::{Cloud, CloudBuilder};
pub use config::{
    AZURE_STACK_CLOUD_NAME, AZURE_STACK_COMPUTE_API_VERSION, COMPUTE_API_VERSION,
    CloudConfig, CloudConfigBuilder, CloudEnvironment, CredentialsSource, DEFAULT_CLOUD_CONFIG_KEY,
    DEFAULT_SECRET_NAME, DEFAULT_SECRET_NAMESPACE, InitSecretConfig, NETWORK_API_VERSION,
    VM_TYPE_STANDARD, VM_TYPE_VMSS, VM_TYPE_VMSS_FLEX,
};
pub use error::{AzureError, Result};
pub use models::{
    InstanceViewTypes, STORAGE_SERVICE, ServiceEndpoint, Subnet, SubnetProperties, UpdateFuture,
    VirtualMachine, VirtualMachineScaleSetVm, VirtualMachineUpdate,
};
pub use retry::{RETRIABLE_STATUS_CODES, RetryError, STATUS_TOO_MANY_REQUESTS, parse_retry_after};
pub use secret::SecretSource;

#[cfg(feature = "arm")]
pub use azure_identity;
