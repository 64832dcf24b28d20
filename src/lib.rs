//! # azfile
//!
//! Cloud-facing bootstrap of the Azure file storage driver.
//!
//! - [`get_cloud_provider`] loads the cloud config from the cluster secret or
//!   a credentials file and builds the Azure clients. Missing configuration is
//!   logged, never fatal.
//! - [`Driver::update_subnet_service_endpoints`] makes sure the driver's
//!   subnet carries the `Microsoft.Storage` service endpoint. Calls for the
//!   same subnet are serialized through a named lock.
//!
//! ```rust,ignore
//! use azfile::{CloudProviderOptions, Driver, DriverOptions};
//!
//! let driver = Driver::bootstrap(DriverOptions::default(), &CloudProviderOptions::default()).await?;
//! driver.update_subnet_service_endpoints().await?;
//! ```

pub mod cloud_provider;
pub mod driver;
pub mod error;
pub mod kube_utils;

pub use cloud_provider::{
    CREDENTIAL_FILE_ENV, CloudProviderOptions, DEFAULT_CRED_FILE_PATH_LINUX,
    DEFAULT_CRED_FILE_PATH_WINDOWS, bootstrap_cloud, credential_file_path, get_cloud_provider,
    load_cloud_from_file,
};
pub use driver::{DEFAULT_DRIVER_NAME, Driver, DriverOptions};
pub use error::{DriverError, Result};
pub use kube_utils::{KubeSecretSource, create_kube_client};

pub use azfile_azure as azure;
