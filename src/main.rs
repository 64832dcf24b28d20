//! azfile - cloud bootstrap and subnet reconciliation for the Azure file driver.
//!
//! # Commands
//!
//! - `azfile show-config` - Bootstrap the cloud provider and print the loaded configuration
//! - `azfile ensure-storage-endpoint` - Add the storage service endpoint to the driver's subnet

use azfile::{CloudProviderOptions, DEFAULT_DRIVER_NAME, Driver, DriverOptions, Result};
use azfile_azure::{DEFAULT_SECRET_NAME, DEFAULT_SECRET_NAMESPACE};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

/// Azure file driver cloud tooling
#[derive(Parser)]
#[command(name = "azfile")]
#[command(version)]
#[command(about = "Cloud bootstrap and subnet reconciliation for the Azure file driver")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Absolute path to the kubeconfig file, in-cluster config when omitted
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Node name, empty when running as the controller
    #[arg(long, global = true, env = "KUBE_NODE_NAME", default_value = "")]
    nodeid: String,

    /// Name of the secret holding the cloud config
    #[arg(long, global = true, default_value = DEFAULT_SECRET_NAME)]
    cloud_config_secret_name: String,

    /// Namespace of the secret holding the cloud config
    #[arg(long, global = true, default_value = DEFAULT_SECRET_NAMESPACE)]
    cloud_config_secret_namespace: String,

    /// Credentials file used when the secret is unavailable
    #[arg(long, global = true)]
    credential_file: Option<PathBuf>,

    /// Appended to the user agent of Azure requests
    #[arg(long, global = true, default_value = "")]
    user_agent_suffix: String,

    /// Driver name
    #[arg(long, global = true, default_value = DEFAULT_DRIVER_NAME)]
    driver_name: String,

    /// Log verbosity, 0 to 5
    #[arg(short, long, global = true)]
    verbosity: Option<u8>,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap the cloud provider and print the loaded configuration
    ShowConfig,

    /// Make sure the driver's subnet has the storage service endpoint
    EnsureStorageEndpoint,
}

impl Cli {
    fn user_agent(&self) -> String {
        let base = format!("{}/{}", self.driver_name, env!("CARGO_PKG_VERSION"));
        if self.user_agent_suffix.is_empty() {
            base
        } else {
            format!("{} {}", base, self.user_agent_suffix)
        }
    }

    fn cloud_provider_options(&self) -> CloudProviderOptions {
        CloudProviderOptions {
            kubeconfig: self.kubeconfig.clone(),
            node_id: self.nodeid.clone(),
            secret_name: self.cloud_config_secret_name.clone(),
            secret_namespace: self.cloud_config_secret_namespace.clone(),
            user_agent: self.user_agent(),
            credential_file: self.credential_file.clone(),
        }
    }

    fn driver_options(&self) -> DriverOptions {
        DriverOptions {
            name: self.driver_name.clone(),
            node_id: self.nodeid.clone(),
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let driver = Driver::bootstrap(cli.driver_options(), &cli.cloud_provider_options()).await?;

    match cli.command {
        Commands::ShowConfig => {
            let cloud = driver.cloud();
            let config = cloud.config();
            println!("driver:              {}", driver.name());
            println!("user agent:          {}", cloud.user_agent());
            println!("cloud:               {}", if config.cloud.is_empty() { "AzurePublicCloud" } else { config.cloud.as_str() });
            println!("subscription:        {}", config.subscription_id);
            println!("resource group:      {}", config.resource_group);
            println!("location:            {}", config.location);
            println!("vnet resource group: {}", cloud.vnet_resource_group());
            println!("vnet:                {}", config.vnet_name);
            println!("subnet:              {}", config.subnet_name);
            println!("managed identity:    {}", config.use_managed_identity_extension);
            println!("instance metadata:   {}", config.use_instance_metadata);
            println!("configured:          {}", config.has_identity());
        }
        Commands::EnsureStorageEndpoint => {
            driver.update_subnet_service_endpoints().await?;
            println!(
                "subnet {} under vnet {} has the storage service endpoint",
                driver.cloud().config().subnet_name,
                driver.cloud().config().vnet_name
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(verbosity) = cli.verbosity {
        azfile_log::set_verbosity(verbosity);
    }
    azfile_log::init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
