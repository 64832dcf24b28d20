//! Azure error types.

use thiserror::Error;

use crate::RetryError;

/// Result type for Azure operations.
pub type Result<T> = std::result::Result<T, AzureError>;

/// Azure integration errors.
#[derive(Debug, Error)]
pub enum AzureError {
    /// Client is missing from the cloud container.
    #[error("{0} is not configured")]
    ClientNotConfigured(&'static str),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication error.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Cloud config secret could not be read.
    #[error("failed to read secret {namespace}/{name}: {message}")]
    Secret {
        namespace: String,
        name: String,
        message: String,
    },

    /// Remote call failed.
    #[error(transparent)]
    Remote(#[from] RetryError),
}

impl AzureError {
    /// Create a client not configured error.
    pub fn not_configured(client: &'static str) -> Self {
        Self::ClientNotConfigured(client)
    }

    /// Create a secret read error.
    pub fn secret(namespace: &str, name: &str, message: impl Into<String>) -> Self {
        Self::Secret {
            namespace: namespace.to_string(),
            name: name.to_string(),
            message: message.into(),
        }
    }
}

impl From<azfile_config::ConfigError> for AzureError {
    fn from(err: azfile_config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
