//! Driver error types.

use azfile_azure::{AzureError, RetryError};
use thiserror::Error;

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;

/// Driver errors.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Azure configuration or client error.
    #[error(transparent)]
    Azure(#[from] AzureError),

    /// Remote call failed, with what the driver was doing.
    #[error("{context}: {source}")]
    Remote {
        context: String,
        #[source]
        source: RetryError,
    },

    /// Kubernetes client could not be created.
    #[error("failed to create kubernetes client: {0}")]
    Kube(String),
}

impl DriverError {
    /// Wrap a remote failure with context.
    pub fn remote(context: impl Into<String>, source: RetryError) -> Self {
        Self::Remote {
            context: context.into(),
            source,
        }
    }

    /// The underlying remote error, if this is one.
    pub fn retry_error(&self) -> Option<&RetryError> {
        match self {
            Self::Remote { source, .. } => Some(source),
            Self::Azure(AzureError::Remote(source)) => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display() {
        let err = DriverError::remote(
            "failed to get the subnet s under vnet v",
            RetryError::from_status(404, None, "NotFound: gone"),
        );
        assert!(err.to_string().starts_with("failed to get the subnet s under vnet v: "));
        assert!(err.to_string().contains("NotFound: gone"));
        assert_eq!(err.retry_error().and_then(|e| e.http_status_code), Some(404));
    }

    #[test]
    fn test_azure_error_is_transparent() {
        let err = DriverError::from(AzureError::not_configured("SubnetsClient"));
        assert_eq!(err.to_string(), "SubnetsClient is not configured");
        assert!(err.retry_error().is_none());
    }
}
