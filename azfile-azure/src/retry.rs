//! Structured errors returned by every cloud client call.

use std::fmt;
use std::time::Duration;

/// Status codes Azure Resource Manager expects callers to retry.
pub const RETRIABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// HTTP 429
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Failure of a remote call, classified for the caller's retry policy.
///
/// Clients never retry on their own; they only record whether a retry is
/// reasonable and how long the server asked callers to wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryError {
    /// Whether the request may succeed if repeated.
    pub retriable: bool,
    /// HTTP status of the failed response, if one was received.
    pub http_status_code: Option<u16>,
    /// Delay requested by the server through `Retry-After`.
    pub retry_after: Option<Duration>,
    /// Underlying error message.
    pub raw_error: String,
}

impl RetryError {
    /// Error that should not be retried.
    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            retriable: false,
            http_status_code: None,
            retry_after: None,
            raw_error: message.into(),
        }
    }

    /// Error that may be retried, such as a dropped connection.
    pub fn retriable(message: impl Into<String>) -> Self {
        Self {
            retriable: true,
            ..Self::terminal(message)
        }
    }

    /// Classify an unsuccessful HTTP response.
    pub fn from_status(status: u16, retry_after: Option<Duration>, message: impl Into<String>) -> Self {
        Self {
            retriable: RETRIABLE_STATUS_CODES.contains(&status),
            http_status_code: Some(status),
            retry_after,
            raw_error: message.into(),
        }
    }

    /// Set the server requested delay.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Request was rejected for exceeding the subscription's rate limits.
    pub fn is_throttled(&self) -> bool {
        self.http_status_code == Some(STATUS_TOO_MANY_REQUESTS)
    }

    /// Resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.http_status_code == Some(404)
    }

    /// Message suitable for wrapping into a terminal error.
    pub fn error(&self) -> String {
        match self.http_status_code {
            Some(status) => format!(
                "Retriable: {}, RetryAfter: {}s, HTTPStatusCode: {}, RawError: {}",
                self.retriable,
                self.retry_after.map(|d| d.as_secs()).unwrap_or(0),
                status,
                self.raw_error
            ),
            None => format!("Retriable: {}, RawError: {}", self.retriable, self.raw_error),
        }
    }
}

impl fmt::Display for RetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.error())
    }
}

impl std::error::Error for RetryError {}

/// Parse a `Retry-After` header value given in seconds.
///
/// HTTP-date values are not produced by Resource Manager and are ignored.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(feature = "arm")]
impl From<reqwest::Error> for RetryError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16(), None, err.to_string());
        }
        if err.is_timeout() || err.is_connect() || err.is_request() {
            Self::retriable(err.to_string())
        } else {
            Self::terminal(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RetryError {
    fn from(err: serde_json::Error) -> Self {
        Self::terminal(format!("failed to decode response: {}", err))
    }
}
