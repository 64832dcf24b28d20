//! Azure Resource Manager REST transport.
//!
//! [`ArmClient`] signs requests with a bearer token, classifies failures into
//! [`RetryError`] and follows long-running operations. The compute and network
//! clients build resource paths on top of it.

mod compute;
mod network;
mod token;

pub use compute::{ArmVirtualMachinesClient, ArmVmssVmClient};
pub use network::ArmSubnetsClient;
pub use token::{CredentialToken, StaticToken, TokenProvider, build_credential};

use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::models::UpdateFuture;
use crate::retry::parse_retry_after;
use crate::{AzureError, RetryError};

const AZURE_ASYNC_OPERATION: &str = "azure-asyncoperation";

/// Transport settings.
#[derive(Debug, Clone)]
pub struct ArmClientConfig {
    /// Resource Manager endpoint.
    pub endpoint: String,
    /// Subscription every resource path is scoped to.
    pub subscription_id: String,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Delay between polls of a long-running operation when the service
    /// gives no `Retry-After`.
    pub poll_interval: Duration,
    /// Give up waiting on a long-running operation after this long.
    pub operation_timeout: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl ArmClientConfig {
    pub fn new(endpoint: impl Into<String>, subscription_id: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            subscription_id: subscription_id.into(),
            user_agent: concat!("azfile/", env!("CARGO_PKG_VERSION")).to_string(),
            poll_interval: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(15 * 60),
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

/// Authenticated Resource Manager client.
#[derive(Clone)]
pub struct ArmClient {
    http: reqwest::Client,
    base_url: String,
    subscription_id: String,
    token: Arc<dyn TokenProvider>,
    poll_interval: Duration,
    operation_timeout: Duration,
}

impl ArmClient {
    /// Create a client for one subscription.
    pub fn new(config: ArmClientConfig, token: Arc<dyn TokenProvider>) -> crate::Result<Self> {
        let endpoint = url::Url::parse(&config.endpoint)
            .map_err(|e| AzureError::Config(format!("invalid endpoint {}: {}", config.endpoint, e)))?;

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AzureError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: endpoint.as_str().trim_end_matches('/').to_string(),
            subscription_id: config.subscription_id,
            token,
            poll_interval: config.poll_interval,
            operation_timeout: config.operation_timeout,
        })
    }

    /// Subscription this client is scoped to.
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Full id of a resource in a resource group.
    pub fn resource_id(&self, resource_group: &str, provider_path: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}",
            self.subscription_id, resource_group, provider_path
        )
    }

    fn url(&self, resource_id: &str) -> String {
        format!("{}{}", self.base_url, resource_id)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<reqwest::Response, RetryError> {
        let token = self
            .token
            .token()
            .await
            .map_err(|e| RetryError::terminal(e.to_string()))?;

        let mut request = self.http.request(method.clone(), url).bearer_auth(token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        trace!(method = %method, url = %url, "sending request");
        let response = request.send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    /// GET a resource.
    pub async fn get_resource<T: DeserializeOwned>(
        &self,
        resource_id: &str,
        api_version: &str,
        expand: Option<&str>,
    ) -> Result<T, RetryError> {
        let mut query = vec![("api-version", api_version)];
        if let Some(expand) = expand {
            query.push(("$expand", expand));
        }
        let response = self.send(Method::GET, &self.url(resource_id), &query, None).await?;
        Ok(response.json::<T>().await?)
    }

    /// GET a collection, following `nextLink` pages.
    pub async fn list_resources<T: DeserializeOwned>(
        &self,
        resource_id: &str,
        api_version: &str,
        expand: Option<&str>,
    ) -> Result<Vec<T>, RetryError> {
        let mut query = vec![("api-version", api_version)];
        if let Some(expand) = expand {
            query.push(("$expand", expand));
        }

        let mut items = Vec::new();
        let mut page: ListPage<T> = self
            .send(Method::GET, &self.url(resource_id), &query, None)
            .await?
            .json()
            .await?;

        loop {
            items.append(&mut page.value);
            match page.next_link.take().filter(|link| !link.is_empty()) {
                Some(next) => {
                    page = self.send(Method::GET, &next, &[], None).await?.json().await?;
                }
                None => break,
            }
        }

        Ok(items)
    }

    /// PUT a resource, returning the operation to wait on.
    pub async fn put_resource<T: Serialize>(
        &self,
        resource_id: &str,
        api_version: &str,
        body: &T,
    ) -> Result<UpdateFuture, RetryError> {
        self.mutate(Method::PUT, resource_id, api_version, Some(serde_json::to_value(body)?))
            .await
    }

    /// PATCH a resource, returning the operation to wait on.
    pub async fn patch_resource<T: Serialize>(
        &self,
        resource_id: &str,
        api_version: &str,
        body: &T,
    ) -> Result<UpdateFuture, RetryError> {
        self.mutate(Method::PATCH, resource_id, api_version, Some(serde_json::to_value(body)?))
            .await
    }

    /// DELETE a resource, returning the operation to wait on.
    ///
    /// A resource that is already gone counts as deleted.
    pub async fn delete_resource(
        &self,
        resource_id: &str,
        api_version: &str,
    ) -> Result<UpdateFuture, RetryError> {
        match self.mutate(Method::DELETE, resource_id, api_version, None).await {
            Err(err) if err.is_not_found() => Ok(UpdateFuture::completed(
                Method::DELETE.as_str(),
                self.url(resource_id),
                StatusCode::NOT_FOUND.as_u16(),
            )),
            other => other,
        }
    }

    async fn mutate(
        &self,
        method: Method,
        resource_id: &str,
        api_version: &str,
        body: Option<Value>,
    ) -> Result<UpdateFuture, RetryError> {
        let url = self.url(resource_id);
        let response = self
            .send(method.clone(), &url, &[("api-version", api_version)], body)
            .await?;

        let status = response.status();
        let polling_url = match status {
            StatusCode::CREATED | StatusCode::ACCEPTED => polling_url(response.headers()),
            _ => None,
        };

        Ok(UpdateFuture {
            method: method.as_str().to_string(),
            resource_url: url,
            polling_url,
            status: status.as_u16(),
        })
    }

    /// Block until a long-running operation reaches a terminal state.
    pub async fn wait_for_async_operation(&self, future: &UpdateFuture) -> Result<(), RetryError> {
        let Some(polling_url) = future.polling_url.as_deref() else {
            return Ok(());
        };

        let started = tokio::time::Instant::now();
        let mut delay = self.poll_interval;

        loop {
            tokio::time::sleep(delay).await;
            if started.elapsed() > self.operation_timeout {
                return Err(RetryError::retriable(format!(
                    "timed out after {:?} waiting for {} {}",
                    self.operation_timeout, future.method, future.resource_url
                )));
            }

            let response = self.send(Method::GET, polling_url, &[], None).await?;
            delay = retry_after(response.headers()).unwrap_or(self.poll_interval);

            if response.status() == StatusCode::ACCEPTED {
                trace!(url = %polling_url, "operation still accepted");
                continue;
            }

            let body = response.text().await?;
            match operation_status(&body) {
                OperationStatus::InProgress(status) => {
                    trace!(url = %polling_url, status = %status, "operation in progress");
                }
                OperationStatus::Succeeded => {
                    debug!(method = %future.method, url = %future.resource_url, "operation succeeded");
                    return Ok(());
                }
                OperationStatus::Failed(message) => return Err(RetryError::terminal(message)),
            }
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(default)]
    next_link: Option<String>,
}

fn polling_url(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AZURE_ASYNC_OPERATION)
        .or_else(|| headers.get(LOCATION))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after)
}

async fn error_from_response(response: reqwest::Response) -> RetryError {
    let status = response.status().as_u16();
    let delay = retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    RetryError::from_status(status, delay, error_message(status, &body))
}

/// Extract `code: message` from an ARM error body, raw body otherwise.
fn error_message(status: u16, body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));
    match error {
        Some(error) => {
            let code = error.get("code").and_then(Value::as_str).unwrap_or("Unknown");
            let message = error.get("message").and_then(Value::as_str).unwrap_or("");
            format!("{}: {}", code, message)
        }
        None if body.is_empty() => format!("HTTP status {}", status),
        None => body.to_string(),
    }
}

#[derive(Debug, PartialEq)]
enum OperationStatus {
    InProgress(String),
    Succeeded,
    Failed(String),
}

/// Interpret the body of a polling response.
///
/// `Azure-AsyncOperation` bodies carry a `status` field. `Location` polling
/// returns the final resource instead, which counts as success.
fn operation_status(body: &str) -> OperationStatus {
    let value: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let Some(status) = value.get("status").and_then(Value::as_str) else {
        return OperationStatus::Succeeded;
    };

    match status.to_lowercase().as_str() {
        "succeeded" => OperationStatus::Succeeded,
        "failed" | "canceled" | "cancelled" => {
            let detail = value
                .get("error")
                .map(|e| error_message(200, &serde_json::json!({ "error": e }).to_string()))
                .unwrap_or_else(|| format!("operation {}", status));
            OperationStatus::Failed(detail)
        }
        _ => OperationStatus::InProgress(status.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_from_arm_body() {
        let body = r#"{"error":{"code":"ResourceNotFound","message":"The Resource was not found."}}"#;
        assert_eq!(
            error_message(404, body),
            "ResourceNotFound: The Resource was not found."
        );
        assert_eq!(error_message(502, ""), "HTTP status 502");
        assert_eq!(error_message(500, "upstream reset"), "upstream reset");
    }

    #[test]
    fn test_operation_status() {
        assert_eq!(
            operation_status(r#"{"status":"InProgress"}"#),
            OperationStatus::InProgress("InProgress".to_string())
        );
        assert_eq!(operation_status(r#"{"status":"Succeeded"}"#), OperationStatus::Succeeded);
        assert_eq!(operation_status(r#"{"name":"vm"}"#), OperationStatus::Succeeded);
        assert_eq!(
            operation_status(r#"{"status":"Failed","error":{"code":"Conflict","message":"busy"}}"#),
            OperationStatus::Failed("Conflict: busy".to_string())
        );
        assert_eq!(
            operation_status(r#"{"status":"Canceled"}"#),
            OperationStatus::Failed("operation Canceled".to_string())
        );
    }

    #[test]
    fn test_resource_id() {
        let client = ArmClient::new(
            ArmClientConfig::new("https://management.azure.com/", "sub"),
            Arc::new(StaticToken::new("t")),
        )
        .unwrap();
        assert_eq!(
            client.resource_id("rg", "Microsoft.Compute/virtualMachines/vm"),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm"
        );
        assert_eq!(
            client.url("/subscriptions/sub"),
            "https://management.azure.com/subscriptions/sub"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        let result = ArmClient::new(
            ArmClientConfig::new("not a url", "sub"),
            Arc::new(StaticToken::new("t")),
        );
        assert!(matches!(result, Err(AzureError::Config(_))));
    }
}
