// In-memory subnets client

use async_trait::async_trait;
use azfile_azure::{RetryError, Subnet, SubnetsClient};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::mock::{CallRecorder, Faults};

fn subnet_key(resource_group: &str, vnet: &str, subnet: &str) -> String {
    format!("{}/{}/{}", resource_group, vnet, subnet)
}

#[derive(Default)]
struct SubnetStore {
    subnets: HashMap<String, Subnet>,
    versions: HashMap<String, u64>,
}

/// Subnets held in memory.
///
/// Each write bumps the stored etag. A write carrying an etag other than the
/// stored one is rejected with 412 and counted as a conflict, which exposes
/// interleaved read-modify-write cycles. `read_delay` stretches the window
/// between a read and the caller's following write.
#[derive(Clone, Default)]
pub struct FakeSubnetsClient {
    store: Arc<Mutex<SubnetStore>>,
    read_delay: Arc<Mutex<Option<Duration>>>,
    active_gets: Arc<AtomicUsize>,
    max_active_gets: Arc<AtomicUsize>,
    conflicts: Arc<AtomicUsize>,
    calls: CallRecorder,
    faults: Faults,
}

impl FakeSubnetsClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a subnet.
    pub fn with_subnet(self, resource_group: &str, vnet: &str, name: &str, subnet: Subnet) -> Self {
        self.insert(resource_group, vnet, name, subnet);
        self
    }

    /// Sleep this long inside every `get`, after the subnet has been read.
    pub fn with_read_delay(self, delay: Duration) -> Self {
        *self.read_delay.lock() = Some(delay);
        self
    }

    pub fn insert(&self, resource_group: &str, vnet: &str, name: &str, mut subnet: Subnet) {
        let key = subnet_key(resource_group, vnet, name);
        let mut store = self.store.lock();
        let version = store.versions.entry(key.clone()).or_insert(0);
        *version += 1;
        subnet.etag = Some(etag(*version));
        store.subnets.insert(key, subnet);
    }

    /// Stored subnet.
    pub fn subnet(&self, resource_group: &str, vnet: &str, name: &str) -> Option<Subnet> {
        self.store
            .lock()
            .subnets
            .get(&subnet_key(resource_group, vnet, name))
            .cloned()
    }

    pub fn calls(&self) -> &CallRecorder {
        &self.calls
    }

    pub fn faults(&self) -> &Faults {
        &self.faults
    }

    /// Writes rejected for carrying a stale etag.
    pub fn conflicts(&self) -> usize {
        self.conflicts.load(Ordering::SeqCst)
    }

    /// Highest number of `get` calls observed in flight at once.
    pub fn max_concurrent_gets(&self) -> usize {
        self.max_active_gets.load(Ordering::SeqCst)
    }
}

fn etag(version: u64) -> String {
    format!("W/\"{}\"", version)
}

#[async_trait]
impl SubnetsClient for FakeSubnetsClient {
    async fn get(
        &self,
        resource_group: &str,
        virtual_network_name: &str,
        subnet_name: &str,
        expand: &str,
    ) -> Result<Subnet, RetryError> {
        self.calls
            .record("get", &[resource_group, virtual_network_name, subnet_name, expand]);
        self.faults.check("get")?;

        let active = self.active_gets.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_gets.fetch_max(active, Ordering::SeqCst);

        let subnet = self
            .subnet(resource_group, virtual_network_name, subnet_name)
            .ok_or_else(|| {
                RetryError::from_status(
                    404,
                    None,
                    format!(
                        "NotFound: subnet {} under vnet {} not found",
                        subnet_name, virtual_network_name
                    ),
                )
            });

        let delay = *self.read_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.active_gets.fetch_sub(1, Ordering::SeqCst);

        subnet
    }

    async fn create_or_update(
        &self,
        resource_group: &str,
        virtual_network_name: &str,
        subnet_name: &str,
        subnet: &Subnet,
    ) -> Result<(), RetryError> {
        self.calls.record(
            "create_or_update",
            &[resource_group, virtual_network_name, subnet_name],
        );
        self.faults.check("create_or_update")?;

        let key = subnet_key(resource_group, virtual_network_name, subnet_name);
        let mut store = self.store.lock();
        let current = store.versions.get(&key).copied().unwrap_or(0);

        if let Some(sent) = &subnet.etag
            && *sent != etag(current)
        {
            self.conflicts.fetch_add(1, Ordering::SeqCst);
            return Err(RetryError::from_status(
                412,
                None,
                format!("PreconditionFailed: etag {} does not match {}", sent, etag(current)),
            ));
        }

        let mut stored = subnet.clone();
        stored.etag = Some(etag(current + 1));
        store.versions.insert(key.clone(), current + 1);
        store.subnets.insert(key, stored);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azfile_azure::ServiceEndpoint;

    #[tokio::test]
    async fn test_get_and_write() {
        let client = FakeSubnetsClient::new().with_subnet("rg", "vnet", "subnet", Subnet::default());

        let mut subnet = client.get("rg", "vnet", "subnet", "").await.unwrap();
        assert_eq!(subnet.etag.as_deref(), Some("W/\"1\""));

        subnet
            .service_endpoints_mut()
            .push(ServiceEndpoint::new("Microsoft.Storage", "westus2"));
        client.create_or_update("rg", "vnet", "subnet", &subnet).await.unwrap();

        let stored = client.subnet("rg", "vnet", "subnet").unwrap();
        assert!(stored.has_service_endpoint("Microsoft.Storage"));
        assert_eq!(stored.etag.as_deref(), Some("W/\"2\""));
        assert_eq!(client.calls().count("create_or_update"), 1);
    }

    #[tokio::test]
    async fn test_missing_subnet_is_not_found() {
        let client = FakeSubnetsClient::new();
        let err = client.get("rg", "vnet", "subnet", "").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_stale_write_conflicts() {
        let client = FakeSubnetsClient::new().with_subnet("rg", "vnet", "subnet", Subnet::default());

        let first = client.get("rg", "vnet", "subnet", "").await.unwrap();
        let second = client.get("rg", "vnet", "subnet", "").await.unwrap();

        client.create_or_update("rg", "vnet", "subnet", &first).await.unwrap();
        let err = client
            .create_or_update("rg", "vnet", "subnet", &second)
            .await
            .unwrap_err();

        assert_eq!(err.http_status_code, Some(412));
        assert_eq!(client.conflicts(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let client = FakeSubnetsClient::new().with_subnet("rg", "vnet", "subnet", Subnet::default());
        client
            .faults()
            .fail("get", RetryError::from_status(503, None, "unavailable"));

        let err = client.get("rg", "vnet", "subnet", "").await.unwrap_err();
        assert!(err.retriable);
        assert_eq!(client.calls().count("get"), 1);
    }
}
