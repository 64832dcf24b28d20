//! Subnet service endpoint reconciliation against in-memory clients.

use azfile::azure::{Cloud, CloudConfig, RetryError, STORAGE_SERVICE, ServiceEndpoint, Subnet, SubnetProperties};
use azfile::{Driver, DriverOptions};
use azfile_testing::FakeSubnetsClient;
use std::sync::Arc;
use std::time::Duration;

fn config() -> CloudConfig {
    CloudConfig::builder()
        .identity("tenant", "sub")
        .resource_group("rg", "westus2")
        .network("", "vnet", "subnet")
        .build()
}

fn driver_with(config: CloudConfig, subnets: &FakeSubnetsClient) -> Driver {
    let cloud = Cloud::builder()
        .config(config)
        .subnets_client(Arc::new(subnets.clone()))
        .build();
    Driver::new(DriverOptions::default(), cloud)
}

fn subnet_with(endpoints: Vec<ServiceEndpoint>) -> Subnet {
    Subnet {
        name: Some("subnet".to_string()),
        properties: Some(SubnetProperties {
            address_prefix: Some("10.0.0.0/24".to_string()),
            service_endpoints: Some(endpoints),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_adds_storage_endpoint_once() {
    let subnets = FakeSubnetsClient::new().with_subnet(
        "rg",
        "vnet",
        "subnet",
        subnet_with(vec![ServiceEndpoint::new("Microsoft.Sql", "westus2")]),
    );
    let driver = driver_with(config(), &subnets);

    driver.update_subnet_service_endpoints().await.unwrap();
    driver.update_subnet_service_endpoints().await.unwrap();

    assert_eq!(subnets.calls().count("get"), 2);
    assert_eq!(subnets.calls().count("create_or_update"), 1);

    let stored = subnets.subnet("rg", "vnet", "subnet").unwrap();
    let endpoints = stored.service_endpoints();
    assert_eq!(endpoints.len(), 2);
    assert_eq!(endpoints[0].service.as_deref(), Some("Microsoft.Sql"));
    assert_eq!(endpoints[1].service.as_deref(), Some(STORAGE_SERVICE));
    assert_eq!(endpoints[1].locations, Some(vec!["westus2".to_string()]));
    assert_eq!(
        stored.properties.and_then(|p| p.address_prefix).as_deref(),
        Some("10.0.0.0/24")
    );
}

#[tokio::test]
async fn test_initializes_missing_properties() {
    let subnets = FakeSubnetsClient::new().with_subnet("rg", "vnet", "subnet", Subnet::default());
    let driver = driver_with(config(), &subnets);

    driver.update_subnet_service_endpoints().await.unwrap();

    let stored = subnets.subnet("rg", "vnet", "subnet").unwrap();
    assert!(stored.has_service_endpoint(STORAGE_SERVICE));
    assert_eq!(stored.service_endpoints().len(), 1);
}

#[tokio::test]
async fn test_existing_endpoint_in_other_location_is_kept() {
    let subnets = FakeSubnetsClient::new().with_subnet(
        "rg",
        "vnet",
        "subnet",
        subnet_with(vec![ServiceEndpoint::new(STORAGE_SERVICE, "eastus")]),
    );
    let driver = driver_with(config(), &subnets);

    driver.update_subnet_service_endpoints().await.unwrap();

    assert_eq!(subnets.calls().count("create_or_update"), 0);
    let stored = subnets.subnet("rg", "vnet", "subnet").unwrap();
    assert_eq!(stored.service_endpoints()[0].locations, Some(vec!["eastus".to_string()]));
}

#[tokio::test]
async fn test_uses_vnet_resource_group() {
    let subnets = FakeSubnetsClient::new().with_subnet("netrg", "vnet", "subnet", Subnet::default());
    let config = CloudConfig::builder()
        .identity("tenant", "sub")
        .resource_group("rg", "westus2")
        .network("netrg", "vnet", "subnet")
        .build();
    let driver = driver_with(config, &subnets);

    driver.update_subnet_service_endpoints().await.unwrap();

    assert_eq!(subnets.calls().calls()[0].args[0], "netrg");
    assert!(
        subnets
            .subnet("netrg", "vnet", "subnet")
            .unwrap()
            .has_service_endpoint(STORAGE_SERVICE)
    );
}

#[tokio::test]
async fn test_get_failure_is_wrapped() {
    let subnets = FakeSubnetsClient::new().with_subnet("rg", "vnet", "subnet", Subnet::default());
    subnets
        .faults()
        .fail("get", RetryError::from_status(503, None, "ServiceUnavailable: try later"));
    let driver = driver_with(config(), &subnets);

    let err = driver.update_subnet_service_endpoints().await.unwrap_err();

    assert!(
        err.to_string()
            .starts_with("failed to get the subnet subnet under vnet vnet: ")
    );
    let retry = err.retry_error().unwrap();
    assert!(retry.retriable);
    assert_eq!(retry.http_status_code, Some(503));
    assert_eq!(subnets.calls().count("create_or_update"), 0);
}

#[tokio::test]
async fn test_update_failure_releases_lock() {
    let subnets = FakeSubnetsClient::new().with_subnet("rg", "vnet", "subnet", Subnet::default());
    subnets
        .faults()
        .fail("create_or_update", RetryError::from_status(409, None, "Conflict: busy"));
    let driver = driver_with(config(), &subnets);

    let err = driver.update_subnet_service_endpoints().await.unwrap_err();
    assert!(
        err.to_string()
            .starts_with("failed to update the subnet subnet under vnet vnet: ")
    );

    subnets.faults().clear_all();
    tokio::time::timeout(Duration::from_secs(5), driver.update_subnet_service_endpoints())
        .await
        .expect("lock was not released after failure")
        .unwrap();

    assert!(
        subnets
            .subnet("rg", "vnet", "subnet")
            .unwrap()
            .has_service_endpoint(STORAGE_SERVICE)
    );
}

#[tokio::test]
async fn test_missing_subnet_is_an_error() {
    let subnets = FakeSubnetsClient::new();
    let driver = driver_with(config(), &subnets);

    let err = driver.update_subnet_service_endpoints().await.unwrap_err();
    assert!(err.retry_error().unwrap().is_not_found());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_subnet_is_serialized() {
    let subnets = FakeSubnetsClient::new()
        .with_subnet("rg", "vnet", "subnet", Subnet::default())
        .with_read_delay(Duration::from_millis(50));
    let driver = Arc::new(driver_with(config(), &subnets));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let driver = driver.clone();
            tokio::spawn(async move { driver.update_subnet_service_endpoints().await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(subnets.conflicts(), 0);
    assert_eq!(subnets.max_concurrent_gets(), 1);
    assert_eq!(subnets.calls().count("get"), 8);
    assert_eq!(subnets.calls().count("create_or_update"), 1);
    assert_eq!(
        subnets.subnet("rg", "vnet", "subnet").unwrap().service_endpoints().len(),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_subnets_run_in_parallel() {
    let names = ["a", "b", "c", "d"];
    let mut subnets = FakeSubnetsClient::new().with_read_delay(Duration::from_millis(200));
    for name in names {
        subnets = subnets.with_subnet("rg", "vnet", name, Subnet::default());
    }
    let driver = Arc::new(driver_with(config(), &subnets));

    let tasks: Vec<_> = names
        .into_iter()
        .map(|name| {
            let driver = driver.clone();
            tokio::spawn(async move {
                driver
                    .ensure_subnet_service_endpoint("rg", "vnet", name, STORAGE_SERVICE, "westus2")
                    .await
            })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap().unwrap());
    }

    assert!(subnets.max_concurrent_gets() > 1);
    assert_eq!(subnets.calls().count("create_or_update"), names.len());
}

#[tokio::test]
async fn test_ensure_reports_write() {
    let subnets = FakeSubnetsClient::new().with_subnet("rg", "vnet", "subnet", Subnet::default());
    let driver = driver_with(config(), &subnets);

    let written = driver
        .ensure_subnet_service_endpoint("rg", "vnet", "subnet", "Microsoft.KeyVault", "westus2")
        .await
        .unwrap();
    assert!(written);

    let written = driver
        .ensure_subnet_service_endpoint("rg", "vnet", "subnet", "Microsoft.KeyVault", "westus2")
        .await
        .unwrap();
    assert!(!written);
}
