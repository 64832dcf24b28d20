//! Testing utilities for the azfile driver.
//!
//! In-memory implementations of the Azure client traits and the secret store,
//! each recording its calls and accepting injected failures.
//!
//! - [`FakeVirtualMachinesClient`] / [`FakeVmssVmClient`]
//! - [`FakeSubnetsClient`], with etag checks that expose lost updates
//! - [`FakeSecretSource`]
//!
//! ## Quick Start
//!
//! ```
//! use azfile_azure::{Subnet, SubnetsClient};
//! use azfile_testing::FakeSubnetsClient;
//!
//! # tokio_test::block_on(async {
//! let client = FakeSubnetsClient::new().with_subnet("rg", "vnet", "subnet", Subnet::default());
//!
//! let subnet = client.get("rg", "vnet", "subnet", "").await.unwrap();
//! client.create_or_update("rg", "vnet", "subnet", &subnet).await.unwrap();
//!
//! assert_eq!(client.calls().count("create_or_update"), 1);
//! # });
//! ```

pub mod compute;
pub mod mock;
pub mod network;
pub mod secret;

pub use compute::{FakeVirtualMachinesClient, FakeVmssVmClient};
pub use mock::{Call, CallRecorder, Faults};
pub use network::FakeSubnetsClient;
pub use secret::FakeSecretSource;
