//! Coordination primitives for the azfile driver
//!
//! ## Named Locks
//!
//! Remote APIs without conditional updates are made safe for concurrent
//! read-modify-write by serializing callers on a lock keyed by the remote
//! resource's identity.
//!
//! ```rust
//! use azfile_distributed::{KeyedLock, LockMap};
//!
//! # tokio_test::block_on(async {
//! let locks = LockMap::new();
//!
//! let key = format!("{}{}{}", "rg", "vnet", "subnet");
//! let guard = locks.lock_entry(&key).await;
//!
//! // Critical section: read, modify, write the subnet
//!
//! // Released when the guard is dropped, on every exit path
//! drop(guard);
//! assert!(locks.is_empty());
//! # });
//! ```

pub mod lock;

pub use lock::{KeyedLock, LockEntryGuard, LockError, LockMap};
