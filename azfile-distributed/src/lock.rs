//! Named locks keyed by resource identity

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex as EntryMutex, OwnedMutexGuard};
use tracing::{debug, trace};

/// Lock errors
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Timed out after {timeout:?} waiting for lock entry '{key}'")]
    Timeout { key: String, timeout: Duration },
}

/// Keyed lock trait
#[async_trait]
pub trait KeyedLock: Send + Sync {
    /// Acquire the entry for `key`, waiting for any current holder
    async fn lock_entry(&self, key: &str) -> LockEntryGuard;

    /// Acquire the entry only if nobody holds it
    fn try_lock_entry(&self, key: &str) -> Option<LockEntryGuard>;

    /// Acquire with timeout
    async fn lock_entry_timeout(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<LockEntryGuard, LockError>;
}

type Entries = Arc<Mutex<HashMap<String, Arc<EntryMutex<()>>>>>;

/// A map of mutexes created on demand, one per key.
///
/// Holders of different keys never contend. An entry is dropped from the
/// map once no holder or waiter references it.
#[derive(Clone, Default)]
pub struct LockMap {
    entries: Entries,
}

impl LockMap {
    /// Create an empty lock map
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held or awaited
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when no key is held or awaited
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn entry(&self, key: &str) -> Arc<EntryMutex<()>> {
        let mut entries = self.entries.lock();
        entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(EntryMutex::new(())))
            .clone()
    }

    fn guard(&self, key: &str, inner: OwnedMutexGuard<()>) -> LockEntryGuard {
        trace!(key = %key, "lock entry acquired");
        LockEntryGuard {
            key: key.to_string(),
            inner: Some(inner),
            entries: self.entries.clone(),
        }
    }

    /// Drop the map's reference when an attempt gave up without the lock.
    fn forget_if_idle(&self, key: &str, entry: Arc<EntryMutex<()>>) {
        let mut entries = self.entries.lock();
        drop(entry);
        remove_if_idle(&mut entries, key);
    }
}

/// A waiter's reference to an entry.
///
/// If the wait ends without the lock, including when the waiting future is
/// dropped, the entry is removed from the map once nobody else uses it.
struct PendingEntry<'a> {
    map: &'a LockMap,
    key: &'a str,
    entry: Option<Arc<EntryMutex<()>>>,
}

impl<'a> PendingEntry<'a> {
    fn new(map: &'a LockMap, key: &'a str) -> Self {
        Self {
            map,
            key,
            entry: Some(map.entry(key)),
        }
    }

    fn mutex(&self) -> Arc<EntryMutex<()>> {
        match &self.entry {
            Some(entry) => entry.clone(),
            None => self.map.entry(self.key),
        }
    }

    fn acquired(mut self, inner: OwnedMutexGuard<()>) -> LockEntryGuard {
        self.entry.take();
        self.map.guard(self.key, inner)
    }
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            trace!(key = %self.key, "lock entry wait abandoned");
            self.map.forget_if_idle(self.key, entry);
        }
    }
}

fn remove_if_idle(entries: &mut HashMap<String, Arc<EntryMutex<()>>>, key: &str) {
    if let Some(entry) = entries.get(key)
        && Arc::strong_count(entry) == 1
    {
        entries.remove(key);
    }
}

#[async_trait]
impl KeyedLock for LockMap {
    async fn lock_entry(&self, key: &str) -> LockEntryGuard {
        let pending = PendingEntry::new(self, key);
        let acquire = pending.mutex().lock_owned();
        let inner = acquire.await;
        pending.acquired(inner)
    }

    fn try_lock_entry(&self, key: &str) -> Option<LockEntryGuard> {
        let entry = self.entry(key);
        match entry.clone().try_lock_owned() {
            Ok(inner) => {
                drop(entry);
                Some(self.guard(key, inner))
            }
            Err(_) => {
                debug!(key = %key, "lock entry already held");
                self.forget_if_idle(key, entry);
                None
            }
        }
    }

    async fn lock_entry_timeout(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<LockEntryGuard, LockError> {
        let pending = PendingEntry::new(self, key);
        let acquire = tokio::time::timeout(timeout, pending.mutex().lock_owned());
        let acquired = acquire.await;
        match acquired {
            Ok(inner) => Ok(pending.acquired(inner)),
            Err(_) => {
                drop(pending);
                Err(LockError::Timeout {
                    key: key.to_string(),
                    timeout,
                })
            }
        }
    }
}

/// Guard for one lock entry, released on drop
pub struct LockEntryGuard {
    key: String,
    inner: Option<OwnedMutexGuard<()>>,
    entries: Entries,
}

impl LockEntryGuard {
    /// Key this guard holds
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for LockEntryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockEntryGuard").field("key", &self.key).finish()
    }
}

impl Drop for LockEntryGuard {
    fn drop(&mut self) {
        // The map lock is held while the guard's reference goes away so no
        // new waiter can clone the entry between the count check and removal.
        let mut entries = self.entries.lock();
        self.inner.take();
        remove_if_idle(&mut entries, &self.key);
        trace!(key = %self.key, "lock entry released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_and_release_cleans_up() {
        let map = LockMap::new();
        {
            let guard = map.lock_entry("rg-vnet-subnet").await;
            assert_eq!(guard.key(), "rg-vnet-subnet");
            assert_eq!(map.len(), 1);
        }
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn test_try_lock_contended() {
        let map = LockMap::new();
        let guard = map.try_lock_entry("key").expect("first try succeeds");
        assert!(map.try_lock_entry("key").is_none());
        assert_eq!(map.len(), 1);
        drop(guard);
        assert!(map.is_empty());
        assert!(map.try_lock_entry("key").is_some());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let map = LockMap::new();
        let _a = map.lock_entry("a").await;
        let b = map.try_lock_entry("b");
        assert!(b.is_some());
        assert_eq!(map.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_while_held() {
        let map = LockMap::new();
        let _guard = map.lock_entry("key").await;

        let err = map
            .lock_entry_timeout("key", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::Timeout { .. }));
        assert_eq!(map.len(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_waiter_leaves_no_entry() {
        let map = LockMap::new();
        let guard = map.lock_entry("key").await;

        let mut waiter = tokio_test::task::spawn(map.lock_entry("key"));
        tokio_test::assert_pending!(waiter.poll());

        drop(guard);
        assert_eq!(map.len(), 1);
        drop(waiter);
        assert!(map.is_empty());
        assert!(map.try_lock_entry("key").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_cleans_up() {
        let map = LockMap::new();
        let guard = map.lock_entry("key").await;

        let waited = tokio::time::timeout(Duration::from_millis(10), map.lock_entry("key")).await;
        assert!(waited.is_err());

        drop(guard);
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn test_waiter_acquires_after_release() {
        let map = LockMap::new();
        let guard = map.lock_entry("key").await;

        let waiter = {
            let map = map.clone();
            tokio::spawn(async move {
                let _g = map.lock_entry("key").await;
            })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
        assert!(map.is_empty());
    }
}
