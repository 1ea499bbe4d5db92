//! Per-address mutual exclusion.
//!
//! Two-phase locking: the table mutex is held only long enough to find or
//! insert the entry; the per-address async mutex is then held for the whole
//! operation. Entries are never removed.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::observability::metrics;

/// Guard for one address; the lock is released when it is dropped.
pub type AddressGuard = OwnedMutexGuard<()>;

/// Registry of per-address locks.
#[derive(Debug, Default)]
pub struct AddressLockTable {
    entries: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl AddressLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, address: &str) -> Arc<AsyncMutex<()>> {
        // The critical section cannot leave the map half-updated, so a
        // poisoned table is still usable.
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get(address) {
            return Arc::clone(entry);
        }

        let entry = Arc::new(AsyncMutex::new(()));
        entries.insert(address.to_string(), Arc::clone(&entry));
        metrics::record_lock_table_size(entries.len());
        entry
    }

    /// Wait for exclusive ownership of `address`.
    pub async fn lock(&self, address: &str) -> AddressGuard {
        let entry = self.entry(address);
        let start = Instant::now();
        let guard = entry.lock_owned().await;
        metrics::record_lock_wait(start);
        guard
    }

    /// Run `f` while holding the lock for `address`. The lock is released on
    /// every exit path, including a panic inside `f`.
    pub async fn with_address_lock<F, Fut, T>(&self, address: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.lock(address).await;
        f().await
    }

    /// Number of addresses ever locked.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_address_is_serialized() {
        let table = Arc::new(AddressLockTable::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let table = Arc::clone(&table);
            let active = Arc::clone(&active);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                table
                    .with_address_lock("mxA", || async {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_addresses_do_not_block() {
        let table = AddressLockTable::new();
        let _a = table.lock("mxA").await;
        let b = tokio::time::timeout(Duration::from_millis(100), table.lock("mxB")).await;
        assert!(b.is_ok());
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_guard_drop_releases() {
        let table = AddressLockTable::new();
        {
            let _guard = table.lock("mxA").await;
            let blocked = tokio::time::timeout(Duration::from_millis(20), table.lock("mxA")).await;
            assert!(blocked.is_err());
        }
        let reacquired = tokio::time::timeout(Duration::from_millis(100), table.lock("mxA")).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn test_released_after_panic() {
        let table = Arc::new(AddressLockTable::new());

        let panicking = Arc::clone(&table);
        let result = tokio::spawn(async move {
            panicking
                .with_address_lock("mxA", || async {
                    panic!("step failed");
                })
                .await
        })
        .await;
        assert!(result.is_err());

        let reacquired = tokio::time::timeout(Duration::from_millis(100), table.lock("mxA")).await;
        assert!(reacquired.is_ok());
    }
}
