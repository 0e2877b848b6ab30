//! Per-owner async mutual exclusion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::OwnerKey;

/// Lazily created async mutex per owner key.
///
/// Entries nobody holds or waits on are dropped on the next acquisition.
#[derive(Default)]
pub struct KeyLocks {
    table: Mutex<HashMap<OwnerKey, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one read-modify-write.
pub struct KeyGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl KeyLocks {
    pub fn new() -> Self { Self::default() }

    pub async fn lock(&self, key: &OwnerKey) -> KeyGuard { self.lock_all([key]).await }

    /// Lock several keys. Keys are taken in sorted order so two callers
    /// locking overlapping sets cannot deadlock.
    pub async fn lock_all<'a>(&self, keys: impl IntoIterator<Item = &'a OwnerKey>) -> KeyGuard {
        let mut keys: Vec<&OwnerKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.retain(|_, m| Arc::strong_count(m) > 1);
            keys.iter().map(|k| Arc::clone(table.entry((*k).clone()).or_default())).collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        KeyGuard { _guards: guards }
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize { self.table.lock().unwrap_or_else(PoisonError::into_inner).len() }
}
