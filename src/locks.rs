use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::RetryPolicy;

/// One async mutex per key, created on first use and dropped again once no
/// guard or waiter refers to it.
#[derive(Debug)]
pub struct KeyedLocks<K: Eq + Hash> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

/// Holds one key. Dropping it unlocks the key and prunes its idle entry.
#[derive(Debug)]
pub struct KeyGuard<'a, K: Eq + Hash> {
    key: K,
    owner: &'a KeyedLocks<K>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash> Drop for KeyGuard<'_, K> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own Arc left: nobody holds or waits on this key.
        self.owner
            .locks
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Ord + Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Ord + Copy,
{
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Number of keys currently held or waited on.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn slot(&self, key: K) -> Arc<Mutex<()>> {
        self.locks.entry(key).or_default().clone()
    }

    /// Waits at most `timeout` for the key. `None` means the wait timed out.
    pub async fn acquire(&self, key: K, timeout: Duration) -> Option<KeyGuard<'_, K>> {
        let waited = tokio::time::timeout(timeout, self.slot(key).lock_owned()).await;
        let guard = KeyGuard {
            key,
            owner: self,
            guard: waited.ok(),
        };
        guard.guard.is_some().then_some(guard)
    }

    /// Like [`acquire`](Self::acquire), but a timed out wait is retried with
    /// backoff up to `retry.max_attempts` times.
    pub async fn acquire_with_retry(
        &self,
        key: K,
        retry: &RetryPolicy,
    ) -> Option<KeyGuard<'_, K>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            if let Some(guard) = self.acquire(key, retry.lock_timeout).await {
                return Some(guard);
            }
            if attempt >= retry.max_attempts {
                return None;
            }
            tokio::time::sleep(retry.backoff(attempt)).await;
        }
    }

    /// Locks every key in ascending order so two callers can never deadlock.
    /// On timeout the keys already taken are released and the slow key is returned.
    pub async fn acquire_all(
        &self,
        keys: &[K],
        timeout: Duration,
    ) -> Result<Vec<KeyGuard<'_, K>>, K> {
        let mut ordered = keys.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for key in ordered {
            match self.acquire(key, timeout).await {
                Some(guard) => guards.push(guard),
                None => return Err(key),
            }
        }
        Ok(guards)
    }
}
