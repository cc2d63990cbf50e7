//! Per-key FIFO serialization.
//!
//! Work for the same key runs one at a time in arrival order (tokio's mutex
//! is fair); work for different keys never waits on each other. A key's entry
//! lives only while someone holds or waits on it.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub struct KeyedLock<K: Eq + Hash> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> KeyedLock<K> {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Wait for this key's turn. The turn ends when the guard drops.
    pub async fn lock(&self, key: K) -> KeyedGuard<'_, K> {
        let lock = self.locks.entry(key.clone()).or_default().clone();
        let guard = lock.lock_owned().await;
        KeyedGuard {
            guard: Some(guard),
            key,
            locks: &self.locks,
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLock<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// One key's turn. Dropping it releases the key and forgets the key's entry
/// when no other task holds or waits on it.
pub struct KeyedGuard<'a, K: Eq + Hash> {
    guard: Option<OwnedMutexGuard<()>>,
    key: K,
    locks: &'a DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash> Drop for KeyedGuard<'_, K> {
    fn drop(&mut self) {
        // The owned guard holds a clone of the mutex; release it first.
        drop(self.guard.take());
        // Cloning happens under the shard lock, so a count of one means no
        // waiter can appear before the removal.
        self.locks.remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_runs_in_arrival_order() {
        let locks = Arc::new(KeyedLock::new());
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let first = locks.lock(1).await;
        let mut tasks = Vec::new();
        for i in 0..3 {
            let locks = locks.clone();
            let order = order.clone();
            tasks.push(tokio::spawn(async move {
                let _turn = locks.lock(1).await;
                order.lock().unwrap().push(i);
            }));
            // Let each task reach the lock queue before spawning the next.
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        drop(first);
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = KeyedLock::new();
        let _a = locks.lock("a").await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.lock("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn entries_are_forgotten_after_the_last_turn() {
        let locks = Arc::new(KeyedLock::new());
        let held = locks.lock(1).await;
        assert_eq!(locks.len(), 1);

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _turn = locks.lock(1).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;

        // A waiter keeps the entry alive past the first release.
        drop(held);
        waiter.await.unwrap();
        assert!(locks.is_empty());

        for key in 0..100 {
            let _turn = locks.lock(key).await;
        }
        assert!(locks.is_empty());
    }
}
