//! Per-key FIFO locks
//!
//! Serializes work on one key while different keys run in parallel.
//! `tokio::sync::Mutex` is fair, so waiters acquire in arrival order.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for exclusive access to `key`
    pub async fn acquire(&self, key: K) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(key).or_default())
        };
        lock.lock_owned().await
    }

    /// Forget `key`; holders and waiters keep their lock until released
    pub async fn remove(&self, key: &K) {
        self.locks.lock().await.remove(key);
    }

    /// Forget every key matching `predicate`
    pub async fn remove_where(&self, predicate: impl Fn(&K) -> bool) {
        self.locks.lock().await.retain(|key, _| !predicate(key));
    }

    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}

impl<K: Eq + Hash> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_runs_in_arrival_order() {
        let locks = Arc::new(KeyedLocks::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let guard = locks.acquire("a").await;
        let mut handles = Vec::new();
        for i in 0..5 {
            let locks = Arc::clone(&locks);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("a").await;
                order.lock().await.push(i);
            }));
            // Let each task queue up before spawning the next
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        drop(guard);

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.acquire("a").await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.acquire("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_remove_where() {
        let locks = KeyedLocks::new();
        drop(locks.acquire((1, "x")).await);
        drop(locks.acquire((1, "y")).await);
        drop(locks.acquire((2, "x")).await);

        locks.remove_where(|(session, _)| *session == 1).await;
        assert_eq!(locks.len().await, 1);
        locks.remove(&(2, "x")).await;
        assert_eq!(locks.len().await, 0);
    }
}
