//! Async mutexes keyed by id, held only while someone uses them.
//!
//! A slot is created on first [`KeyedLocks::lock`] and removed when the last [`KeyGuard`]
//! for it drops, so the map only holds keys with a holder or a waiter.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slots<K> = Arc<Mutex<HashMap<K, Arc<AsyncMutex<()>>>>>;

#[derive(Debug)]
pub struct KeyedLocks<K> {
    slots: Slots<K>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K: Eq + Hash + Copy> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive use of `key`.
    pub async fn lock(&self, key: K) -> KeyGuard<K> {
        let slot = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .clone();
        KeyGuard {
            key,
            guard: Some(slot.lock_owned().await),
            slots: self.slots.clone(),
        }
    }

    /// Number of keys currently held or awaited.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Exclusive use of one key. Dropping it releases the key and, if nobody else is waiting,
/// forgets the slot.
pub struct KeyGuard<K: Eq + Hash + Copy> {
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
    slots: Slots<K>,
}

impl<K: Eq + Hash + Copy> Drop for KeyGuard<K> {
    fn drop(&mut self) {
        self.guard.take();
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_slot_is_forgotten_after_last_guard() {
        let locks = KeyedLocks::new();
        {
            let _a = locks.lock(1u32).await;
            let _b = locks.lock(2u32).await;
            assert_eq!(locks.len(), 2);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::new());
        let trace = Arc::new(Mutex::new(Vec::new()));

        let first = locks.lock("scope").await;
        let waiter = {
            let locks = locks.clone();
            let trace = trace.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("scope").await;
                trace.lock().unwrap().push("second");
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        trace.lock().unwrap().push("first");
        drop(first);

        waiter.await.expect("task should succeed");
        assert_eq!(*trace.lock().unwrap(), vec!["first", "second"]);
        assert!(locks.is_empty());
    }
}
