//! Per-question serialization of read-modify-write sequences.
//!
//! Two attempts on the same question file must not both read the same
//! counters. Each key gets its own async mutex; entries are dropped again
//! once nobody holds or waits on them, so the map tracks only in-flight keys.
//! A waiter that is cancelled before it gets the lock prunes its entry too.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Map of lazily created per-key async mutexes
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Exclusive hold on one key. Releasing it prunes the slot when idle.
#[derive(Debug)]
pub struct KeyGuard<'a> {
    owner: &'a KeyedLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    ///
    /// Cancel safe: dropping the future before it resolves leaves no entry
    /// behind once the key is otherwise idle.
    pub async fn lock(&self, key: &str) -> KeyGuard<'_> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let waiter = Waiter {
            owner: self,
            key,
            slot,
        };
        let guard = waiter.slot.clone().lock_owned().await;
        drop(waiter);

        KeyGuard {
            owner: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or awaited
    pub fn in_flight(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Remove `key` when the map and `extra` known references are all
    /// that point at its slot
    fn release(&self, key: &str, extra: usize) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if slots
            .get(key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1 + extra)
        {
            slots.remove(key);
        }
    }
}

/// Reference held while queued on a key, before the lock is granted
struct Waiter<'a> {
    owner: &'a KeyedLocks,
    key: &'a str,
    slot: Arc<AsyncMutex<()>>,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        // Our own clone is still alive here; a granted guard keeps another
        self.owner.release(self.key, 1);
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        // Unlock first so the slot's strong count reflects waiters only
        drop(self.guard.take());
        self.owner.release(&self.key, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::new());
        let inside = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let locks = locks.clone();
            let inside = inside.clone();
            handles.push(tokio::spawn(async move {
                let _held = locks.lock("q.png").await;
                assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(locks.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.lock("a.png").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("b.png")).await;
        assert!(b.is_ok());
        assert_eq!(locks.in_flight(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_waiters_are_pruned() {
        let locks = KeyedLocks::new();

        for i in 0..100 {
            let key = format!("q{i}.png");
            let held = locks.lock(&key).await;
            let mut waiter = task::spawn(locks.lock(&key));
            assert_pending!(waiter.poll());

            drop(held);
            drop(waiter);
        }
        assert_eq!(locks.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_waiter_cancelled_while_lock_held() {
        let locks = KeyedLocks::new();
        let held = locks.lock("q.png").await;

        let timed_out = tokio::time::timeout(Duration::from_millis(10), locks.lock("q.png")).await;
        assert!(timed_out.is_err());
        assert_eq!(locks.in_flight(), 1);

        drop(held);
        assert_eq!(locks.in_flight(), 0);

        // The key is still usable afterwards
        let mut next = task::spawn(locks.lock("q.png"));
        let _again = assert_ready!(next.poll());
        assert_eq!(locks.in_flight(), 1);
    }
}
