//! In-memory counter store.
//!
//! Suitable for single-instance deployments and tests. The dashmap entry guard
//! holds the shard lock for the key while a counter is read and written, which
//! supplies the per-key atomicity the [`CounterStore`] contract requires.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use super::{CounterSnapshot, CounterStore};
use crate::Error;

#[derive(Debug, Clone, Copy)]
struct CounterEntry {
    points_consumed: u32,
    window_expires_at: DateTime<Utc>,
    blocked_until: Option<DateTime<Utc>>,
}

impl CounterEntry {
    fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            points_consumed: self.points_consumed,
            window_expires_at: self.window_expires_at,
            blocked_until: self.blocked_until,
        }
    }
}

/// Process-local [`CounterStore`] backed by a concurrent map.
#[derive(Default)]
pub struct MemoryCounterStore {
    entries: DashMap<String, CounterEntry>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys, expired or not. Test and metrics helper.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn consume(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
        block: Duration,
    ) -> Result<CounterSnapshot, Error> {
        let now = Utc::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert(CounterEntry {
                points_consumed: 0,
                window_expires_at: now + window,
                blocked_until: None,
            });

        // Block dominates the window: while it is in force nothing consumes.
        if let Some(blocked_until) = entry.blocked_until {
            if blocked_until > now {
                return Ok(entry.snapshot());
            }
            // Lazy expiry of a stale block: start clean.
            entry.blocked_until = None;
            entry.points_consumed = 0;
            entry.window_expires_at = now + window;
        }

        if entry.window_expires_at <= now {
            entry.points_consumed = 0;
            entry.window_expires_at = now + window;
        }

        entry.points_consumed += 1;
        if entry.points_consumed > limit {
            entry.blocked_until = Some(now + block);
        }

        Ok(entry.snapshot())
    }

    async fn force_block(&self, key: &str, block: Duration) -> Result<(), Error> {
        let now = Utc::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert(CounterEntry {
                points_consumed: 0,
                window_expires_at: now,
                blocked_until: None,
            });
        entry.blocked_until = Some(now + block);
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), Error> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::seconds(900);
    const BLOCK: Duration = Duration::seconds(86400);

    #[tokio::test]
    async fn test_consume_counts_within_window() {
        let store = MemoryCounterStore::new();

        for i in 1..=5u32 {
            let snap = store.consume("10.0.0.1", 5, WINDOW, BLOCK).await.unwrap();
            assert_eq!(snap.points_consumed, i);
            assert!(snap.blocked_until.is_none());
        }
    }

    #[tokio::test]
    async fn test_exceeding_limit_sets_block() {
        let store = MemoryCounterStore::new();

        for _ in 0..5 {
            store.consume("10.0.0.1", 5, WINDOW, BLOCK).await.unwrap();
        }
        let snap = store.consume("10.0.0.1", 5, WINDOW, BLOCK).await.unwrap();
        assert_eq!(snap.points_consumed, 6);
        assert!(snap.is_blocked_at(Utc::now()));

        // Once blocked, further calls do not consume.
        let snap = store.consume("10.0.0.1", 5, WINDOW, BLOCK).await.unwrap();
        assert_eq!(snap.points_consumed, 6);
        assert!(snap.is_blocked_at(Utc::now()));
    }

    #[tokio::test]
    async fn test_force_block_without_prior_consumption() {
        let store = MemoryCounterStore::new();

        store.force_block("10.0.0.2", BLOCK).await.unwrap();
        let snap = store.consume("10.0.0.2", 5, WINDOW, BLOCK).await.unwrap();
        assert!(snap.is_blocked_at(Utc::now()));
        assert_eq!(snap.points_consumed, 0);
    }

    #[tokio::test]
    async fn test_clear_resets_counter_and_block() {
        let store = MemoryCounterStore::new();

        store.force_block("10.0.0.3", BLOCK).await.unwrap();
        store.clear("10.0.0.3").await.unwrap();

        let snap = store.consume("10.0.0.3", 5, WINDOW, BLOCK).await.unwrap();
        assert_eq!(snap.points_consumed, 1);
        assert!(!snap.is_blocked_at(Utc::now()));
    }

    #[tokio::test]
    async fn test_expired_window_restarts() {
        let store = MemoryCounterStore::new();

        // A zero-length window is already expired by the next call.
        store
            .consume("10.0.0.4", 5, Duration::zero(), BLOCK)
            .await
            .unwrap();
        let snap = store
            .consume("10.0.0.4", 5, Duration::zero(), BLOCK)
            .await
            .unwrap();
        assert_eq!(snap.points_consumed, 1);
    }

    #[tokio::test]
    async fn test_expired_block_is_lazily_cleared() {
        let store = MemoryCounterStore::new();

        store
            .force_block("10.0.0.5", Duration::zero())
            .await
            .unwrap();
        let snap = store.consume("10.0.0.5", 5, WINDOW, BLOCK).await.unwrap();
        assert_eq!(snap.points_consumed, 1);
        assert!(!snap.is_blocked_at(Utc::now()));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = MemoryCounterStore::new();

        for _ in 0..6 {
            store.consume("10.0.0.6", 5, WINDOW, BLOCK).await.unwrap();
        }
        let snap = store.consume("10.0.0.7", 5, WINDOW, BLOCK).await.unwrap();
        assert!(!snap.is_blocked_at(Utc::now()));
        assert_eq!(snap.points_consumed, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_consume_never_overcounts() {
        use std::sync::Arc;

        let store = Arc::new(MemoryCounterStore::new());
        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.consume("race", 5, WINDOW, BLOCK).await.unwrap()
            }));
        }

        let mut allowed = 0;
        for handle in handles {
            let snap = handle.await.unwrap();
            if !snap.is_blocked_at(Utc::now()) && snap.points_consumed <= 5 {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 5);
    }
}
