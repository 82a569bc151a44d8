//! Fast shared store for rate-limit counters.
//!
//! The relational repositories hold durable facts; this store holds ephemeral
//! TTL'd quota state. The contract is three operations — `consume`,
//! `force_block`, `clear` — where `consume` is a single atomic
//! increment-and-compare per key. Two concurrent `consume` calls for the same
//! key must never both observe "points available" when only one point remains.

pub mod memory;

pub use memory::MemoryCounterStore;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::Error;

/// State of one counter key after a store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Points consumed in the current window, including the call that produced
    /// this snapshot (when it consumed).
    pub points_consumed: u32,
    pub window_expires_at: DateTime<Utc>,
    /// While set and in the future, every consumption is rejected outright,
    /// independent of window expiry.
    pub blocked_until: Option<DateTime<Utc>>,
}

impl CounterSnapshot {
    pub fn is_blocked_at(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| until > now)
    }
}

/// Atomic counter store keyed by identifier (IP, user id).
///
/// Implementations back onto a shared fast store (or process memory for
/// single-instance deployments and tests). All three operations must be atomic
/// per key with respect to concurrent callers, including other engine
/// instances sharing the store.
#[async_trait]
pub trait CounterStore: Send + Sync + 'static {
    /// Consume one point for `key`.
    ///
    /// Atomically: if the key is blocked, return the state unchanged; else
    /// increment the window counter (starting a fresh window of `window` if
    /// none is live), and if the post-increment count exceeds `limit`, set the
    /// block flag for `block`.
    async fn consume(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
        block: Duration,
    ) -> Result<CounterSnapshot, Error>;

    /// Set the block flag for `key` immediately, as if the quota had just been
    /// exhausted. The next `consume` observes the block.
    async fn force_block(&self, key: &str, block: Duration) -> Result<(), Error>;

    /// Delete all state for `key` atomically: counter, window, and block flag.
    async fn clear(&self, key: &str) -> Result<(), Error>;
}
