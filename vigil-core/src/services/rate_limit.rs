//! Quota-consumption rate limiter over a shared counter store.
//!
//! Each identifier gets `points` consumptions per fixed `window`; exhausting
//! the quota triggers a block of `block_duration` during which every call is
//! rejected outright. The block dominates the window: it does not lift when
//! the window would have rolled over.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{store::CounterStore, Error};

/// What the engine does when the counter store is unreachable.
///
/// The limiter itself always propagates store errors; this policy is consulted
/// by the caller, as an explicit branch, never implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Treat an unavailable store as "allowed". Favors availability.
    FailOpen,
    /// Treat an unavailable store as "blocked". Favors the security property.
    #[default]
    FailClosed,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Quota per window. Default 5.
    pub points: u32,
    /// Window over which the quota replenishes. Default 15 minutes.
    pub window: Duration,
    /// Penalty period after exhausting the quota. Default 24 hours.
    pub block_duration: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            points: 5,
            window: Duration::seconds(900),
            block_duration: Duration::seconds(86400),
        }
    }
}

/// Outcome of one `consume` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining_points: u32,
    /// Ceiling of the remaining block (or window) time. Strictly positive
    /// whenever the call was rejected with time remaining.
    pub retry_after_seconds: Option<i64>,
}

/// Rate limiter service over a [`CounterStore`].
pub struct RateLimitService<S: CounterStore> {
    store: Arc<S>,
    config: RateLimitConfig,
}

impl<S: CounterStore> RateLimitService<S> {
    pub fn new(store: Arc<S>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Consume one point for `identifier`.
    ///
    /// Store errors propagate unchanged; the caller resolves them per its
    /// [`FailurePolicy`].
    pub async fn consume(&self, identifier: &str) -> Result<RateLimitDecision, Error> {
        let snapshot = self
            .store
            .consume(
                identifier,
                self.config.points,
                self.config.window,
                self.config.block_duration,
            )
            .await?;

        let now = Utc::now();
        if snapshot.is_blocked_at(now) {
            let until = snapshot
                .blocked_until
                .unwrap_or(snapshot.window_expires_at);
            return Ok(RateLimitDecision {
                allowed: false,
                remaining_points: 0,
                retry_after_seconds: Some(seconds_until(until, now)),
            });
        }

        Ok(RateLimitDecision {
            allowed: true,
            remaining_points: self.config.points.saturating_sub(snapshot.points_consumed),
            retry_after_seconds: None,
        })
    }

    /// Clear all counters and block state for `identifier` atomically.
    pub async fn reset(&self, identifier: &str) -> Result<(), Error> {
        self.store.clear(identifier).await
    }

    /// Force an immediate block, equivalent to having exhausted the quota.
    /// The very next `consume` for this identifier is rejected.
    pub async fn penalize_now(&self, identifier: &str) -> Result<(), Error> {
        tracing::warn!(identifier = identifier, "Applying immediate rate-limit penalty");
        self.store
            .force_block(identifier, self.config.block_duration)
            .await
    }
}

/// Seconds from `now` until `until`, rounded up, never below 1 while any time
/// remains.
fn seconds_until(until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let remaining_ms = (until - now).num_milliseconds();
    if remaining_ms <= 0 {
        return 0;
    }
    (remaining_ms + 999) / 1000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCounterStore;

    fn service() -> RateLimitService<MemoryCounterStore> {
        RateLimitService::new(Arc::new(MemoryCounterStore::new()), RateLimitConfig::default())
    }

    #[tokio::test]
    async fn test_quota_exhaustion_blocks_with_retry_after() {
        let limiter = service();

        for i in (0..5u32).rev() {
            let decision = limiter.consume("192.0.2.1").await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.remaining_points, i);
        }

        let decision = limiter.consume("192.0.2.1").await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.remaining_points, 0);
        let retry_after = decision.retry_after_seconds.unwrap();
        // 24 h block, allow scheduling slack
        assert!(retry_after > 86390 && retry_after <= 86400);
    }

    #[tokio::test]
    async fn test_penalize_now_blocks_next_consume() {
        let limiter = service();

        limiter.penalize_now("192.0.2.2").await.unwrap();
        let decision = limiter.consume("192.0.2.2").await.unwrap();
        assert!(!decision.allowed);
        assert!(decision.retry_after_seconds.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_penalize_after_partial_consumption() {
        let limiter = service();

        limiter.consume("192.0.2.3").await.unwrap();
        limiter.penalize_now("192.0.2.3").await.unwrap();
        let decision = limiter.consume("192.0.2.3").await.unwrap();
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn test_reset_restores_full_quota() {
        let limiter = service();

        for _ in 0..6 {
            limiter.consume("192.0.2.4").await.unwrap();
        }
        limiter.reset("192.0.2.4").await.unwrap();

        let decision = limiter.consume("192.0.2.4").await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining_points, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_consume_allows_exactly_quota() {
        let limiter = Arc::new(service());

        let mut handles = Vec::new();
        for _ in 0..12 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(
                async move { limiter.consume("192.0.2.5").await },
            ));
        }

        let mut allowed = 0;
        let mut blocked = 0;
        for handle in handles {
            let decision = handle.await.unwrap().unwrap();
            if decision.allowed {
                allowed += 1;
            } else {
                blocked += 1;
            }
        }
        assert_eq!(allowed, 5);
        assert_eq!(blocked, 7);
    }

    #[test]
    fn test_seconds_until_rounds_up() {
        let now = Utc::now();
        assert_eq!(seconds_until(now + Duration::milliseconds(1), now), 1);
        assert_eq!(seconds_until(now + Duration::milliseconds(1001), now), 2);
        assert_eq!(seconds_until(now - Duration::seconds(1), now), 0);
    }
}
