//! Account lockout state machine.
//!
//! Per-user state: `normal` or `locked`, driven by consecutive failures.
//! Crossing the failure threshold locks the account for a fixed duration; a
//! success or an administrative unlock resets it. Expiry is lazy: the check
//! path treats an elapsed `lockout_until` as unlocked, and the next write
//! persists the corrected state.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::{
    error::StorageError,
    lock::{LockoutStatus, UserLockState},
    repositories::UserLockRepository,
    Error,
};

/// Retries for atomic lock updates that lose a race.
const MAX_CONFLICT_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct LockoutConfig {
    /// Consecutive failures that trigger a lock. Default 5, parity with the
    /// rate limiter's quota.
    pub max_failed_attempts: u32,
    /// How long a triggered lock lasts. Independent of the rate limiter's
    /// block duration. Default 15 minutes.
    pub lock_duration: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lock_duration: Duration::minutes(15),
        }
    }
}

/// Lockout service over the user lock repository.
///
/// Thread-safe; lock mutations are atomic per user row, so concurrent failed
/// attempts never lose an increment.
pub struct AccountLockoutService<R: UserLockRepository> {
    repository: Arc<R>,
    config: LockoutConfig,
}

impl<R: UserLockRepository> AccountLockoutService<R> {
    pub fn new(repository: Arc<R>, config: LockoutConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// Current lockout status with lazy expiry applied. Unknown users read as
    /// unlocked.
    pub async fn status(&self, user_id: &str) -> Result<LockoutStatus, Error> {
        let state = self.repository.get(user_id).await?.unwrap_or_default();
        Ok(self.status_from_state(user_id, &state))
    }

    /// Record a failed authentication: atomic increment, then lock when the
    /// post-increment count reaches the threshold.
    pub async fn record_failure(&self, user_id: &str) -> Result<LockoutStatus, Error> {
        let now = Utc::now();
        let count = self
            .with_conflict_retry(|| self.repository.increment_failed_attempts(user_id, now))
            .await?;

        let Some(count) = count else {
            // Unknown user: nothing to lock, and saying so would leak which
            // accounts exist.
            return Ok(LockoutStatus {
                user_id: user_id.to_string(),
                failed_attempts: 0,
                is_locked: false,
                locked_until: None,
            });
        };

        if count >= self.config.max_failed_attempts {
            let until = now + self.config.lock_duration;
            self.with_conflict_retry(|| async {
                self.repository.lock(user_id, until).await.map(Some)
            })
            .await?;
            tracing::warn!(
                user_id = user_id,
                failed_attempts = count,
                "Account locked after repeated failures"
            );
            return Ok(LockoutStatus {
                user_id: user_id.to_string(),
                failed_attempts: count,
                is_locked: true,
                locked_until: Some(until),
            });
        }

        Ok(LockoutStatus {
            user_id: user_id.to_string(),
            failed_attempts: count,
            is_locked: false,
            locked_until: None,
        })
    }

    /// Record a successful authentication: reset the counter and clear lock
    /// fields, persisting any lazily-expired state.
    pub async fn record_success(&self, user_id: &str) -> Result<(), Error> {
        self.repository.reset(user_id).await
    }

    /// Administrative unlock from any state. The only transition that may
    /// shorten a lock.
    ///
    /// Returns `true` if the account was locked at the time of the call.
    pub async fn unlock(&self, user_id: &str) -> Result<bool, Error> {
        let was_locked = self.status(user_id).await?.is_locked;
        self.repository.reset(user_id).await?;
        if was_locked {
            tracing::info!(user_id = user_id, "Account unlocked administratively");
        }
        Ok(was_locked)
    }

    fn status_from_state(&self, user_id: &str, state: &UserLockState) -> LockoutStatus {
        let now = Utc::now();
        let is_locked = state.is_locked_at(now);
        LockoutStatus {
            user_id: user_id.to_string(),
            failed_attempts: state.failed_attempts,
            is_locked,
            locked_until: if is_locked { state.lockout_until } else { None },
        }
    }

    async fn with_conflict_retry<T, F, Fut>(&self, mut op: F) -> Result<Option<T>, Error>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Option<T>, Error>>,
    {
        let mut attempts = 0;
        loop {
            match op().await {
                Err(Error::Storage(StorageError::Conflict(detail)))
                    if attempts < MAX_CONFLICT_RETRIES =>
                {
                    attempts += 1;
                    tracing::debug!(
                        attempt = attempts,
                        detail = %detail,
                        "Retrying conflicting lock update"
                    );
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MockUserLockRepository {
        users: Mutex<HashMap<String, UserLockState>>,
        conflicts_before_success: Mutex<u32>,
    }

    impl MockUserLockRepository {
        fn with_user(user_id: &str) -> Self {
            let mut users = HashMap::new();
            users.insert(user_id.to_string(), UserLockState::default());
            Self {
                users: Mutex::new(users),
                conflicts_before_success: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl UserLockRepository for MockUserLockRepository {
        async fn get(&self, user_id: &str) -> Result<Option<UserLockState>, Error> {
            Ok(self.users.lock().unwrap().get(user_id).cloned())
        }

        async fn increment_failed_attempts(
            &self,
            user_id: &str,
            at: DateTime<Utc>,
        ) -> Result<Option<u32>, Error> {
            {
                let mut conflicts = self.conflicts_before_success.lock().unwrap();
                if *conflicts > 0 {
                    *conflicts -= 1;
                    return Err(StorageError::Conflict("lost update race".to_string()).into());
                }
            }
            let mut users = self.users.lock().unwrap();
            match users.get_mut(user_id) {
                Some(state) => {
                    state.failed_attempts += 1;
                    state.last_failed_attempt = Some(at);
                    Ok(Some(state.failed_attempts))
                }
                None => Ok(None),
            }
        }

        async fn lock(&self, user_id: &str, until: DateTime<Utc>) -> Result<(), Error> {
            if let Some(state) = self.users.lock().unwrap().get_mut(user_id) {
                state.account_locked = true;
                state.lockout_until = Some(until);
            }
            Ok(())
        }

        async fn reset(&self, user_id: &str) -> Result<(), Error> {
            if let Some(state) = self.users.lock().unwrap().get_mut(user_id) {
                *state = UserLockState::default();
            }
            Ok(())
        }
    }

    fn service(repo: Arc<MockUserLockRepository>) -> AccountLockoutService<MockUserLockRepository> {
        AccountLockoutService::new(repo, LockoutConfig::default())
    }

    #[tokio::test]
    async fn test_failures_below_threshold_do_not_lock() {
        let repo = Arc::new(MockUserLockRepository::with_user("alice"));
        let lockout = service(repo);

        for expected in 1..=4u32 {
            let status = lockout.record_failure("alice").await.unwrap();
            assert!(!status.is_locked);
            assert_eq!(status.failed_attempts, expected);
        }
    }

    #[tokio::test]
    async fn test_fifth_failure_locks_with_deadline() {
        let repo = Arc::new(MockUserLockRepository::with_user("alice"));
        let lockout = service(repo);

        for _ in 0..4 {
            lockout.record_failure("alice").await.unwrap();
        }
        let status = lockout.record_failure("alice").await.unwrap();
        assert!(status.is_locked);
        assert_eq!(status.failed_attempts, 5);
        assert!(status.locked_until.unwrap() > Utc::now());

        let status = lockout.status("alice").await.unwrap();
        assert!(status.is_locked);
    }

    #[tokio::test]
    async fn test_success_resets_counter_and_lock() {
        let repo = Arc::new(MockUserLockRepository::with_user("alice"));
        let lockout = service(Arc::clone(&repo));

        for _ in 0..5 {
            lockout.record_failure("alice").await.unwrap();
        }
        lockout.record_success("alice").await.unwrap();

        let status = lockout.status("alice").await.unwrap();
        assert!(!status.is_locked);
        assert_eq!(status.failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_lazy_expiry_reads_unlocked() {
        let repo = Arc::new(MockUserLockRepository::with_user("alice"));
        {
            let mut users = repo.users.lock().unwrap();
            let state = users.get_mut("alice").unwrap();
            state.failed_attempts = 5;
            state.account_locked = true;
            state.lockout_until = Some(Utc::now() - Duration::seconds(1));
        }
        let lockout = service(repo);

        let status = lockout.status("alice").await.unwrap();
        assert!(!status.is_locked);
        assert!(status.locked_until.is_none());
    }

    #[tokio::test]
    async fn test_admin_unlock_reports_previous_state() {
        let repo = Arc::new(MockUserLockRepository::with_user("alice"));
        let lockout = service(Arc::clone(&repo));

        for _ in 0..5 {
            lockout.record_failure("alice").await.unwrap();
        }
        assert!(lockout.unlock("alice").await.unwrap());
        assert!(!lockout.unlock("alice").await.unwrap());

        let state = repo.users.lock().unwrap().get("alice").cloned().unwrap();
        assert_eq!(state, UserLockState::default());
    }

    #[tokio::test]
    async fn test_unknown_user_is_silent_noop() {
        let repo = Arc::new(MockUserLockRepository::with_user("alice"));
        let lockout = service(repo);

        let status = lockout.record_failure("ghost").await.unwrap();
        assert!(!status.is_locked);
        assert_eq!(status.failed_attempts, 0);
        assert!(!lockout.status("ghost").await.unwrap().is_locked);
    }

    #[tokio::test]
    async fn test_conflict_is_retried_within_bound() {
        let repo = Arc::new(MockUserLockRepository::with_user("alice"));
        *repo.conflicts_before_success.lock().unwrap() = 2;
        let lockout = service(repo);

        let status = lockout.record_failure("alice").await.unwrap();
        assert_eq!(status.failed_attempts, 1);
    }

    #[tokio::test]
    async fn test_conflict_surfaces_after_retries_exhausted() {
        let repo = Arc::new(MockUserLockRepository::with_user("alice"));
        *repo.conflicts_before_success.lock().unwrap() = 10;
        let lockout = service(repo);

        let result = lockout.record_failure("alice").await;
        assert!(matches!(
            result,
            Err(Error::Storage(StorageError::Conflict(_)))
        ));
    }
}
