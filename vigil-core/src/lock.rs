use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted per-user lockout state, a subset of the user record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLockState {
    pub failed_attempts: u32,
    pub last_failed_attempt: Option<DateTime<Utc>>,
    pub account_locked: bool,
    pub lockout_until: Option<DateTime<Utc>>,
}

impl UserLockState {
    /// Whether the stored lock is still in force at `now`.
    ///
    /// A stored `account_locked` flag whose `lockout_until` has elapsed reads
    /// as unlocked (lazy expiry); the next write persists the corrected state.
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.account_locked && self.lockout_until.is_some_and(|until| until > now)
    }
}

/// The lockout view the decision engine acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutStatus {
    pub user_id: String,
    pub failed_attempts: u32,
    pub is_locked: bool,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockoutStatus {
    /// Seconds until the lock expires, rounded up. `None` when not locked.
    pub fn retry_after_seconds(&self) -> Option<i64> {
        let until = self.locked_until?;
        let remaining_ms = (until - Utc::now()).num_milliseconds();
        if remaining_ms <= 0 {
            return None;
        }
        Some((remaining_ms + 999) / 1000)
    }
}
