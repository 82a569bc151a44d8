//! Repository trait for per-user lockout state.
//!
//! Lock state lives on the user row and is mutated only by the lockout service
//! (automatic path) or an administrative unlock (manual path).
//!
//! # Concurrency
//!
//! Concurrent failed attempts for the same user must not lose an increment:
//! `increment_failed_attempts` must be a single atomic update against current
//! state (e.g. `SET failed_attempts = failed_attempts + 1 ... RETURNING`), not
//! a read-modify-write pair. Implementations that detect a lost race should
//! return `StorageError::Conflict`; the service retries a bounded number of
//! times.
//!
//! # Unknown users
//!
//! Mutations for user ids with no row are silent no-ops. Attempts against
//! nonexistent accounts are still rate limited and recorded in the ledger, and
//! a distinguishable error here would leak which accounts exist.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{lock::UserLockState, Error};

#[async_trait]
pub trait UserLockRepository: Send + Sync + 'static {
    /// Current lock state for the user, or `None` if no such user.
    async fn get(&self, user_id: &str) -> Result<Option<UserLockState>, Error>;

    /// Atomically increment the failure counter and stamp the failure time.
    /// Returns the post-increment count, or `None` if no such user.
    async fn increment_failed_attempts(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<u32>, Error>;

    /// Set the account locked with the given deadline.
    async fn lock(&self, user_id: &str, until: DateTime<Utc>) -> Result<(), Error>;

    /// Reset the failure counter and clear all lock fields. Used on successful
    /// authentication and by the administrative unlock.
    async fn reset(&self, user_id: &str) -> Result<(), Error>;
}
