//! Repository trait for the login-attempt ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    attempt::{LoginAttempt, NewLoginAttempt, RiskSignals},
    Error,
};

/// Append-only ledger of login attempts.
///
/// Implementations must make `record` durable before returning: the risk
/// scorer may be queried immediately afterwards and must never observe a
/// window missing the attempt just recorded. Rows are never mutated; deletion
/// happens only through `cleanup_before` (retention policy).
#[async_trait]
pub trait LoginAttemptRepository: Send + Sync + 'static {
    /// Append an attempt, assigning its id and timestamp.
    ///
    /// Ids are generated in insertion order, so ordering by id breaks
    /// timestamp ties deterministically.
    async fn record(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error>;

    /// Attempts from this IP since `since`, most recent first.
    async fn recent_by_ip(
        &self,
        ip_address: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LoginAttempt>, Error>;

    /// Attempts for this user since `since`, most recent first.
    async fn recent_by_user(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LoginAttempt>, Error>;

    /// Failed attempts from this IP since `since`, most recent first.
    async fn recent_failed_by_ip(
        &self,
        ip_address: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LoginAttempt>, Error>;

    /// Aggregate counts over attempts matching the IP **or** the device
    /// fingerprint since `since`. A single aggregate query so the counts are
    /// taken from one consistent snapshot.
    async fn risk_signals(
        &self,
        ip_address: &str,
        device_fingerprint: &str,
        since: DateTime<Utc>,
    ) -> Result<RiskSignals, Error>;

    /// Delete attempts recorded before `before`. Returns the number of rows
    /// deleted. Used by the retention task, never by the decision path.
    async fn cleanup_before(&self, before: DateTime<Utc>) -> Result<u64, Error>;
}
