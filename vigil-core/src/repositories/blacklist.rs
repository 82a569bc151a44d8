//! Repository trait for the IP blacklist.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{blacklist::BlacklistEntry, Error};

/// Persistent set of explicitly denied IP addresses.
///
/// Entries are keyed by IP: a write for an existing IP replaces its reason and
/// expiry atomically (insert-or-replace on the unique key), never duplicates.
#[async_trait]
pub trait IpBlacklistRepository: Send + Sync + 'static {
    /// Insert or replace the entry for `ip_address`.
    async fn upsert(
        &self,
        ip_address: &str,
        reason: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<BlacklistEntry, Error>;

    /// The active entry for this IP, if any. Entries whose expiry has passed
    /// are filtered out here, before any physical sweep.
    async fn find_active(&self, ip_address: &str) -> Result<Option<BlacklistEntry>, Error>;

    /// All active entries, newest first.
    async fn list_active(&self) -> Result<Vec<BlacklistEntry>, Error>;

    /// Delete the entry for this IP, active or not.
    async fn remove(&self, ip_address: &str) -> Result<(), Error>;

    /// Bulk-delete entries whose expiry has passed. Returns the number of rows
    /// deleted. Maintenance only; reads never depend on it having run.
    async fn sweep_expired(&self) -> Result<u64, Error>;
}
