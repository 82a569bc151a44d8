use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A blacklist entry for a single IP address.
///
/// At most one entry exists per IP; writes for an existing IP replace the
/// reason and expiry. An entry with `expires_at = None` is permanent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub ip_address: String,
    pub reason: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl BlacklistEntry {
    /// An entry is active iff it never expires or its expiry is still ahead.
    /// Expired entries are logically absent even before the sweep deletes them.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            None => true,
            Some(expires_at) => expires_at > now,
        }
    }
}
