//! IP blacklist service.
//!
//! Durable deny-set keyed by IP. Writes are idempotent upserts; reads apply
//! the active-entry filter, so an expired entry is invisible even before the
//! periodic sweep physically deletes it.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{blacklist::BlacklistEntry, repositories::IpBlacklistRepository, Error};

pub struct IpBlacklistService<R: IpBlacklistRepository> {
    repository: Arc<R>,
}

impl<R: IpBlacklistRepository> IpBlacklistService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Add or refresh the entry for `ip_address`. Repeated calls overwrite
    /// reason and expiry without duplicating or erroring.
    pub async fn upsert(
        &self,
        ip_address: &str,
        reason: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<BlacklistEntry, Error> {
        let entry = self.repository.upsert(ip_address, reason, expires_at).await?;
        tracing::info!(
            ip_address = ip_address,
            reason = reason,
            permanent = expires_at.is_none(),
            "IP blacklist entry upserted"
        );
        Ok(entry)
    }

    /// Whether an active entry exists for this IP.
    pub async fn is_blacklisted(&self, ip_address: &str) -> Result<bool, Error> {
        Ok(self.repository.find_active(ip_address).await?.is_some())
    }

    /// The active entry for this IP, if any.
    pub async fn find_active(&self, ip_address: &str) -> Result<Option<BlacklistEntry>, Error> {
        self.repository.find_active(ip_address).await
    }

    /// All active entries, newest first.
    pub async fn list_active(&self) -> Result<Vec<BlacklistEntry>, Error> {
        self.repository.list_active().await
    }

    /// Remove the entry for this IP.
    pub async fn remove(&self, ip_address: &str) -> Result<(), Error> {
        self.repository.remove(ip_address).await?;
        tracing::info!(ip_address = ip_address, "IP blacklist entry removed");
        Ok(())
    }

    /// Delete entries whose expiry has passed. Returns the number removed.
    pub async fn sweep_expired(&self) -> Result<u64, Error> {
        self.repository.sweep_expired().await
    }

    /// Start the periodic sweep task.
    pub fn start_sweep_task(
        &self,
        interval: std::time::Duration,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let repository = Arc::clone(&self.repository);

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        match repository.sweep_expired().await {
                            Ok(count) if count > 0 => {
                                tracing::info!(count = count, "Swept expired blacklist entries");
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Failed to sweep expired blacklist entries");
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down blacklist sweep task");
                        break;
                    }
                }
            }
        })
    }
}
