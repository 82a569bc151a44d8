//! Adapters that wrap a [`RepositoryProvider`] and implement the individual
//! repository traits by delegation. They let the engine, which owns each
//! repository by `Arc`, run against a single shared provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::{
    attempt::{LoginAttempt, NewLoginAttempt, RiskSignals},
    blacklist::BlacklistEntry,
    lock::UserLockState,
    repositories::{
        CredentialRepository, IpBlacklistRepository, LoginAttemptRepository, RepositoryProvider,
        UserLockRepository,
    },
    Error,
};

pub struct AttemptRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> AttemptRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> LoginAttemptRepository for AttemptRepositoryAdapter<R> {
    async fn record(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
        self.provider.attempts().record(attempt).await
    }

    async fn recent_by_ip(
        &self,
        ip_address: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LoginAttempt>, Error> {
        self.provider.attempts().recent_by_ip(ip_address, since).await
    }

    async fn recent_by_user(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LoginAttempt>, Error> {
        self.provider.attempts().recent_by_user(user_id, since).await
    }

    async fn recent_failed_by_ip(
        &self,
        ip_address: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LoginAttempt>, Error> {
        self.provider
            .attempts()
            .recent_failed_by_ip(ip_address, since)
            .await
    }

    async fn risk_signals(
        &self,
        ip_address: &str,
        device_fingerprint: &str,
        since: DateTime<Utc>,
    ) -> Result<RiskSignals, Error> {
        self.provider
            .attempts()
            .risk_signals(ip_address, device_fingerprint, since)
            .await
    }

    async fn cleanup_before(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.attempts().cleanup_before(before).await
    }
}

pub struct BlacklistRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> BlacklistRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> IpBlacklistRepository for BlacklistRepositoryAdapter<R> {
    async fn upsert(
        &self,
        ip_address: &str,
        reason: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<BlacklistEntry, Error> {
        self.provider
            .blacklist()
            .upsert(ip_address, reason, expires_at)
            .await
    }

    async fn find_active(&self, ip_address: &str) -> Result<Option<BlacklistEntry>, Error> {
        self.provider.blacklist().find_active(ip_address).await
    }

    async fn list_active(&self) -> Result<Vec<BlacklistEntry>, Error> {
        self.provider.blacklist().list_active().await
    }

    async fn remove(&self, ip_address: &str) -> Result<(), Error> {
        self.provider.blacklist().remove(ip_address).await
    }

    async fn sweep_expired(&self) -> Result<u64, Error> {
        self.provider.blacklist().sweep_expired().await
    }
}

pub struct UserLockRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> UserLockRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> UserLockRepository for UserLockRepositoryAdapter<R> {
    async fn get(&self, user_id: &str) -> Result<Option<UserLockState>, Error> {
        self.provider.user_lock().get(user_id).await
    }

    async fn increment_failed_attempts(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<u32>, Error> {
        self.provider
            .user_lock()
            .increment_failed_attempts(user_id, at)
            .await
    }

    async fn lock(&self, user_id: &str, until: DateTime<Utc>) -> Result<(), Error> {
        self.provider.user_lock().lock(user_id, until).await
    }

    async fn reset(&self, user_id: &str) -> Result<(), Error> {
        self.provider.user_lock().reset(user_id).await
    }
}

pub struct CredentialRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> CredentialRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> CredentialRepository for CredentialRepositoryAdapter<R> {
    async fn create_user(&self, user_id: &str, password_hash: &str) -> Result<(), Error> {
        self.provider
            .credentials()
            .create_user(user_id, password_hash)
            .await
    }

    async fn password_hash(&self, user_id: &str) -> Result<Option<String>, Error> {
        self.provider.credentials().password_hash(user_id).await
    }
}
