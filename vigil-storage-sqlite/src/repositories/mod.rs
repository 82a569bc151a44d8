//! Repository implementations for SQLite storage

pub mod attempts;
pub mod blacklist;
pub mod credentials;
pub mod user_lock;

pub use attempts::SqliteLoginAttemptRepository;
pub use blacklist::SqliteIpBlacklistRepository;
pub use credentials::SqliteCredentialRepository;
pub use user_lock::SqliteUserLockRepository;

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use vigil_core::{
    error::StorageError,
    repositories::{
        CredentialRepositoryProvider, IpBlacklistRepositoryProvider,
        LoginAttemptRepositoryProvider, RepositoryProvider, UserLockRepositoryProvider,
    },
    Error,
};

use crate::migrations::{all_migrations, SqliteMigrationManager};

/// Repository provider implementation for SQLite
///
/// This struct implements all the individual repository provider traits
/// as well as the unified `RepositoryProvider` trait.
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    attempts: Arc<SqliteLoginAttemptRepository>,
    blacklist: Arc<SqliteIpBlacklistRepository>,
    user_lock: Arc<SqliteUserLockRepository>,
    credentials: Arc<SqliteCredentialRepository>,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let attempts = Arc::new(SqliteLoginAttemptRepository::new(pool.clone()));
        let blacklist = Arc::new(SqliteIpBlacklistRepository::new(pool.clone()));
        let user_lock = Arc::new(SqliteUserLockRepository::new(pool.clone()));
        let credentials = Arc::new(SqliteCredentialRepository::new(pool.clone()));

        Self {
            pool,
            attempts,
            blacklist,
            user_lock,
            credentials,
        }
    }

    /// Connect to the given SQLite url (e.g. `sqlite::memory:` or
    /// `sqlite://vigil.db?mode=rwc`) and wrap the pool in a provider.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let pool = SqlitePool::connect(url).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to SQLite database");
            StorageError::Connection("Failed to connect to SQLite database".to_string())
        })?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// Implement individual provider traits

impl LoginAttemptRepositoryProvider for SqliteRepositoryProvider {
    type AttemptRepo = SqliteLoginAttemptRepository;

    fn attempts(&self) -> &Self::AttemptRepo {
        &self.attempts
    }
}

impl IpBlacklistRepositoryProvider for SqliteRepositoryProvider {
    type BlacklistRepo = SqliteIpBlacklistRepository;

    fn blacklist(&self) -> &Self::BlacklistRepo {
        &self.blacklist
    }
}

impl UserLockRepositoryProvider for SqliteRepositoryProvider {
    type UserLockRepo = SqliteUserLockRepository;

    fn user_lock(&self) -> &Self::UserLockRepo {
        &self.user_lock
    }
}

impl CredentialRepositoryProvider for SqliteRepositoryProvider {
    type CredentialRepo = SqliteCredentialRepository;

    fn credentials(&self) -> &Self::CredentialRepo {
        &self.credentials
    }
}

// Implement the unified RepositoryProvider trait

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize migrations");
            Error::Storage(StorageError::Migration(
                "Failed to initialize migrations".to_string(),
            ))
        })?;

        manager.up(&all_migrations()).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            Error::Storage(StorageError::Migration(
                "Failed to run migrations".to_string(),
            ))
        })?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;
        Ok(())
    }
}
