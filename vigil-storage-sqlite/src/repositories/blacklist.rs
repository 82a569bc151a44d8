//! SQLite implementation of the IP blacklist repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use vigil_core::{
    blacklist::BlacklistEntry, error::StorageError, repositories::IpBlacklistRepository, Error,
};

/// SQLite repository for explicitly denied IP addresses.
pub struct SqliteIpBlacklistRepository {
    pool: SqlitePool,
}

impl SqliteIpBlacklistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Internal struct for query results
#[derive(Debug, sqlx::FromRow)]
struct SqliteBlacklistEntry {
    ip_address: String,
    reason: String,
    expires_at: Option<i64>,
    created_at: i64,
}

impl From<SqliteBlacklistEntry> for BlacklistEntry {
    fn from(row: SqliteBlacklistEntry) -> Self {
        BlacklistEntry {
            ip_address: row.ip_address,
            reason: row.reason,
            expires_at: row
                .expires_at
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            created_at: DateTime::from_timestamp(row.created_at, 0).expect("Invalid timestamp"),
        }
    }
}

#[async_trait]
impl IpBlacklistRepository for SqliteIpBlacklistRepository {
    async fn upsert(
        &self,
        ip_address: &str,
        reason: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<BlacklistEntry, Error> {
        let row = sqlx::query_as::<_, SqliteBlacklistEntry>(
            r#"
            INSERT INTO ip_blacklist (ip_address, reason, expires_at, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(ip_address) DO UPDATE SET
                reason = excluded.reason,
                expires_at = excluded.expires_at
            RETURNING ip_address, reason, expires_at, created_at
            "#,
        )
        .bind(ip_address)
        .bind(reason)
        .bind(expires_at.map(|dt| dt.timestamp()))
        .bind(Utc::now().timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to upsert blacklist entry");
            StorageError::Database("Failed to upsert blacklist entry".to_string())
        })?;

        Ok(row.into())
    }

    async fn find_active(&self, ip_address: &str) -> Result<Option<BlacklistEntry>, Error> {
        let row = sqlx::query_as::<_, SqliteBlacklistEntry>(
            r#"
            SELECT ip_address, reason, expires_at, created_at
            FROM ip_blacklist
            WHERE ip_address = ? AND (expires_at IS NULL OR expires_at > ?)
            "#,
        )
        .bind(ip_address)
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to look up blacklist entry");
            StorageError::Database("Failed to look up blacklist entry".to_string())
        })?;

        Ok(row.map(Into::into))
    }

    async fn list_active(&self) -> Result<Vec<BlacklistEntry>, Error> {
        let rows = sqlx::query_as::<_, SqliteBlacklistEntry>(
            r#"
            SELECT ip_address, reason, expires_at, created_at
            FROM ip_blacklist
            WHERE expires_at IS NULL OR expires_at > ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(Utc::now().timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list blacklist entries");
            StorageError::Database("Failed to list blacklist entries".to_string())
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn remove(&self, ip_address: &str) -> Result<(), Error> {
        sqlx::query("DELETE FROM ip_blacklist WHERE ip_address = ?")
            .bind(ip_address)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to remove blacklist entry");
                StorageError::Database("Failed to remove blacklist entry".to_string())
            })?;

        Ok(())
    }

    async fn sweep_expired(&self) -> Result<u64, Error> {
        let result =
            sqlx::query("DELETE FROM ip_blacklist WHERE expires_at IS NOT NULL AND expires_at <= ?")
                .bind(Utc::now().timestamp())
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to sweep expired blacklist entries");
                    StorageError::Database(
                        "Failed to sweep expired blacklist entries".to_string(),
                    )
                })?;

        Ok(result.rows_affected())
    }
}
