//! Versioned schema migrations for the SQLite backend.
//!
//! Timestamps are stored as unix-second integers throughout; no two databases
//! agree on a datetime type, and second precision is all the engine needs.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool};

pub type MigrationResult<T> = Result<T, MigrationError>;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait Migration: Send + Sync {
    /// Execute the migration
    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as sqlx::Database>::Connection,
    ) -> MigrationResult<()>;

    /// Rollback the migration
    async fn down<'a>(
        &'a self,
        conn: &'a mut <Sqlite as sqlx::Database>::Connection,
    ) -> MigrationResult<()>;

    /// Unique version number for ordering migrations
    fn version(&self) -> i64;

    /// Human readable name of the migration
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: i64,
}

const MIGRATION_TABLE: &str = "_vigil_migrations";

pub struct SqliteMigrationManager {
    pool: SqlitePool,
}

impl SqliteMigrationManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the migration tracking table.
    pub async fn initialize(&self) -> MigrationResult<()> {
        sqlx::query(
            format!(
                r#"
            CREATE TABLE IF NOT EXISTS {MIGRATION_TABLE} (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at INTEGER NOT NULL DEFAULT (unixepoch())
            );"#
            )
            .as_str(),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Apply pending migrations in order.
    pub async fn up(&self, migrations: &[Box<dyn Migration>]) -> MigrationResult<()> {
        for migration in migrations {
            if !self.is_applied(migration.version()).await? {
                let mut tx = self.pool.begin().await?;

                tracing::info!(
                    "Applying migration {} ({})",
                    migration.name(),
                    migration.version()
                );

                migration.up(&mut tx).await?;

                sqlx::query(
                    format!(
                        "INSERT INTO {MIGRATION_TABLE} (version, name, applied_at) VALUES (?, ?, ?)"
                    )
                    .as_str(),
                )
                .bind(migration.version())
                .bind(migration.name())
                .bind(Utc::now().timestamp())
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
            }
        }
        Ok(())
    }

    /// Roll back any applied migrations from the given set.
    pub async fn down(&self, migrations: &[Box<dyn Migration>]) -> MigrationResult<()> {
        for migration in migrations {
            if self.is_applied(migration.version()).await? {
                let mut tx = self.pool.begin().await?;

                tracing::info!(
                    "Rolling back migration {} ({})",
                    migration.name(),
                    migration.version()
                );

                migration.down(&mut tx).await?;

                sqlx::query(
                    format!("DELETE FROM {MIGRATION_TABLE} WHERE version = ?").as_str(),
                )
                .bind(migration.version())
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
            }
        }
        Ok(())
    }

    pub async fn get_applied_migrations(&self) -> MigrationResult<Vec<MigrationRecord>> {
        let records = sqlx::query_as::<_, MigrationRecord>(
            format!("SELECT version, name, applied_at FROM {MIGRATION_TABLE}").as_str(),
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    pub async fn is_applied(&self, version: i64) -> MigrationResult<bool> {
        let result: bool = sqlx::query_scalar(
            format!("SELECT EXISTS(SELECT 1 FROM {MIGRATION_TABLE} WHERE version = ?)").as_str(),
        )
        .bind(version)
        .fetch_one(&self.pool)
        .await?;
        Ok(result)
    }
}

/// The full migration set for this backend, in order.
pub fn all_migrations() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(CreateUsersTable),
        Box::new(CreateLoginAttemptsTable),
        Box::new(CreateIpBlacklistTable),
        Box::new(CreateIndexes),
    ]
}

pub struct CreateUsersTable;

#[async_trait]
impl Migration for CreateUsersTable {
    fn version(&self) -> i64 {
        1
    }

    fn name(&self) -> &str {
        "create_users_table"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as sqlx::Database>::Connection,
    ) -> MigrationResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                password_hash TEXT,
                failed_attempts INTEGER NOT NULL DEFAULT 0,
                last_failed_attempt INTEGER,
                account_locked INTEGER NOT NULL DEFAULT 0,
                lockout_until INTEGER,
                created_at INTEGER NOT NULL DEFAULT (unixepoch()),
                updated_at INTEGER NOT NULL DEFAULT (unixepoch())
            );
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn down<'a>(
        &'a self,
        conn: &'a mut <Sqlite as sqlx::Database>::Connection,
    ) -> MigrationResult<()> {
        sqlx::query("DROP TABLE IF EXISTS users").execute(conn).await?;
        Ok(())
    }
}

pub struct CreateLoginAttemptsTable;

#[async_trait]
impl Migration for CreateLoginAttemptsTable {
    fn version(&self) -> i64 {
        2
    }

    fn name(&self) -> &str {
        "create_login_attempts_table"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as sqlx::Database>::Connection,
    ) -> MigrationResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS login_attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                ip_address TEXT NOT NULL,
                device_fingerprint TEXT NOT NULL,
                user_agent TEXT NOT NULL DEFAULT '',
                success INTEGER NOT NULL,
                risk_score INTEGER NOT NULL DEFAULT 0,
                geo_location TEXT,
                attempted_at INTEGER NOT NULL DEFAULT (unixepoch())
            );
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn down<'a>(
        &'a self,
        conn: &'a mut <Sqlite as sqlx::Database>::Connection,
    ) -> MigrationResult<()> {
        sqlx::query("DROP TABLE IF EXISTS login_attempts")
            .execute(conn)
            .await?;
        Ok(())
    }
}

pub struct CreateIpBlacklistTable;

#[async_trait]
impl Migration for CreateIpBlacklistTable {
    fn version(&self) -> i64 {
        3
    }

    fn name(&self) -> &str {
        "create_ip_blacklist_table"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as sqlx::Database>::Connection,
    ) -> MigrationResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ip_blacklist (
                ip_address TEXT PRIMARY KEY,
                reason TEXT NOT NULL,
                expires_at INTEGER,
                created_at INTEGER NOT NULL DEFAULT (unixepoch())
            );
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn down<'a>(
        &'a self,
        conn: &'a mut <Sqlite as sqlx::Database>::Connection,
    ) -> MigrationResult<()> {
        sqlx::query("DROP TABLE IF EXISTS ip_blacklist")
            .execute(conn)
            .await?;
        Ok(())
    }
}

pub struct CreateIndexes;

#[async_trait]
impl Migration for CreateIndexes {
    fn version(&self) -> i64 {
        4
    }

    fn name(&self) -> &str {
        "create_indexes"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as sqlx::Database>::Connection,
    ) -> MigrationResult<()> {
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_login_attempts_ip_time ON login_attempts(ip_address, attempted_at)",
        )
        .execute(&mut *conn)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_login_attempts_user_time ON login_attempts(user_id, attempted_at)",
        )
        .execute(&mut *conn)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_login_attempts_device_time ON login_attempts(device_fingerprint, attempted_at)",
        )
        .execute(&mut *conn)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_ip_blacklist_expiry ON ip_blacklist(expires_at)",
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn down<'a>(
        &'a self,
        conn: &'a mut <Sqlite as sqlx::Database>::Connection,
    ) -> MigrationResult<()> {
        sqlx::query("DROP INDEX IF EXISTS idx_login_attempts_ip_time")
            .execute(&mut *conn)
            .await?;
        sqlx::query("DROP INDEX IF EXISTS idx_login_attempts_user_time")
            .execute(&mut *conn)
            .await?;
        sqlx::query("DROP INDEX IF EXISTS idx_login_attempts_device_time")
            .execute(&mut *conn)
            .await?;
        sqlx::query("DROP INDEX IF EXISTS idx_ip_blacklist_expiry")
            .execute(conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_apply_and_track() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let manager = SqliteMigrationManager::new(pool.clone());
        manager.initialize().await.unwrap();

        let migrations = all_migrations();
        manager.up(&migrations).await.unwrap();

        let applied = manager.get_applied_migrations().await.unwrap();
        assert_eq!(applied.len(), migrations.len());
        assert!(manager.is_applied(1).await.unwrap());

        // Re-running is a no-op.
        manager.up(&migrations).await.unwrap();
        assert_eq!(
            manager.get_applied_migrations().await.unwrap().len(),
            migrations.len()
        );
    }

    #[tokio::test]
    async fn test_migrations_roll_back() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let manager = SqliteMigrationManager::new(pool.clone());
        manager.initialize().await.unwrap();

        let migrations = all_migrations();
        manager.up(&migrations).await.unwrap();
        manager.down(&migrations).await.unwrap();

        assert!(manager.get_applied_migrations().await.unwrap().is_empty());
    }
}
