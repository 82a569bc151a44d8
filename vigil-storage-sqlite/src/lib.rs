//! SQLite storage backend for the vigil login-defense engine.
//!
//! Implements the `vigil-core` repository traits over a single SQLite
//! database: the `users` table carries credential digests and lockout state,
//! `login_attempts` is the append-only ledger, and `ip_blacklist` holds
//! explicitly denied addresses. Schema management goes through the versioned
//! [`migrations`] module; [`SqliteRepositoryProvider::migrate`] applies the
//! full set.

pub mod migrations;
pub mod repositories;

pub use sqlx::SqlitePool;

pub use repositories::{
    SqliteCredentialRepository, SqliteIpBlacklistRepository, SqliteLoginAttemptRepository,
    SqliteRepositoryProvider, SqliteUserLockRepository,
};

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use sqlx::SqlitePool;

    use crate::migrations::{all_migrations, SqliteMigrationManager};

    pub async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create pool");

        let manager = SqliteMigrationManager::new(pool.clone());
        manager
            .initialize()
            .await
            .expect("Failed to initialize migrations");
        manager
            .up(&all_migrations())
            .await
            .expect("Failed to run migrations");

        pool
    }

    pub async fn create_test_user(pool: &SqlitePool, user_id: &str) {
        sqlx::query("INSERT INTO users (id, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(Utc::now().timestamp())
            .bind(Utc::now().timestamp())
            .execute(pool)
            .await
            .expect("Failed to create test user");
    }
}
