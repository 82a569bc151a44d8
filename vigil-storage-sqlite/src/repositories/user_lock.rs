//! SQLite implementation of the per-user lockout repository.
//!
//! The increment is a single `UPDATE ... RETURNING` statement, so concurrent
//! failures for the same user serialize inside SQLite and no increment is
//! lost. Mutations for unknown user ids are silent no-ops.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use vigil_core::{
    error::StorageError, lock::UserLockState, repositories::UserLockRepository, Error,
};

/// SQLite repository for per-user lock state on the users table.
pub struct SqliteUserLockRepository {
    pool: SqlitePool,
}

impl SqliteUserLockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Internal struct for query results
#[derive(Debug, sqlx::FromRow)]
struct SqliteUserLockState {
    failed_attempts: i64,
    last_failed_attempt: Option<i64>,
    account_locked: bool,
    lockout_until: Option<i64>,
}

impl From<SqliteUserLockState> for UserLockState {
    fn from(row: SqliteUserLockState) -> Self {
        UserLockState {
            failed_attempts: row.failed_attempts.max(0) as u32,
            last_failed_attempt: row
                .last_failed_attempt
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            account_locked: row.account_locked,
            lockout_until: row
                .lockout_until
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
        }
    }
}

#[async_trait]
impl UserLockRepository for SqliteUserLockRepository {
    async fn get(&self, user_id: &str) -> Result<Option<UserLockState>, Error> {
        let row = sqlx::query_as::<_, SqliteUserLockState>(
            r#"
            SELECT failed_attempts, last_failed_attempt, account_locked, lockout_until
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to get lock state");
            StorageError::Database("Failed to get lock state".to_string())
        })?;

        Ok(row.map(Into::into))
    }

    async fn increment_failed_attempts(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<u32>, Error> {
        let count: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET failed_attempts = failed_attempts + 1,
                last_failed_attempt = ?2,
                updated_at = ?2
            WHERE id = ?1
            RETURNING failed_attempts
            "#,
        )
        .bind(user_id)
        .bind(at.timestamp())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to increment failed attempts");
            StorageError::Database("Failed to increment failed attempts".to_string())
        })?;

        Ok(count.map(|n| n.max(0) as u32))
    }

    async fn lock(&self, user_id: &str, until: DateTime<Utc>) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET account_locked = 1,
                lockout_until = ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(user_id)
        .bind(until.timestamp())
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to lock account");
            StorageError::Database("Failed to lock account".to_string())
        })?;

        Ok(())
    }

    async fn reset(&self, user_id: &str) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_attempts = 0,
                last_failed_attempt = NULL,
                account_locked = 0,
                lockout_until = NULL,
                updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(user_id)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to reset lock state");
            StorageError::Database("Failed to reset lock state".to_string())
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_user, setup_test_db};
    use chrono::Duration;

    #[tokio::test]
    async fn test_get_unknown_user_returns_none() {
        let pool = setup_test_db().await;
        let repo = SqliteUserLockRepository::new(pool);

        assert!(repo.get("ghost@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_increment_returns_post_increment_count() {
        let pool = setup_test_db().await;
        create_test_user(&pool, "alice@example.com").await;
        let repo = SqliteUserLockRepository::new(pool);

        let now = Utc::now();
        assert_eq!(
            repo.increment_failed_attempts("alice@example.com", now)
                .await
                .unwrap(),
            Some(1)
        );
        assert_eq!(
            repo.increment_failed_attempts("alice@example.com", now)
                .await
                .unwrap(),
            Some(2)
        );

        let state = repo.get("alice@example.com").await.unwrap().unwrap();
        assert_eq!(state.failed_attempts, 2);
        assert!(state.last_failed_attempt.is_some());
        assert!(!state.account_locked);
    }

    #[tokio::test]
    async fn test_increment_unknown_user_is_noop() {
        let pool = setup_test_db().await;
        let repo = SqliteUserLockRepository::new(pool);

        let count = repo
            .increment_failed_attempts("ghost@example.com", Utc::now())
            .await
            .unwrap();
        assert!(count.is_none());
    }

    #[tokio::test]
    async fn test_lock_and_reset() {
        let pool = setup_test_db().await;
        create_test_user(&pool, "alice@example.com").await;
        let repo = SqliteUserLockRepository::new(pool);

        let until = Utc::now() + Duration::minutes(15);
        repo.increment_failed_attempts("alice@example.com", Utc::now())
            .await
            .unwrap();
        repo.lock("alice@example.com", until).await.unwrap();

        let state = repo.get("alice@example.com").await.unwrap().unwrap();
        assert!(state.account_locked);
        assert!(state.is_locked_at(Utc::now()));
        assert_eq!(
            state.lockout_until.unwrap().timestamp(),
            until.timestamp()
        );

        repo.reset("alice@example.com").await.unwrap();

        let state = repo.get("alice@example.com").await.unwrap().unwrap();
        assert_eq!(state.failed_attempts, 0);
        assert!(!state.account_locked);
        assert!(state.lockout_until.is_none());
        assert!(state.last_failed_attempt.is_none());
    }

    #[tokio::test]
    async fn test_expired_lock_reads_unlocked() {
        let pool = setup_test_db().await;
        create_test_user(&pool, "alice@example.com").await;
        let repo = SqliteUserLockRepository::new(pool);

        repo.lock("alice@example.com", Utc::now() - Duration::minutes(1))
            .await
            .unwrap();

        let state = repo.get("alice@example.com").await.unwrap().unwrap();
        assert!(state.account_locked);
        assert!(!state.is_locked_at(Utc::now()));
    }

    #[tokio::test]
    async fn test_interleaved_increments_lose_nothing() {
        let pool = setup_test_db().await;
        create_test_user(&pool, "alice@example.com").await;
        let repo_a = SqliteUserLockRepository::new(pool.clone());
        let repo_b = SqliteUserLockRepository::new(pool);

        // Two handles on the same database, alternating writes. Each call is a
        // single atomic UPDATE, so the returned counts never repeat or skip.
        let mut seen = Vec::new();
        for i in 0..10 {
            let repo: &SqliteUserLockRepository = if i % 2 == 0 { &repo_a } else { &repo_b };
            let count = repo
                .increment_failed_attempts("alice@example.com", Utc::now())
                .await
                .unwrap()
                .unwrap();
            seen.push(count);
        }

        assert_eq!(seen, (1..=10).collect::<Vec<u32>>());
    }
}
