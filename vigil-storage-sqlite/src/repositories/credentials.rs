//! SQLite implementation of the credential-digest repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use vigil_core::{error::StorageError, repositories::CredentialRepository, Error};

/// SQLite repository for stored credential digests on the users table.
pub struct SqliteCredentialRepository {
    pool: SqlitePool,
}

impl SqliteCredentialRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialRepository for SqliteCredentialRepository {
    async fn create_user(&self, user_id: &str, password_hash: &str) -> Result<(), Error> {
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO users (id, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create user");
            StorageError::Database("Failed to create user".to_string())
        })?;

        Ok(())
    }

    async fn password_hash(&self, user_id: &str) -> Result<Option<String>, Error> {
        let hash: Option<Option<String>> =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to get password hash");
                    StorageError::Database("Failed to get password hash".to_string())
                })?;

        Ok(hash.flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_test_db;

    #[tokio::test]
    async fn test_create_and_fetch_hash() {
        let pool = setup_test_db().await;
        let repo = SqliteCredentialRepository::new(pool);

        repo.create_user("alice@example.com", "$argon2id$stub")
            .await
            .unwrap();

        let hash = repo.password_hash("alice@example.com").await.unwrap();
        assert_eq!(hash.as_deref(), Some("$argon2id$stub"));
    }

    #[tokio::test]
    async fn test_unknown_user_has_no_hash() {
        let pool = setup_test_db().await;
        let repo = SqliteCredentialRepository::new(pool);

        assert!(repo
            .password_hash("ghost@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_user_errors() {
        let pool = setup_test_db().await;
        let repo = SqliteCredentialRepository::new(pool);

        repo.create_user("alice@example.com", "hash-1")
            .await
            .unwrap();
        let result = repo.create_user("alice@example.com", "hash-2").await;
        assert!(result.is_err());
    }
}
