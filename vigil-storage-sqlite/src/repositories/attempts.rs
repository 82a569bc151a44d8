//! SQLite implementation of the login-attempt ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use vigil_core::{
    attempt::{LoginAttempt, NewLoginAttempt, RiskSignals},
    error::StorageError,
    repositories::LoginAttemptRepository,
    Error,
};

/// SQLite repository for the append-only attempt ledger.
pub struct SqliteLoginAttemptRepository {
    pool: SqlitePool,
}

impl SqliteLoginAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Internal struct for query results
#[derive(Debug, sqlx::FromRow)]
struct SqliteLoginAttempt {
    id: i64,
    user_id: String,
    ip_address: String,
    device_fingerprint: String,
    user_agent: String,
    success: bool,
    risk_score: i64,
    geo_location: Option<String>,
    attempted_at: i64,
}

impl From<SqliteLoginAttempt> for LoginAttempt {
    fn from(row: SqliteLoginAttempt) -> Self {
        LoginAttempt {
            id: row.id,
            user_id: row.user_id,
            ip_address: row.ip_address,
            device_fingerprint: row.device_fingerprint,
            user_agent: row.user_agent,
            success: row.success,
            risk_score: row.risk_score.clamp(0, 100) as u8,
            geo_location: row
                .geo_location
                .and_then(|json| serde_json::from_str(&json).ok()),
            attempted_at: DateTime::from_timestamp(row.attempted_at, 0).expect("Invalid timestamp"),
        }
    }
}

/// Internal struct for the aggregate signals query
#[derive(Debug, sqlx::FromRow)]
struct SqliteRiskSignals {
    failed_count: i64,
    unique_users: i64,
    unique_devices: i64,
}

const ATTEMPT_COLUMNS: &str = "id, user_id, ip_address, device_fingerprint, user_agent, \
     success, risk_score, geo_location, attempted_at";

#[async_trait]
impl LoginAttemptRepository for SqliteLoginAttemptRepository {
    async fn record(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
        let geo_location = attempt
            .geo_location
            .as_ref()
            .map(|value| value.to_string());

        let row = sqlx::query_as::<_, SqliteLoginAttempt>(&format!(
            r#"
            INSERT INTO login_attempts
                (user_id, ip_address, device_fingerprint, user_agent, success, risk_score, geo_location, attempted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {ATTEMPT_COLUMNS}
            "#,
        ))
        .bind(&attempt.user_id)
        .bind(&attempt.ip_address)
        .bind(&attempt.device_fingerprint)
        .bind(&attempt.user_agent)
        .bind(attempt.success)
        .bind(attempt.risk_score as i64)
        .bind(geo_location)
        .bind(Utc::now().timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to record login attempt");
            StorageError::Database("Failed to record login attempt".to_string())
        })?;

        Ok(row.into())
    }

    async fn recent_by_ip(
        &self,
        ip_address: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LoginAttempt>, Error> {
        let rows = sqlx::query_as::<_, SqliteLoginAttempt>(&format!(
            r#"
            SELECT {ATTEMPT_COLUMNS}
            FROM login_attempts
            WHERE ip_address = ? AND attempted_at >= ?
            ORDER BY attempted_at DESC, id DESC
            "#,
        ))
        .bind(ip_address)
        .bind(since.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to query attempts by IP");
            StorageError::Database("Failed to query attempts by IP".to_string())
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn recent_by_user(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LoginAttempt>, Error> {
        let rows = sqlx::query_as::<_, SqliteLoginAttempt>(&format!(
            r#"
            SELECT {ATTEMPT_COLUMNS}
            FROM login_attempts
            WHERE user_id = ? AND attempted_at >= ?
            ORDER BY attempted_at DESC, id DESC
            "#,
        ))
        .bind(user_id)
        .bind(since.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to query attempts by user");
            StorageError::Database("Failed to query attempts by user".to_string())
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn recent_failed_by_ip(
        &self,
        ip_address: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LoginAttempt>, Error> {
        let rows = sqlx::query_as::<_, SqliteLoginAttempt>(&format!(
            r#"
            SELECT {ATTEMPT_COLUMNS}
            FROM login_attempts
            WHERE ip_address = ? AND success = 0 AND attempted_at >= ?
            ORDER BY attempted_at DESC, id DESC
            "#,
        ))
        .bind(ip_address)
        .bind(since.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to query failed attempts by IP");
            StorageError::Database("Failed to query failed attempts by IP".to_string())
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn risk_signals(
        &self,
        ip_address: &str,
        device_fingerprint: &str,
        since: DateTime<Utc>,
    ) -> Result<RiskSignals, Error> {
        // One aggregate query so all three counts come from the same snapshot.
        let row = sqlx::query_as::<_, SqliteRiskSignals>(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN success = 0 THEN 1 ELSE 0 END), 0) as failed_count,
                COUNT(DISTINCT user_id) as unique_users,
                COUNT(DISTINCT device_fingerprint) as unique_devices
            FROM login_attempts
            WHERE (ip_address = ? OR device_fingerprint = ?) AND attempted_at >= ?
            "#,
        )
        .bind(ip_address)
        .bind(device_fingerprint)
        .bind(since.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to aggregate risk signals");
            StorageError::Database("Failed to aggregate risk signals".to_string())
        })?;

        Ok(RiskSignals {
            failed_count: row.failed_count as u32,
            unique_users: row.unique_users as u32,
            unique_devices: row.unique_devices as u32,
        })
    }

    async fn cleanup_before(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE attempted_at < ?")
            .bind(before.timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to clean up old attempts");
                StorageError::Database("Failed to clean up old attempts".to_string())
            })?;

        Ok(result.rows_affected())
    }
}
