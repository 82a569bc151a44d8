//! Login-attempt ledger service.
//!
//! Thin coordination layer over the attempt repository: durable appends,
//! trailing-window reads for investigations, and the retention task.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::{
    attempt::{LoginAttempt, NewLoginAttempt},
    repositories::LoginAttemptRepository,
    Error,
};

pub struct LoginAttemptLedger<R: LoginAttemptRepository> {
    repository: Arc<R>,
}

impl<R: LoginAttemptRepository> LoginAttemptLedger<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Durably append an attempt. Returns the stored record with its assigned
    /// id and timestamp. A failure here is a hard error for the caller:
    /// dropping an attempt silently would corrupt every future risk score
    /// computed over this window.
    pub async fn record(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
        self.repository.record(attempt).await
    }

    /// Attempts from this IP in the trailing window, most recent first.
    pub async fn recent_by_ip(
        &self,
        ip_address: &str,
        window_minutes: i64,
    ) -> Result<Vec<LoginAttempt>, Error> {
        let since = Utc::now() - Duration::minutes(window_minutes);
        self.repository.recent_by_ip(ip_address, since).await
    }

    /// Attempts for this user in the trailing window, most recent first.
    pub async fn recent_by_user(
        &self,
        user_id: &str,
        window_minutes: i64,
    ) -> Result<Vec<LoginAttempt>, Error> {
        let since = Utc::now() - Duration::minutes(window_minutes);
        self.repository.recent_by_user(user_id, since).await
    }

    /// Failed attempts from this IP in the trailing window, most recent first.
    pub async fn recent_failed_by_ip(
        &self,
        ip_address: &str,
        window_minutes: i64,
    ) -> Result<Vec<LoginAttempt>, Error> {
        let since = Utc::now() - Duration::minutes(window_minutes);
        self.repository.recent_failed_by_ip(ip_address, since).await
    }

    /// Start the background retention task, deleting attempts older than
    /// `retention` once per `interval`.
    pub fn start_retention_task(
        &self,
        retention: Duration,
        interval: std::time::Duration,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let repository = Arc::clone(&self.repository);

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let before = Utc::now() - retention;
                        match repository.cleanup_before(before).await {
                            Ok(count) if count > 0 => {
                                tracing::info!(count = count, "Cleaned up old login attempt records");
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Failed to clean up login attempt records");
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down login attempt retention task");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::RiskSignals;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::Mutex;

    struct MockAttemptRepository {
        attempts: Mutex<Vec<LoginAttempt>>,
    }

    impl MockAttemptRepository {
        fn new() -> Self {
            Self {
                attempts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LoginAttemptRepository for MockAttemptRepository {
        async fn record(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
            let mut attempts = self.attempts.lock().unwrap();
            let stored = LoginAttempt {
                id: attempts.len() as i64 + 1,
                user_id: attempt.user_id,
                ip_address: attempt.ip_address,
                device_fingerprint: attempt.device_fingerprint,
                user_agent: attempt.user_agent,
                success: attempt.success,
                risk_score: attempt.risk_score,
                geo_location: attempt.geo_location,
                attempted_at: Utc::now(),
            };
            attempts.push(stored.clone());
            Ok(stored)
        }

        async fn recent_by_ip(
            &self,
            ip_address: &str,
            since: DateTime<Utc>,
        ) -> Result<Vec<LoginAttempt>, Error> {
            let attempts = self.attempts.lock().unwrap();
            let mut matching: Vec<_> = attempts
                .iter()
                .filter(|a| a.ip_address == ip_address && a.attempted_at >= since)
                .cloned()
                .collect();
            matching.sort_by(|a, b| b.id.cmp(&a.id));
            Ok(matching)
        }

        async fn recent_by_user(
            &self,
            user_id: &str,
            since: DateTime<Utc>,
        ) -> Result<Vec<LoginAttempt>, Error> {
            let attempts = self.attempts.lock().unwrap();
            let mut matching: Vec<_> = attempts
                .iter()
                .filter(|a| a.user_id == user_id && a.attempted_at >= since)
                .cloned()
                .collect();
            matching.sort_by(|a, b| b.id.cmp(&a.id));
            Ok(matching)
        }

        async fn recent_failed_by_ip(
            &self,
            ip_address: &str,
            since: DateTime<Utc>,
        ) -> Result<Vec<LoginAttempt>, Error> {
            Ok(self
                .recent_by_ip(ip_address, since)
                .await?
                .into_iter()
                .filter(|a| !a.success)
                .collect())
        }

        async fn risk_signals(
            &self,
            _ip_address: &str,
            _device_fingerprint: &str,
            _since: DateTime<Utc>,
        ) -> Result<RiskSignals, Error> {
            Ok(RiskSignals::default())
        }

        async fn cleanup_before(&self, before: DateTime<Utc>) -> Result<u64, Error> {
            let mut attempts = self.attempts.lock().unwrap();
            let before_len = attempts.len();
            attempts.retain(|a| a.attempted_at >= before);
            Ok((before_len - attempts.len()) as u64)
        }
    }

    fn failed_attempt(user_id: &str, ip: &str) -> NewLoginAttempt {
        NewLoginAttempt::builder()
            .user_id(user_id)
            .ip_address(ip)
            .device_fingerprint("fp-1")
            .success(false)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_record_assigns_id_in_order() {
        let ledger = LoginAttemptLedger::new(Arc::new(MockAttemptRepository::new()));

        let first = ledger
            .record(failed_attempt("alice", "10.0.0.1"))
            .await
            .unwrap();
        let second = ledger
            .record(failed_attempt("alice", "10.0.0.1"))
            .await
            .unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_recent_queries_are_most_recent_first_and_repeatable() {
        let ledger = LoginAttemptLedger::new(Arc::new(MockAttemptRepository::new()));

        for user in ["alice", "bob", "alice"] {
            ledger
                .record(failed_attempt(user, "10.0.0.1"))
                .await
                .unwrap();
        }

        let by_ip = ledger.recent_by_ip("10.0.0.1", 15).await.unwrap();
        assert_eq!(by_ip.len(), 3);
        assert!(by_ip.windows(2).all(|w| w[0].id > w[1].id));

        // Re-query has no side effects.
        assert_eq!(ledger.recent_by_ip("10.0.0.1", 15).await.unwrap().len(), 3);

        let by_user = ledger.recent_by_user("alice", 15).await.unwrap();
        assert_eq!(by_user.len(), 2);

        let failed = ledger.recent_failed_by_ip("10.0.0.1", 15).await.unwrap();
        assert_eq!(failed.len(), 3);
    }

    #[tokio::test]
    async fn test_retention_task_shuts_down() {
        let ledger = LoginAttemptLedger::new(Arc::new(MockAttemptRepository::new()));
        let (tx, rx) = tokio::sync::watch::channel(false);

        let handle = ledger.start_retention_task(
            Duration::days(30),
            std::time::Duration::from_secs(3600),
            rx,
        );
        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
