//! Decision engine: one verdict per login attempt.
//!
//! Composes the blacklist, rate limiter, lockout state machine, ledger, and
//! risk scorer into a single `evaluate` call. Deny outcomes are first-class
//! verdicts, not errors; storage failures on the blacklist and limiter checks
//! resolve through an explicit fail-open/fail-closed branch, and a ledger
//! write failure is always a hard error.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    attempt::NewLoginAttempt,
    error::StorageError,
    repositories::{IpBlacklistRepository, LoginAttemptRepository, UserLockRepository},
    services::{
        blacklist::IpBlacklistService,
        ledger::LoginAttemptLedger,
        lockout::{AccountLockoutService, LockoutConfig},
        rate_limit::{FailurePolicy, RateLimitConfig, RateLimitService},
        risk::{RiskConfig, RiskScorer},
    },
    store::CounterStore,
    validation::{validate_identifier, validate_ip_address},
    Error,
};

/// Opaque credential-verification collaborator.
///
/// Computationally expensive by design (memory-hard hashing); the engine only
/// ever sees the boolean outcome.
#[async_trait]
pub trait CredentialVerifier: Send + Sync + 'static {
    async fn verify(&self, user_id: &str, password: &str) -> Result<bool, Error>;
}

/// An incoming login attempt, before any decision has been made.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub user_id: String,
    pub password: String,
    pub ip_address: String,
    pub device_fingerprint: String,
    pub user_agent: String,
    pub geo_location: Option<serde_json::Value>,
}

/// The engine's decision for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Verdict {
    Allowed,
    IpBlocked { reason: String },
    RateLimited { retry_after_seconds: i64 },
    AccountLocked { until: DateTime<Utc> },
    Denied { reason: String },
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub rate_limit: RateLimitConfig,
    pub lockout: LockoutConfig,
    pub risk: RiskConfig,
    /// How blacklist/limiter store failures resolve. Default fail-closed:
    /// an unreachable store rejects the attempt.
    pub failure_policy: FailurePolicy,
    /// Upper bound on every individual store call.
    pub store_call_timeout: std::time::Duration,
    /// Consume a rate-limit point per user id in addition to the per-IP
    /// point. Off by default.
    pub limit_per_user: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            lockout: LockoutConfig::default(),
            risk: RiskConfig::default(),
            failure_policy: FailurePolicy::default(),
            store_call_timeout: std::time::Duration::from_secs(5),
            limit_per_user: false,
        }
    }
}

/// The login-defense decision engine.
///
/// Thread-safe; serves concurrent attempts without global serialization.
/// Per-identifier atomicity lives in the stores, so multiple engine instances
/// may share them (horizontal scaling).
pub struct DecisionEngine<A, B, U, S>
where
    A: LoginAttemptRepository,
    B: IpBlacklistRepository,
    U: UserLockRepository,
    S: CounterStore,
{
    ledger: LoginAttemptLedger<A>,
    risk: RiskScorer<A>,
    blacklist: IpBlacklistService<B>,
    lockout: AccountLockoutService<U>,
    limiter: RateLimitService<S>,
    verifier: Arc<dyn CredentialVerifier>,
    config: EngineConfig,
}

impl<A, B, U, S> DecisionEngine<A, B, U, S>
where
    A: LoginAttemptRepository,
    B: IpBlacklistRepository,
    U: UserLockRepository,
    S: CounterStore,
{
    pub fn new(
        attempts: Arc<A>,
        blacklist: Arc<B>,
        user_lock: Arc<U>,
        counter_store: Arc<S>,
        verifier: Arc<dyn CredentialVerifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            ledger: LoginAttemptLedger::new(Arc::clone(&attempts)),
            risk: RiskScorer::new(attempts, config.risk.clone()),
            blacklist: IpBlacklistService::new(blacklist),
            lockout: AccountLockoutService::new(user_lock, config.lockout.clone()),
            limiter: RateLimitService::new(counter_store, config.rate_limit.clone()),
            verifier,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &LoginAttemptLedger<A> {
        &self.ledger
    }

    pub fn blacklist(&self) -> &IpBlacklistService<B> {
        &self.blacklist
    }

    pub fn lockout(&self) -> &AccountLockoutService<U> {
        &self.lockout
    }

    pub fn limiter(&self) -> &RateLimitService<S> {
        &self.limiter
    }

    /// Decide one login attempt and update state accordingly.
    ///
    /// Deny outcomes come back as [`Verdict`] values. An `Err` means the
    /// attempt could not be decided: invalid input, or a hard storage failure
    /// on a path the failure policy does not cover (ledger append, lock
    /// update).
    pub async fn evaluate(&self, request: LoginRequest) -> Result<Verdict, Error> {
        // Malformed input is rejected before anything touches a store.
        validate_ip_address(&request.ip_address)?;
        validate_identifier(&request.user_id)?;
        validate_identifier(&request.device_fingerprint)?;

        // Blacklist check short-circuits before any write.
        match self
            .bounded("blacklist check", self.blacklist.find_active(&request.ip_address))
            .await
        {
            Ok(Some(entry)) => {
                tracing::info!(ip_address = %request.ip_address, "Rejected blacklisted IP");
                return Ok(Verdict::IpBlocked { reason: entry.reason });
            }
            Ok(None) => {}
            Err(e) if e.is_store_unavailable() => match self.config.failure_policy {
                FailurePolicy::FailClosed => {
                    tracing::error!(error = %e, "Blacklist unavailable; failing closed");
                    return Ok(Verdict::IpBlocked {
                        reason: "blacklist check unavailable".to_string(),
                    });
                }
                FailurePolicy::FailOpen => {
                    tracing::warn!(error = %e, "Blacklist unavailable; failing open");
                }
            },
            Err(e) => return Err(e),
        }

        // Rate limit per IP, optionally per user as a second key.
        if let Some(verdict) = self.consume_limit(&request.ip_address).await? {
            return Ok(verdict);
        }
        if self.config.limit_per_user {
            if let Some(verdict) = self.consume_limit(&request.user_id).await? {
                return Ok(verdict);
            }
        }

        // The lock is authoritative: no credential verification, no risk
        // evaluation, no further state changes while it is in force.
        let lockout_status = self
            .bounded("lockout check", self.lockout.status(&request.user_id))
            .await?;
        if lockout_status.is_locked {
            let until = lockout_status
                .locked_until
                .unwrap_or_else(Utc::now);
            return Ok(Verdict::AccountLocked { until });
        }

        let success = self
            .verifier
            .verify(&request.user_id, &request.password)
            .await?;

        // Score the pre-attempt window: the attempt being recorded never
        // contributes to its own score.
        let risk_score = self
            .bounded(
                "risk scoring",
                self.risk.score(&request.ip_address, &request.device_fingerprint),
            )
            .await?;

        let attempt = NewLoginAttempt::builder()
            .user_id(&request.user_id)
            .ip_address(&request.ip_address)
            .device_fingerprint(&request.device_fingerprint)
            .user_agent(&request.user_agent)
            .success(success)
            .risk_score(risk_score)
            .geo_location(request.geo_location.clone())
            .build()?;
        self.bounded("ledger append", self.ledger.record(attempt))
            .await?;

        if success {
            self.bounded(
                "lockout reset",
                self.lockout.record_success(&request.user_id),
            )
            .await?;
        } else {
            self.bounded(
                "lockout update",
                self.lockout.record_failure(&request.user_id),
            )
            .await?;
        }

        self.escalate_if_risky(&request.ip_address, risk_score).await;

        if success {
            Ok(Verdict::Allowed)
        } else {
            Ok(Verdict::Denied {
                reason: "invalid credentials".to_string(),
            })
        }
    }

    async fn consume_limit(&self, identifier: &str) -> Result<Option<Verdict>, Error> {
        match self
            .bounded("rate limit consume", self.limiter.consume(identifier))
            .await
        {
            Ok(decision) if decision.allowed => Ok(None),
            Ok(decision) => {
                tracing::info!(identifier = identifier, "Rejected rate-limited attempt");
                Ok(Some(Verdict::RateLimited {
                    retry_after_seconds: decision.retry_after_seconds.unwrap_or(1),
                }))
            }
            Err(e) if e.is_store_unavailable() => match self.config.failure_policy {
                FailurePolicy::FailClosed => {
                    tracing::error!(error = %e, "Rate limiter unavailable; failing closed");
                    Ok(Some(Verdict::RateLimited {
                        retry_after_seconds: self.config.rate_limit.window.num_seconds(),
                    }))
                }
                FailurePolicy::FailOpen => {
                    tracing::warn!(error = %e, "Rate limiter unavailable; failing open");
                    Ok(None)
                }
            },
            Err(e) => Err(e),
        }
    }

    /// Escalate a risky window into a bounded blacklist entry.
    ///
    /// This attempt's verdict is already decided; an escalation write failure
    /// is logged and deliberately does not overturn it. The next attempt from
    /// this IP recomputes the same window and retries the escalation.
    async fn escalate_if_risky(&self, ip_address: &str, risk_score: u8) {
        if risk_score < self.config.risk.escalation_threshold {
            return;
        }

        let expires_at = Utc::now() + self.config.risk.escalation_block;
        let reason = format!("automated escalation: risk score {risk_score}");
        if let Err(e) = self
            .bounded(
                "blacklist escalation",
                self.blacklist.upsert(ip_address, &reason, Some(expires_at)),
            )
            .await
        {
            tracing::error!(error = %e, ip_address = ip_address, "Failed to escalate risky IP");
        } else {
            tracing::warn!(
                ip_address = ip_address,
                risk_score = risk_score,
                "Escalated risky IP to blacklist"
            );
        }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl std::future::Future<Output = Result<T, Error>>,
    ) -> Result<T, Error> {
        match tokio::time::timeout(self.config.store_call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(operation.to_string()).into()),
        }
    }
}
