//! # Vigil
//!
//! Vigil is a login-defense decision engine for Rust applications. It sits in
//! front of your authentication endpoint and decides, per login attempt,
//! whether to allow it, reject it, or escalate: sliding-window rate limiting
//! per IP, account lockout after repeated failures, a persistent IP blacklist
//! with automatic escalation of risky sources, and an append-only attempt
//! ledger feeding a risk scorer.
//!
//! ## Storage Support
//!
//! Vigil currently ships a SQLite backend for the durable state (ledger,
//! blacklist, lockout, credentials). Rate-limit counters live behind the
//! [`CounterStore`] trait with an in-memory implementation; plug in your own
//! for a shared fast store.
//!
//! ## Example
//!
//! ```rust,no_run
//! use vigil::{LoginRequest, VigilBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let vigil = VigilBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     vigil.register_user("alice@example.com", "hunter2").await?;
//!
//!     let verdict = vigil
//!         .evaluate(LoginRequest {
//!             user_id: "alice@example.com".to_string(),
//!             password: "hunter2".to_string(),
//!             ip_address: "198.51.100.7".to_string(),
//!             device_fingerprint: "fp-1".to_string(),
//!             user_agent: "curl/8".to_string(),
//!             geo_location: None,
//!         })
//!         .await?;
//!     println!("verdict: {verdict:?}");
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};

use vigil_core::{
    repositories::{
        AttemptRepositoryAdapter, BlacklistRepositoryAdapter, CredentialRepositoryAdapter,
        RepositoryProvider, UserLockRepositoryAdapter,
    },
    services::DecisionEngine,
    store::{CounterStore, MemoryCounterStore},
    validation::validate_identifier,
};

pub mod builder;
pub mod verifier;

pub use builder::{NoStorage, VigilBuilder, VigilBuilderError, WithStorage};
pub use verifier::{hash_password, Argon2Verifier};

/// Re-export core types from vigil_core
///
/// These types are commonly used when working with the Vigil API.
pub use vigil_core::{
    BlacklistEntry, CredentialVerifier, EngineConfig, Error, FailurePolicy, LockoutStatus,
    LoginAttempt, LoginRequest, Verdict,
};
pub use vigil_core::services::{LockoutConfig, RateLimitConfig, RiskConfig};
pub use vigil_core::store::MemoryCounterStore as DefaultCounterStore;

/// Re-export storage backends
///
/// These storage implementations are available when the corresponding feature
/// is enabled.
#[cfg(feature = "sqlite")]
pub use vigil_storage_sqlite::SqliteRepositoryProvider;

/// Errors that can occur when using Vigil.
#[derive(Debug, thiserror::Error)]
pub enum VigilError {
    /// The request was malformed and never reached a store
    #[error("Validation error: {0}")]
    Validation(String),
    /// Error when interacting with storage
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<vigil_core::Error> for VigilError {
    fn from(e: vigil_core::Error) -> Self {
        match e {
            vigil_core::Error::Validation(v) => VigilError::Validation(v.to_string()),
            vigil_core::Error::Storage(s) => VigilError::Storage(s.to_string()),
        }
    }
}

type EngineFor<R, S> = DecisionEngine<
    AttemptRepositoryAdapter<R>,
    BlacklistRepositoryAdapter<R>,
    UserLockRepositoryAdapter<R>,
    S,
>;

/// The main login-defense coordinator.
///
/// `Vigil` wires the decision engine to a repository provider and exposes the
/// operational surface around it: evaluating attempts, administrative unlock
/// and blacklist management, and investigation queries over the ledger.
///
/// # Example
///
/// ```rust,no_run
/// use vigil::Vigil;
/// use vigil_storage_sqlite::SqliteRepositoryProvider;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = sqlx::SqlitePool::connect("sqlite::memory:").await?;
///     let repositories = Arc::new(SqliteRepositoryProvider::new(pool));
///
///     let vigil = Vigil::new(repositories);
///     vigil.migrate().await?;
///
///     Ok(())
/// }
/// ```
pub struct Vigil<R: RepositoryProvider, S: CounterStore = MemoryCounterStore> {
    repositories: Arc<R>,
    credentials: Arc<CredentialRepositoryAdapter<R>>,
    engine: EngineFor<R, S>,
}

impl<R: RepositoryProvider> Vigil<R, MemoryCounterStore> {
    /// Create a Vigil instance with default configuration: in-memory
    /// rate-limit counters and argon2 credential verification against the
    /// provider's credential repository.
    pub fn new(repositories: Arc<R>) -> Self {
        Self::from_parts(
            repositories,
            Arc::new(MemoryCounterStore::new()),
            None,
            EngineConfig::default(),
        )
    }
}

impl<R: RepositoryProvider, S: CounterStore> Vigil<R, S> {
    /// Assemble an instance from explicit parts. Used by the builder; callers
    /// wanting defaults should go through [`Vigil::new`] or [`VigilBuilder`].
    pub fn from_parts(
        repositories: Arc<R>,
        counter_store: Arc<S>,
        verifier: Option<Arc<dyn CredentialVerifier>>,
        config: EngineConfig,
    ) -> Self {
        let credentials = Arc::new(CredentialRepositoryAdapter::new(repositories.clone()));
        let verifier = verifier
            .unwrap_or_else(|| Arc::new(Argon2Verifier::new(credentials.clone())));

        let engine = DecisionEngine::new(
            Arc::new(AttemptRepositoryAdapter::new(repositories.clone())),
            Arc::new(BlacklistRepositoryAdapter::new(repositories.clone())),
            Arc::new(UserLockRepositoryAdapter::new(repositories.clone())),
            counter_store,
            verifier,
            config,
        );

        Self {
            repositories,
            credentials,
            engine,
        }
    }

    /// The underlying decision engine, for direct access to its services.
    pub fn engine(&self) -> &EngineFor<R, S> {
        &self.engine
    }

    /// The repository provider this instance was built with.
    pub fn repositories(&self) -> &Arc<R> {
        &self.repositories
    }

    /// Run storage migrations.
    pub async fn migrate(&self) -> Result<(), VigilError> {
        self.repositories.migrate().await?;
        Ok(())
    }

    /// Check that the durable store is reachable.
    pub async fn health_check(&self) -> Result<(), VigilError> {
        self.repositories.health_check().await?;
        Ok(())
    }

    /// Decide one login attempt.
    ///
    /// Deny outcomes are [`Verdict`] values, not errors; see
    /// [`DecisionEngine::evaluate`] for the exact semantics.
    pub async fn evaluate(&self, request: LoginRequest) -> Result<Verdict, VigilError> {
        Ok(self.engine.evaluate(request).await?)
    }

    /// Provision a user with an argon2 digest of the given password.
    pub async fn register_user(&self, user_id: &str, password: &str) -> Result<(), VigilError> {
        validate_identifier(user_id)?;

        use vigil_core::repositories::CredentialRepository;
        self.credentials
            .create_user(user_id, &hash_password(password))
            .await?;

        tracing::info!(user_id = user_id, "Registered user");
        Ok(())
    }

    /// Current lockout state for a user.
    pub async fn lockout_status(&self, user_id: &str) -> Result<LockoutStatus, VigilError> {
        Ok(self.engine.lockout().status(user_id).await?)
    }

    /// Administrative unlock: clears the lock and the failure counter.
    /// Returns whether a lock was actually in force.
    pub async fn unlock_account(&self, user_id: &str) -> Result<bool, VigilError> {
        Ok(self.engine.lockout().unlock(user_id).await?)
    }

    /// Manually blacklist an IP. `expires_at = None` makes the entry
    /// permanent.
    pub async fn blacklist_ip(
        &self,
        ip_address: &str,
        reason: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<BlacklistEntry, VigilError> {
        Ok(self
            .engine
            .blacklist()
            .upsert(ip_address, reason, expires_at)
            .await?)
    }

    /// Remove an IP from the blacklist, active or not.
    pub async fn remove_blacklisted_ip(&self, ip_address: &str) -> Result<(), VigilError> {
        Ok(self.engine.blacklist().remove(ip_address).await?)
    }

    /// All currently active blacklist entries, newest first.
    pub async fn list_blacklisted(&self) -> Result<Vec<BlacklistEntry>, VigilError> {
        Ok(self.engine.blacklist().list_active().await?)
    }

    /// Delete expired blacklist entries. Returns the number removed.
    pub async fn sweep_blacklist(&self) -> Result<u64, VigilError> {
        Ok(self.engine.blacklist().sweep_expired().await?)
    }

    /// Clear the rate-limit counter for an identifier (IP or user id).
    pub async fn reset_rate_limit(&self, identifier: &str) -> Result<(), VigilError> {
        Ok(self.engine.limiter().reset(identifier).await?)
    }

    /// Attempts from an IP over the trailing window, most recent first.
    pub async fn recent_attempts_by_ip(
        &self,
        ip_address: &str,
        window_minutes: i64,
    ) -> Result<Vec<LoginAttempt>, VigilError> {
        Ok(self
            .engine
            .ledger()
            .recent_by_ip(ip_address, window_minutes)
            .await?)
    }

    /// Attempts for a user over the trailing window, most recent first.
    pub async fn recent_attempts_by_user(
        &self,
        user_id: &str,
        window_minutes: i64,
    ) -> Result<Vec<LoginAttempt>, VigilError> {
        Ok(self
            .engine
            .ledger()
            .recent_by_user(user_id, window_minutes)
            .await?)
    }

    /// Failed attempts from an IP over the trailing window, most recent first.
    pub async fn recent_failed_by_ip(
        &self,
        ip_address: &str,
        window_minutes: i64,
    ) -> Result<Vec<LoginAttempt>, VigilError> {
        Ok(self
            .engine
            .ledger()
            .recent_failed_by_ip(ip_address, window_minutes)
            .await?)
    }

    /// Start the background maintenance tasks: ledger retention and blacklist
    /// sweeping. Both stop when the shutdown channel flips.
    pub fn start_maintenance_tasks(
        &self,
        retention: chrono::Duration,
        interval: std::time::Duration,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        vec![
            self.engine
                .ledger()
                .start_retention_task(retention, interval, shutdown.clone()),
            self.engine.blacklist().start_sweep_task(interval, shutdown),
        ]
    }
}
