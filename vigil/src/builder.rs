//! Builder pattern for constructing Vigil instances
//!
//! This module provides a type-safe builder for creating [`Vigil`] instances
//! with compile-time validation of storage configuration.
//!
//! # Example
//!
//! ```rust,no_run
//! use vigil::VigilBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build with SQLite and auto-migration
//!     let vigil = VigilBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     // Or build without auto-migration and run manually
//!     let vigil = VigilBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .build()
//!         .await?;
//!     vigil.migrate().await?;
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use vigil_core::{
    repositories::RepositoryProvider,
    services::{LockoutConfig, RateLimitConfig, RiskConfig},
    store::{CounterStore, MemoryCounterStore},
    CredentialVerifier, EngineConfig, FailurePolicy,
};

use crate::Vigil;

/// Errors that can occur when building a Vigil instance.
#[derive(Debug, thiserror::Error)]
pub enum VigilBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to run database migrations
    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Marker type indicating no storage has been configured yet.
///
/// This is the initial state of [`VigilBuilder`].
pub struct NoStorage;

/// Marker type indicating storage has been configured.
///
/// Contains the repository provider that will be used by Vigil.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

/// A type-safe builder for constructing [`Vigil`] instances.
///
/// The builder uses a type-state pattern to ensure that storage is configured
/// before building.
///
/// # Type States
///
/// - [`NoStorage`]: Initial state, storage must be configured
/// - [`WithStorage<R>`]: Storage configured, ready to build or add more configuration
///
/// # Example
///
/// ```rust,no_run
/// use vigil::{RateLimitConfig, VigilBuilder};
/// use chrono::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let vigil = VigilBuilder::new()
///         .with_sqlite("sqlite::memory:")
///         .await?
///         .with_rate_limit(RateLimitConfig {
///             points: 10,
///             window: Duration::minutes(15),
///             block_duration: Duration::hours(24),
///         })
///         .apply_migrations(true)
///         .build()
///         .await?;
///
///     Ok(())
/// }
/// ```
pub struct VigilBuilder<Storage, S: CounterStore = MemoryCounterStore> {
    storage: Storage,
    counter_store: Arc<S>,
    config: EngineConfig,
    verifier: Option<Arc<dyn CredentialVerifier>>,
    apply_migrations: bool,
}

impl Default for VigilBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl VigilBuilder<NoStorage> {
    /// Create a new builder with default configuration.
    ///
    /// # Defaults
    ///
    /// - Rate limit: 5 attempts per 15 minute window, 24 hour block
    /// - Lockout: 5 failed attempts, 15 minute lock
    /// - Risk escalation: threshold 70, 24 hour blacklist entry
    /// - Failure policy: fail closed
    /// - Counter store: in-memory
    /// - Apply migrations: false
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            counter_store: Arc::new(MemoryCounterStore::new()),
            config: EngineConfig::default(),
            verifier: None,
            apply_migrations: false,
        }
    }
}

// ============================================================================
// Storage Configuration Methods (NoStorage -> WithStorage)
// ============================================================================

impl<S: CounterStore> VigilBuilder<NoStorage, S> {
    /// Configure an already-constructed repository provider.
    ///
    /// Use this for custom storage backends; the SQLite shortcuts below cover
    /// the common case.
    pub fn with_repository_provider<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> VigilBuilder<WithStorage<R>, S> {
        VigilBuilder {
            storage: WithStorage { repositories },
            counter_store: self.counter_store,
            config: self.config,
            verifier: self.verifier,
            apply_migrations: self.apply_migrations,
        }
    }
}

#[cfg(feature = "sqlite")]
impl<S: CounterStore> VigilBuilder<NoStorage, S> {
    /// Configure SQLite storage by connecting to the given URL.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://path/to/db.sqlite")
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<
        VigilBuilder<WithStorage<vigil_storage_sqlite::SqliteRepositoryProvider>, S>,
        VigilBuilderError,
    > {
        let provider = vigil_storage_sqlite::SqliteRepositoryProvider::connect(url)
            .await
            .map_err(|e| VigilBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_repository_provider(Arc::new(provider)))
    }

    /// Configure SQLite storage with an existing connection pool.
    ///
    /// Use this when you already have a SQLite connection pool and want to
    /// share it with Vigil.
    pub fn with_sqlite_pool(
        self,
        pool: vigil_storage_sqlite::SqlitePool,
    ) -> VigilBuilder<WithStorage<vigil_storage_sqlite::SqliteRepositoryProvider>, S> {
        self.with_repository_provider(Arc::new(
            vigil_storage_sqlite::SqliteRepositoryProvider::new(pool),
        ))
    }
}

// ============================================================================
// Configuration Methods (any state)
// ============================================================================

impl<Storage, S: CounterStore> VigilBuilder<Storage, S> {
    /// Replace the rate-limit counter store.
    ///
    /// Default: in-memory counters, scoped to this process. Deployments with
    /// multiple instances should plug in a store shared between them.
    pub fn with_counter_store<S2: CounterStore>(
        self,
        counter_store: Arc<S2>,
    ) -> VigilBuilder<Storage, S2> {
        VigilBuilder {
            storage: self.storage,
            counter_store,
            config: self.config,
            verifier: self.verifier,
            apply_migrations: self.apply_migrations,
        }
    }

    /// Configure the sliding-window rate limiter.
    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.config.rate_limit = config;
        self
    }

    /// Configure account lockout thresholds.
    pub fn with_lockout(mut self, config: LockoutConfig) -> Self {
        self.config.lockout = config;
        self
    }

    /// Configure risk scoring and escalation.
    pub fn with_risk(mut self, config: RiskConfig) -> Self {
        self.config.risk = config;
        self
    }

    /// Set how blacklist and rate-limit store outages resolve.
    ///
    /// Default: [`FailurePolicy::FailClosed`].
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Upper bound on each individual store call during evaluation.
    pub fn with_store_call_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.store_call_timeout = timeout;
        self
    }

    /// Also consume a rate-limit point per user id, not just per IP.
    pub fn with_per_user_limit(mut self, enabled: bool) -> Self {
        self.config.limit_per_user = enabled;
        self
    }

    /// Replace the credential verifier.
    ///
    /// Default: argon2 verification against the provider's credential
    /// repository. Use this to verify against an external identity system.
    pub fn with_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Set whether to automatically apply database migrations during build.
    ///
    /// Default: false. When `false`, call [`Vigil::migrate`] manually after
    /// building.
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }
}

// ============================================================================
// Build (WithStorage only)
// ============================================================================

impl<R: RepositoryProvider, S: CounterStore> VigilBuilder<WithStorage<R>, S> {
    /// Build the Vigil instance.
    ///
    /// If `apply_migrations(true)` was called, migrations are applied before
    /// returning.
    pub async fn build(self) -> Result<Vigil<R, S>, VigilBuilderError> {
        if self.apply_migrations {
            self.storage
                .repositories
                .migrate()
                .await
                .map_err(|e| VigilBuilderError::Migration(e.to_string()))?;
        }

        Ok(Vigil::from_parts(
            self.storage.repositories,
            self.counter_store,
            self.verifier,
            self.config,
        ))
    }
}
