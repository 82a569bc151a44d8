//! Repository traits for the data access layer
//!
//! This module defines the repository interfaces that services use to interact
//! with the relational store. The traits provide a clean abstraction over the
//! underlying storage implementation.
//!
//! # Trait Hierarchy
//!
//! - Individual `*Repository` traits define the operations for each data domain
//! - Individual `*RepositoryProvider` traits provide access to each repository type
//! - [`RepositoryProvider`] is a supertrait combining all provider traits plus
//!   lifecycle methods (migrations, health checks)
//!
//! The fast-store side of the engine lives behind
//! [`crate::store::CounterStore`], not here: rate-limit counters are ephemeral
//! TTL'd state, not durable records.

pub mod adapter;
pub mod attempts;
pub mod blacklist;
pub mod credentials;
pub mod user_lock;

pub use adapter::{
    AttemptRepositoryAdapter, BlacklistRepositoryAdapter, CredentialRepositoryAdapter,
    UserLockRepositoryAdapter,
};
pub use attempts::LoginAttemptRepository;
pub use blacklist::IpBlacklistRepository;
pub use credentials::CredentialRepository;
pub use user_lock::UserLockRepository;

use async_trait::async_trait;

use crate::Error;

/// Provider trait for login-attempt ledger access.
pub trait LoginAttemptRepositoryProvider: Send + Sync + 'static {
    /// The ledger repository implementation type
    type AttemptRepo: LoginAttemptRepository;

    /// Get the login-attempt repository
    fn attempts(&self) -> &Self::AttemptRepo;
}

/// Provider trait for IP blacklist repository access.
pub trait IpBlacklistRepositoryProvider: Send + Sync + 'static {
    /// The blacklist repository implementation type
    type BlacklistRepo: IpBlacklistRepository;

    /// Get the IP blacklist repository
    fn blacklist(&self) -> &Self::BlacklistRepo;
}

/// Provider trait for user lock-state repository access.
pub trait UserLockRepositoryProvider: Send + Sync + 'static {
    /// The user lock repository implementation type
    type UserLockRepo: UserLockRepository;

    /// Get the user lock repository
    fn user_lock(&self) -> &Self::UserLockRepo;
}

/// Provider trait for credential-digest repository access.
pub trait CredentialRepositoryProvider: Send + Sync + 'static {
    /// The credential repository implementation type
    type CredentialRepo: CredentialRepository;

    /// Get the credential repository
    fn credentials(&self) -> &Self::CredentialRepo;
}

/// Provider trait that storage implementations must implement to provide all
/// repositories, plus lifecycle methods.
///
/// # Implementing a Custom Storage Backend
///
/// 1. Implement each individual `*Repository` trait for your backend
/// 2. Implement each individual `*RepositoryProvider` trait
/// 3. Implement this trait with `migrate()` and `health_check()`
#[async_trait]
pub trait RepositoryProvider:
    LoginAttemptRepositoryProvider
    + IpBlacklistRepositoryProvider
    + UserLockRepositoryProvider
    + CredentialRepositoryProvider
{
    /// Run migrations for all repositories
    async fn migrate(&self) -> Result<(), Error>;

    /// Health check for all repositories
    async fn health_check(&self) -> Result<(), Error>;
}
