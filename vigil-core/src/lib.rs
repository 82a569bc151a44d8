//! Core functionality for the vigil login-defense engine
//!
//! This crate contains the decision engine that sits in front of an
//! authentication endpoint and decides, per login attempt, whether to allow
//! it, block it temporarily, or escalate to a longer-lived penalty.
//!
//! The moving parts, leaf first:
//!
//! - [`repositories`] — traits over the relational store: the append-only
//!   attempt ledger, the IP blacklist, and per-user lockout state.
//! - [`store`] — the [`store::CounterStore`] trait over the shared fast store
//!   holding rate-limit counters, plus an in-memory implementation.
//! - [`services`] — the rate limiter, risk scorer, lockout state machine,
//!   blacklist service, and the [`services::DecisionEngine`] composing them
//!   into a single [`services::Verdict`] per attempt.
//!
//! Storage backends implement the repository traits; see the
//! `vigil-storage-sqlite` crate for the SQLite implementation and the `vigil`
//! crate for the assembled, user-facing surface.

pub mod attempt;
pub mod blacklist;
pub mod error;
pub mod lock;
pub mod repositories;
pub mod services;
pub mod store;
pub mod validation;

pub use attempt::{LoginAttempt, NewLoginAttempt, RiskSignals};
pub use blacklist::BlacklistEntry;
pub use error::Error;
pub use lock::{LockoutStatus, UserLockState};
pub use services::{
    CredentialVerifier, DecisionEngine, EngineConfig, FailurePolicy, LoginRequest, Verdict,
};
