//! Service layer for the decision engine
//!
//! This module contains concrete service implementations that encapsulate the
//! login-defense logic: quota consumption, the attempt ledger, risk scoring,
//! account lockout, the IP blacklist, and the decision engine composing them.

pub mod blacklist;
pub mod engine;
pub mod ledger;
pub mod lockout;
pub mod rate_limit;
pub mod risk;

pub use blacklist::IpBlacklistService;
pub use engine::{CredentialVerifier, DecisionEngine, EngineConfig, LoginRequest, Verdict};
pub use ledger::LoginAttemptLedger;
pub use lockout::{AccountLockoutService, LockoutConfig};
pub use rate_limit::{FailurePolicy, RateLimitConfig, RateLimitDecision, RateLimitService};
pub use risk::{score_signals, RiskConfig, RiskScorer};
