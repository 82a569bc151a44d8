//! Login attempt records and their windowed aggregates.
//!
//! A [`LoginAttempt`] is an immutable fact: once written to the ledger it is
//! never mutated, and its database-assigned id preserves insertion order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::ValidationError, Error};

/// A recorded login attempt, successful or not.
///
/// The `risk_score` is computed from the trailing window *before* this attempt
/// was recorded; an attempt never contributes to its own score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub id: i64,
    pub user_id: String,
    pub ip_address: String,
    pub device_fingerprint: String,
    pub user_agent: String,
    pub success: bool,
    pub risk_score: u8,
    /// Opaque enrichment bag; the engine stores it and never interprets it.
    pub geo_location: Option<serde_json::Value>,
    pub attempted_at: DateTime<Utc>,
}

/// A login attempt about to be recorded. The ledger assigns id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLoginAttempt {
    pub user_id: String,
    pub ip_address: String,
    pub device_fingerprint: String,
    pub user_agent: String,
    pub success: bool,
    pub risk_score: u8,
    pub geo_location: Option<serde_json::Value>,
}

impl NewLoginAttempt {
    pub fn builder() -> NewLoginAttemptBuilder {
        NewLoginAttemptBuilder::default()
    }
}

#[derive(Default)]
pub struct NewLoginAttemptBuilder {
    user_id: Option<String>,
    ip_address: Option<String>,
    device_fingerprint: Option<String>,
    user_agent: Option<String>,
    success: Option<bool>,
    risk_score: u8,
    geo_location: Option<serde_json::Value>,
}

impl NewLoginAttemptBuilder {
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    pub fn device_fingerprint(mut self, device_fingerprint: impl Into<String>) -> Self {
        self.device_fingerprint = Some(device_fingerprint.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    pub fn risk_score(mut self, risk_score: u8) -> Self {
        self.risk_score = risk_score;
        self
    }

    pub fn geo_location(mut self, geo_location: Option<serde_json::Value>) -> Self {
        self.geo_location = geo_location;
        self
    }

    pub fn build(self) -> Result<NewLoginAttempt, Error> {
        Ok(NewLoginAttempt {
            user_id: self
                .user_id
                .ok_or(ValidationError::MissingField("user_id".to_string()))?,
            ip_address: self
                .ip_address
                .ok_or(ValidationError::MissingField("ip_address".to_string()))?,
            device_fingerprint: self.device_fingerprint.ok_or(ValidationError::MissingField(
                "device_fingerprint".to_string(),
            ))?,
            user_agent: self.user_agent.unwrap_or_default(),
            success: self
                .success
                .ok_or(ValidationError::MissingField("success".to_string()))?,
            risk_score: self.risk_score,
            geo_location: self.geo_location,
        })
    }
}

/// Aggregate counts over a trailing ledger window, keyed by IP or device
/// fingerprint match. Input to the risk scorer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSignals {
    pub failed_count: u32,
    pub unique_users: u32,
    pub unique_devices: u32,
}
