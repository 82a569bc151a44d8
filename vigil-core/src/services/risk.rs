//! Risk scoring over the attempt ledger.
//!
//! A deliberately simple, explainable heuristic: three fixed thresholds over a
//! trailing window of attempts matching the IP or the device fingerprint.
//! Given the same window the score is exactly reproducible; there is no
//! partial credit between thresholds.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::{attempt::RiskSignals, repositories::LoginAttemptRepository, Error};

const FAILED_COUNT_THRESHOLD: u32 = 10;
const FAILED_COUNT_WEIGHT: u8 = 30;
const UNIQUE_USERS_THRESHOLD: u32 = 3;
const UNIQUE_USERS_WEIGHT: u8 = 20;
const UNIQUE_DEVICES_THRESHOLD: u32 = 2;
const UNIQUE_DEVICES_WEIGHT: u8 = 20;

/// Score a set of window aggregates. Additive, clamped to [0, 100].
pub fn score_signals(signals: &RiskSignals) -> u8 {
    let mut score: u8 = 0;
    if signals.failed_count > FAILED_COUNT_THRESHOLD {
        score += FAILED_COUNT_WEIGHT;
    }
    if signals.unique_users > UNIQUE_USERS_THRESHOLD {
        score += UNIQUE_USERS_WEIGHT;
    }
    if signals.unique_devices > UNIQUE_DEVICES_THRESHOLD {
        score += UNIQUE_DEVICES_WEIGHT;
    }
    score.min(100)
}

#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Trailing window the scorer reads. Default 24 hours, independent of the
    /// rate limiter's window: they are separate defense layers.
    pub window: Duration,
    /// Score at or above which the engine escalates to an IP blacklist entry.
    pub escalation_threshold: u8,
    /// Expiry applied to automatically escalated blacklist entries.
    pub escalation_block: Duration,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            window: Duration::hours(24),
            escalation_threshold: 70,
            escalation_block: Duration::hours(24),
        }
    }
}

/// Risk scorer over the attempt ledger.
pub struct RiskScorer<R: LoginAttemptRepository> {
    repository: Arc<R>,
    config: RiskConfig,
}

impl<R: LoginAttemptRepository> RiskScorer<R> {
    pub fn new(repository: Arc<R>, config: RiskConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Score the trailing window for this IP / fingerprint pair.
    pub async fn score(&self, ip_address: &str, device_fingerprint: &str) -> Result<u8, Error> {
        let since = Utc::now() - self.config.window;
        let signals = self
            .repository
            .risk_signals(ip_address, device_fingerprint, since)
            .await?;
        Ok(score_signals(&signals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(failed_count: u32, unique_users: u32, unique_devices: u32) -> RiskSignals {
        RiskSignals {
            failed_count,
            unique_users,
            unique_devices,
        }
    }

    #[test]
    fn test_quiet_window_scores_zero() {
        assert_eq!(score_signals(&signals(0, 0, 0)), 0);
        assert_eq!(score_signals(&signals(10, 3, 2)), 0); // at thresholds, not over
    }

    #[test]
    fn test_each_factor_contributes_independently() {
        assert_eq!(score_signals(&signals(11, 0, 0)), 30);
        assert_eq!(score_signals(&signals(0, 4, 0)), 20);
        assert_eq!(score_signals(&signals(0, 0, 3)), 20);
        assert_eq!(score_signals(&signals(11, 4, 0)), 50);
        assert_eq!(score_signals(&signals(11, 4, 3)), 70);
    }

    #[test]
    fn test_score_is_additive_not_compounding() {
        // Heavily abusive window still sums to 70; no extra credit past the
        // thresholds.
        assert_eq!(score_signals(&signals(50, 10, 10)), 70);
    }

    #[test]
    fn test_score_is_monotonic_in_each_count() {
        let counts = [0u32, 1, 2, 3, 4, 10, 11, 50];
        for &base_users in &counts {
            for &base_devices in &counts {
                let mut last = 0;
                for &failed in &counts {
                    let score = score_signals(&signals(failed, base_users, base_devices));
                    assert!(score >= last);
                    last = score;
                }
            }
        }
        for &base_failed in &counts {
            let mut last = 0;
            for &users in &counts {
                let score = score_signals(&signals(base_failed, users, 0));
                assert!(score >= last);
                last = score;
            }
            let mut last = 0;
            for &devices in &counts {
                let score = score_signals(&signals(base_failed, 0, devices));
                assert!(score >= last);
                last = score;
            }
        }
    }

    #[test]
    fn test_score_is_bounded() {
        for failed in [0u32, 11, u32::MAX] {
            for users in [0u32, 4, u32::MAX] {
                for devices in [0u32, 3, u32::MAX] {
                    assert!(score_signals(&signals(failed, users, devices)) <= 100);
                }
            }
        }
    }
}
