//! Input validation applied before any store access.
//!
//! Malformed identifiers are rejected here so that an attacker cannot make the
//! engine spend store round-trips (or pollute rate-limit keys) with garbage.

use std::net::IpAddr;

use crate::{error::ValidationError, Error};

const MAX_IDENTIFIER_LEN: usize = 255;

/// Validate an IP address (v4 or v6).
pub fn validate_ip_address(ip: &str) -> Result<IpAddr, Error> {
    ip.parse::<IpAddr>()
        .map_err(|_| ValidationError::InvalidIpAddress(ip.to_string()).into())
}

/// Validate an opaque identifier (user id, device fingerprint): non-empty,
/// bounded length, no control characters.
pub fn validate_identifier(identifier: &str) -> Result<(), Error> {
    if identifier.is_empty() || identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::InvalidIdentifier(identifier.to_string()).into());
    }
    if identifier.chars().any(char::is_control) {
        return Err(ValidationError::InvalidIdentifier(identifier.to_string()).into());
    }
    Ok(())
}
