use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{de, Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::TokenError;
use crate::helpers::time::now_u64;

/// Decoded payload of a session JWT. `exp` and `iat` are mandatory.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccessClaims {
    #[serde(deserialize_with = "numeric_date")]
    pub exp: u64,
    #[serde(deserialize_with = "numeric_date")]
    pub iat: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccessClaims {
    /// Expired when `exp <= now + grace`; the boundary itself counts as expired.
    pub fn is_expired_at(&self, now: u64, grace_seconds: u64) -> bool {
        let expired = self.exp <= now.saturating_add(grace_seconds);
        if expired {
            debug!(
                exp = self.exp,
                time_to_expiry = self.exp as i64 - now as i64,
                grace_seconds,
                "token expired or expiring soon"
            );
        }
        expired
    }

    pub fn is_expired(&self, grace_seconds: u64) -> bool {
        self.is_expired_at(now_u64(), grace_seconds)
    }
}

/// NumericDate may carry a fractional part; whole seconds are kept.
fn numeric_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value < 0.0 {
        return Err(de::Error::custom(format!("invalid NumericDate {value}")));
    }
    Ok(value.floor() as u64)
}

/// Derived state of a token string; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    None,
    Invalid,
    Expired,
    Valid,
}

impl TokenState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenState::None => "none",
            TokenState::Invalid => "invalid",
            TokenState::Expired => "expired",
            TokenState::Valid => "valid",
        }
    }
}

impl fmt::Display for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decode the payload segment of a JWT without verifying its signature.
///
/// Fails closed: anything that is not three segments with a JSON payload
/// carrying non-zero `exp` and `iat` is rejected.
pub fn decode_access_token(token: &str) -> Result<AccessClaims, TokenError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(TokenError::MalformedToken(format!(
            "expected 3 segments, got {}",
            parts.len()
        )));
    }

    let decoded = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| TokenError::MalformedToken(format!("base64 decode error: {e}")))?;

    let claims: AccessClaims = serde_json::from_slice(&decoded)
        .map_err(|e| TokenError::MalformedToken(format!("invalid payload: {e}")))?;

    if claims.exp == 0 || claims.iat == 0 {
        return Err(TokenError::MalformedToken(
            "missing required claims (exp, iat)".to_owned(),
        ));
    }
    Ok(claims)
}

/// Decode and check expiry in one step.
pub fn validate_access_token(token: &str, now: u64, grace_seconds: u64) -> Result<AccessClaims, TokenError> {
    let claims = decode_access_token(token)?;
    if claims.is_expired_at(now, grace_seconds) {
        return Err(TokenError::ExpiredToken { exp: claims.exp });
    }
    Ok(claims)
}

/// Like [`validate_access_token`] for a token that may be absent
pub fn check_access_token(token: Option<&str>, now: u64, grace_seconds: u64) -> Result<AccessClaims, TokenError> {
    match token {
        Some(value) if !value.is_empty() => validate_access_token(value, now, grace_seconds),
        _ => Err(TokenError::NoToken),
    }
}

pub fn classify_at(token: Option<&str>, now: u64, grace_seconds: u64) -> TokenState {
    match check_access_token(token, now, grace_seconds) {
        Ok(_) => TokenState::Valid,
        Err(TokenError::NoToken) => TokenState::None,
        Err(TokenError::ExpiredToken { .. }) => TokenState::Expired,
        Err(_) => TokenState::Invalid,
    }
}

pub fn classify(token: Option<&str>, grace_seconds: u64) -> TokenState {
    classify_at(token, now_u64(), grace_seconds)
}
