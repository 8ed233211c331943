//! Error taxonomy of the token lifecycle and of the API client wrapping it.

use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

/// Why no usable access token could be produced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Nothing cached and nothing stored.
    #[error("no access token available")]
    NoToken,

    /// Wrong structural shape or missing required claims.
    #[error("malformed access token: {0}")]
    MalformedToken(String),

    /// Structurally valid but past expiry minus the grace window.
    #[error("access token expired at {exp}")]
    ExpiredToken { exp: u64 },

    /// Every refresh attempt failed.
    #[error("token refresh failed after {attempts} attempts")]
    RefreshExhausted { attempts: u32 },

    /// The shared refresh did not settle in time.
    #[error("token refresh timed out after {after:?}")]
    RefreshTimedOut { after: Duration },
}

/// Errors surfaced by [`crate::client::api_client::ApiClient`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// The single terminal, user-visible failure: the session could not be recovered.
    #[error("Session expired")]
    SessionExpired {
        /// Login entry point with the requested path preserved as `returnTo`.
        redirect_to: String,
    },

    #[error("API Error {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}
