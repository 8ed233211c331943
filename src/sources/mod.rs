//! Token sources: one attempt at obtaining a fresh session JWT.
//!
//! Two strategies exist and one is picked per process at construction time:
//! - [`session_endpoint::SessionEndpointSource`]: browser-style, calls the
//!   same-origin refresh endpoint with the session cookies attached
//! - [`session_exchange::SessionExchangeSource`]: server-style, exchanges the
//!   long-lived session cookie with the identity provider directly

use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::config::settings::AuthConfig;
use crate::session::cookies::SessionCookies;

pub mod identity_provider;
pub mod session_endpoint;
pub mod session_exchange;

use identity_provider::IdentityProvider;
use session_endpoint::SessionEndpointSource;
use session_exchange::SessionExchangeSource;

/// Why an attempt produced no token. Sources report failures as values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// no session artifact to exchange
    NoSession,
    Transport(String),
    Rejected(u16),
    MalformedResponse(String),
    Provider(String),
}

impl FetchFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            FetchFailure::NoSession => "no_session",
            FetchFailure::Transport(_) => "transport",
            FetchFailure::Rejected(_) => "rejected",
            FetchFailure::MalformedResponse(_) => "malformed_response",
            FetchFailure::Provider(_) => "provider",
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::NoSession => f.write_str("no session token available"),
            FetchFailure::Transport(e) => write!(f, "transport error: {e}"),
            FetchFailure::Rejected(status) => write!(f, "refresh rejected with status {status}"),
            FetchFailure::MalformedResponse(e) => write!(f, "malformed response: {e}"),
            FetchFailure::Provider(e) => write!(f, "identity provider error: {e}"),
        }
    }
}

pub type FetchResult = Result<String, FetchFailure>;

#[async_trait]
pub trait TokenSource: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Exactly one attempt; never panics or propagates errors.
    async fn fetch_fresh_token(&self) -> FetchResult;
}

/// Execution context deciding which strategy is used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeContext {
    Browser,
    Server,
}

pub fn build_source(
    context: RuntimeContext,
    auth: &AuthConfig,
    cookies: SessionCookies,
    client: Client,
    identity_provider: Option<Arc<dyn IdentityProvider>>,
) -> Result<Arc<dyn TokenSource>> {
    match context {
        RuntimeContext::Browser => {
            let refresh_url = auth
                .refresh_url
                .clone()
                .ok_or_else(|| anyhow!("auth.refresh_url is required in browser context"))?;
            Ok(Arc::new(SessionEndpointSource::new(client, refresh_url, cookies)))
        }
        RuntimeContext::Server => {
            let identity_provider = identity_provider
                .ok_or_else(|| anyhow!("identity_provider config is required in server context"))?;
            Ok(Arc::new(SessionExchangeSource::new(
                identity_provider,
                cookies,
                auth.session_duration_minutes(),
            )))
        }
    }
}
