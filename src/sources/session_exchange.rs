use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::session::cookies::SessionCookies;
use crate::sources::identity_provider::IdentityProvider;
use crate::sources::{FetchFailure, FetchResult, TokenSource};

/// Server-style source: exchanges the long-lived session cookie of the current
/// request with the identity provider. Persisting the result is left to the caller.
#[derive(Debug, Clone)]
pub struct SessionExchangeSource {
    identity_provider: Arc<dyn IdentityProvider>,
    cookies: SessionCookies,
    session_duration_minutes: u64,
}

impl SessionExchangeSource {
    pub fn new(
        identity_provider: Arc<dyn IdentityProvider>,
        cookies: SessionCookies,
        session_duration_minutes: u64,
    ) -> Self {
        Self { identity_provider, cookies, session_duration_minutes }
    }
}

#[async_trait]
impl TokenSource for SessionExchangeSource {
    fn name(&self) -> &str {
        "session_exchange"
    }

    async fn fetch_fresh_token(&self) -> FetchResult {
        let session_token = self.cookies.session_token().ok_or(FetchFailure::NoSession)?;

        debug!(duration_minutes = self.session_duration_minutes, "exchanging session token");
        let token = self
            .identity_provider
            .authenticate(&session_token, self.session_duration_minutes)
            .await
            .map_err(|e| {
                warn!("session exchange failed: {}", e);
                FetchFailure::Provider(e.to_string())
            })?;
        if token.is_empty() {
            return Err(FetchFailure::MalformedResponse("missing session_jwt".to_owned()));
        }
        Ok(token)
    }
}
