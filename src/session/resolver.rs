use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::token::{classify, validate_access_token, TokenState};
use crate::cache::token_cache::TokenCache;
use crate::config::settings::AuthConfig;
use crate::errors::TokenError;
use crate::helpers::time::now_u64;
use crate::observability::metrics::get_metrics;
use crate::resilience::coordinator::{RefreshCoordinator, RefreshOutcome};
use crate::resilience::retry::RetrySettings;
use crate::session::cookies::SessionCookies;
use crate::session::logout::login_redirect;
use crate::sources::{RuntimeContext, TokenSource};

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// skip the cache and stored-cookie fast paths
    pub force_refresh: bool,
}

impl ResolveOptions {
    pub fn force() -> Self {
        Self { force_refresh: true }
    }
}

/// Entry point for every outbound API call that needs a bearer token.
///
/// Construct one per process (or per browser tab) and share it behind an `Arc`.
pub struct AccessTokenResolver {
    context: RuntimeContext,
    cache: TokenCache,
    coordinator: RefreshCoordinator,
    cookies: SessionCookies,
    grace_seconds: u64,
    login_path: String,
}

impl AccessTokenResolver {
    pub fn new(
        context: RuntimeContext,
        source: Arc<dyn TokenSource>,
        cookies: SessionCookies,
        auth: &AuthConfig,
    ) -> Self {
        let cache = TokenCache::new();
        let coordinator = RefreshCoordinator::new(
            source,
            cache.clone(),
            RetrySettings::from_config(auth.retry.as_ref()),
            auth.grace_seconds(),
            auth.refresh_timeout(),
        );
        Self {
            context,
            cache,
            coordinator,
            cookies,
            grace_seconds: auth.grace_seconds(),
            login_path: auth.login_path().to_owned(),
        }
    }

    /// Resolve a usable token, or `None` once the session could not be recovered.
    pub async fn resolve_access_token(&self, options: ResolveOptions) -> Option<String> {
        self.resolve_access_token_detailed(options).await.ok()
    }

    pub async fn resolve_access_token_detailed(&self, options: ResolveOptions) -> Result<String, TokenError> {
        let metrics = get_metrics().await;

        if !options.force_refresh {
            if let Some(cached) = self.cache.read().await {
                if !cached.claims.is_expired(self.grace_seconds) {
                    debug!("using cached access token");
                    metrics.resolve_requests.with_label_values(&["cache"]).inc();
                    return Ok(cached.token);
                }
            }

            if let Some(stored) = self.cookies.session_jwt() {
                debug!("evaluating stored access token freshness");
                match validate_access_token(&stored, now_u64(), self.grace_seconds) {
                    Ok(claims) => {
                        self.cache.write(stored.clone(), claims).await;
                        if self.context == RuntimeContext::Browser {
                            self.cookies.persist_session_jwt(&stored);
                        }
                        debug!("stored token still valid");
                        metrics.resolve_requests.with_label_values(&["stored"]).inc();
                        return Ok(stored);
                    }
                    Err(e) => debug!("stored token unusable: {}", e),
                }
            }
        }

        info!(force_refresh = options.force_refresh, "stored token missing or expired, initiating refresh");
        match self.refresh().await {
            Ok(token) => {
                metrics.resolve_requests.with_label_values(&["refreshed"]).inc();
                Ok(token)
            }
            Err(e) => {
                info!("refresh failed, clearing session: {}", e);
                metrics.resolve_requests.with_label_values(&["failed"]).inc();
                self.clear_session().await;
                Err(e)
            }
        }
    }

    /// De-duplicated refresh without the fast paths or the teardown on failure
    pub async fn refresh(&self) -> RefreshOutcome {
        self.coordinator.refresh().await
    }

    pub fn classify(&self, token: Option<&str>) -> TokenState {
        classify(token, self.grace_seconds)
    }

    /// Immediate invalidation, used by explicit logout
    pub async fn reset_cache(&self) {
        self.coordinator.reset().await;
        self.cache.clear().await;
    }

    /// Drop cached state and both session cookies
    pub async fn clear_session(&self) {
        self.cache.clear().await;
        self.cookies.clear();
    }

    /// Tear the session down and return where the user should be sent
    pub async fn logout(&self, current_path: &str) -> String {
        self.reset_cache().await;
        self.cookies.clear();
        login_redirect(&self.login_path, current_path)
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    pub fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    pub fn is_refreshing(&self) -> bool {
        self.coordinator.is_refreshing()
    }
}
