use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::cache::token::{decode_access_token, AccessClaims};
use crate::config::settings::IdentityProviderConfig;

/// Session API of the identity provider. Failures are errors here; sources
/// turn them into values.
#[async_trait]
pub trait IdentityProvider: Send + Sync + std::fmt::Debug {
    /// Exchange a long-lived session token for a session JWT valid for `duration_minutes`.
    /// An empty string means the provider accepted the session but issued no JWT.
    async fn authenticate(&self, session_token: &str, duration_minutes: u64) -> Result<String>;

    /// Verify a session JWT and return its claims
    async fn authenticate_jwt(&self, session_jwt: &str) -> Result<AccessClaims>;

    async fn revoke(&self, session_token: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct AuthenticateRequest<'a> {
    session_token: &'a str,
    session_duration_minutes: u64,
}

#[derive(Debug, Deserialize)]
struct AuthenticateResponse {
    session_jwt: Option<String>,
}

/// JSON-over-HTTP identity provider client using project credentials as basic auth
#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    client: Client,
    cfg: IdentityProviderConfig,
}

impl HttpIdentityProvider {
    pub fn new(cfg: IdentityProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.timeout())
            .build()
            .context("failed to build identity provider HTTP client")?;
        Ok(Self { client, cfg })
    }

    async fn post(&self, url: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .basic_auth(&self.cfg.project_id, Some(&self.cfg.secret))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!("identity provider request to {} failed: {}", url, response.status()));
        }
        Ok(response)
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn authenticate(&self, session_token: &str, duration_minutes: u64) -> Result<String> {
        let body = serde_json::to_value(AuthenticateRequest {
            session_token,
            session_duration_minutes: duration_minutes,
        })?;
        let response: AuthenticateResponse = self.post(&self.cfg.authenticate_url, body).await?.json().await?;
        Ok(response.session_jwt.unwrap_or_default())
    }

    async fn authenticate_jwt(&self, session_jwt: &str) -> Result<AccessClaims> {
        let Some(url) = &self.cfg.authenticate_jwt_url else {
            debug!("no authenticate_jwt_url configured, decoding claims locally");
            return decode_access_token(session_jwt).map_err(|e| anyhow!(e));
        };
        let response: AuthenticateResponse = self
            .post(url, json!({ "session_jwt": session_jwt }))
            .await?
            .json()
            .await?;
        // the provider may hand back a reissued jwt
        let jwt = response.session_jwt.unwrap_or_else(|| session_jwt.to_owned());
        decode_access_token(&jwt).map_err(|e| anyhow!(e))
    }

    async fn revoke(&self, session_token: &str) -> Result<()> {
        let url = self
            .cfg
            .revoke_url
            .as_deref()
            .ok_or_else(|| anyhow!("identity_provider.revoke_url is not configured"))?;
        self.post(url, json!({ "session_token": session_token })).await?;
        Ok(())
    }
}
