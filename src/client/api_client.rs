//! Backend API client: attaches the resolved bearer token, recovers from a
//! single 401 by refreshing, and surfaces "Session expired" when it cannot.

use std::sync::Arc;

use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::cache::token::TokenState;
use crate::errors::ApiError;
use crate::session::resolver::{AccessTokenResolver, ResolveOptions};

const BEARER_PREFIX: &str = "Bearer ";

/// Per-request overrides
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// merged over the client's default headers
    pub headers: HeaderMap,
    /// send without a bearer token and pass a 401 through as a plain status error
    pub skip_auth: bool,
    /// path preserved in the login redirect when the session ends, `/` when unset
    pub return_to: Option<String>,
}

impl RequestOptions {
    pub fn skip_auth() -> Self {
        Self { skip_auth: true, ..Self::default() }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    default_headers: HeaderMap,
    resolver: Arc<AccessTokenResolver>,
}

impl ApiClient {
    pub fn new(client: Client, base_url: impl Into<String>, resolver: Arc<AccessTokenResolver>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            default_headers: HeaderMap::new(),
            resolver,
        }
    }

    pub fn with_default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = headers;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str, options: RequestOptions) -> Result<T, ApiError> {
        self.request(Method::GET, endpoint, None, options).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, endpoint, Some(body), options).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body)?;
        self.request(Method::PUT, endpoint, Some(body), options).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str, options: RequestOptions) -> Result<T, ApiError> {
        self.request(Method::DELETE, endpoint, None, options).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let mut headers = self.default_headers.clone();
        headers.extend(options.headers.clone());
        if body.is_some() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let attached_token = if !options.skip_auth && !headers.contains_key(AUTHORIZATION) {
            let token = self.resolver.resolve_access_token(ResolveOptions::default()).await;
            if let Some(token) = &token {
                set_bearer(&mut headers, token);
            }
            token
        } else {
            headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix(BEARER_PREFIX))
                .map(str::to_owned)
        };

        let response = self.send(&method, &url, &headers, body.as_ref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED || options.skip_auth {
            return read_json(response).await;
        }

        // one refresh, one retry
        let token_state = self.resolver.classify(attached_token.as_deref());
        if matches!(token_state, TokenState::Expired | TokenState::Invalid) {
            warn!(url = %url, state = %token_state, "request unauthorized due to token state");
        }
        let refreshed = match token_state {
            TokenState::Valid => self.resolver.resolve_access_token(ResolveOptions::force()).await,
            _ => self.resolver.refresh().await.ok(),
        };
        let Some(refreshed) = refreshed else {
            return Err(self.session_expired(options.return_to.as_deref()).await);
        };

        info!(url = %url, state = %token_state, "retrying request with refreshed token");
        set_bearer(&mut headers, &refreshed);
        let retry = self.send(&method, &url, &headers, body.as_ref()).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            return Err(self.session_expired(options.return_to.as_deref()).await);
        }
        read_json(retry).await
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        headers: &HeaderMap,
        body: Option<&Value>,
    ) -> Result<Response, ApiError> {
        let mut request = self.client.request(method.clone(), url).headers(headers.clone());
        if let Some(body) = body {
            request = request.body(serde_json::to_vec(body)?);
        }
        Ok(request.send().await?)
    }

    async fn session_expired(&self, return_to: Option<&str>) -> ApiError {
        let redirect_to = self.resolver.logout(return_to.unwrap_or("/")).await;
        info!(redirect_to = %redirect_to, "session could not be recovered");
        ApiError::SessionExpired { redirect_to }
    }
}

fn set_bearer(headers: &mut HeaderMap, token: &str) {
    match HeaderValue::from_str(&format!("{BEARER_PREFIX}{token}")) {
        Ok(value) => {
            headers.insert(AUTHORIZATION, value);
        }
        Err(_) => warn!("access token is not a valid header value, sending without it"),
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let bytes = response.bytes().await.unwrap_or_default();
        let message = serde_json::from_slice::<ErrorBody>(&bytes)
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_owned());
        return Err(ApiError::Status { status, message });
    }
    let bytes = response.bytes().await?;
    let body: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
    Ok(serde_json::from_slice(body)?)
}
