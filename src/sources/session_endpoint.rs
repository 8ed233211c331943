use async_trait::async_trait;
use http::header::{CONTENT_TYPE, COOKIE};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::session::cookies::{apply_set_cookie_headers, SessionCookies};
use crate::sources::{FetchFailure, FetchResult, TokenSource};

/// Body of the refresh endpoint, both on success and on failure
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    #[serde(rename = "sessionJwt")]
    pub session_jwt: Option<String>,
    pub error: Option<String>,
}

/// Browser-style source: POSTs to the same-origin refresh endpoint with the
/// session cookies attached and keeps the returned JWT in the cookie store.
#[derive(Debug, Clone)]
pub struct SessionEndpointSource {
    client: Client,
    refresh_url: String,
    cookies: SessionCookies,
}

impl SessionEndpointSource {
    pub fn new(client: Client, refresh_url: String, cookies: SessionCookies) -> Self {
        Self { client, refresh_url, cookies }
    }
}

#[async_trait]
impl TokenSource for SessionEndpointSource {
    fn name(&self) -> &str {
        "session_endpoint"
    }

    async fn fetch_fresh_token(&self) -> FetchResult {
        let mut request = self
            .client
            .post(&self.refresh_url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(cookie_header) = self.cookies.store.cookie_header() {
            request = request.header(COOKIE, cookie_header);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchFailure::Transport(e.to_string()))?;

        // mirror what a browser does with Set-Cookie, e.g. deletion of an invalid session
        apply_set_cookie_headers(self.cookies.store.as_ref(), response.headers());

        let status = response.status();
        if !status.is_success() {
            let reason = response
                .json::<RefreshResponse>()
                .await
                .ok()
                .and_then(|body| body.error);
            warn!(status = status.as_u16(), reason = ?reason, "refresh endpoint rejected request");
            return Err(FetchFailure::Rejected(status.as_u16()));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| FetchFailure::MalformedResponse(e.to_string()))?;

        match body.session_jwt.filter(|token| !token.is_empty()) {
            Some(token) => {
                debug!("refresh endpoint returned a session jwt");
                self.cookies.persist_session_jwt(&token);
                Ok(token)
            }
            None => Err(FetchFailure::MalformedResponse("missing sessionJwt".to_owned())),
        }
    }
}
