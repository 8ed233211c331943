//! Same-origin session routes served to the browser: the refresh endpoint the
//! browser-side token source calls, and logout.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::cache::token::{classify, TokenState};
use crate::config::settings::AuthConfig;
use crate::observability::metrics::get_metrics;
use crate::server::server::AppState;
use crate::session::cookies::{CookieJar, SessionCookies};
use crate::session::logout::resolve_return_to;
use crate::sources::identity_provider::IdentityProvider;

#[derive(Clone)]
pub struct SessionState {
    auth: Arc<AuthConfig>,
    identity_provider: Arc<dyn IdentityProvider>,
}

impl SessionState {
    pub fn new(auth: AuthConfig, identity_provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            auth: Arc::new(auth),
            identity_provider,
        }
    }

    pub async fn router(&self) -> Router<AppState> {
        info!("served path: {}", self.auth.refresh_path());
        info!("served path: {}", self.auth.logout_path());
        Router::new()
            .route(self.auth.refresh_path(), post(refresh_session))
            .route(self.auth.logout_path(), get(logout).post(logout))
    }

    fn cookies(&self, jar: CookieJar) -> SessionCookies {
        SessionCookies::new(
            Arc::new(jar),
            self.auth.cookies.clone(),
            self.auth.session_duration_minutes(),
        )
    }

    async fn refresh(&self, cookies: &SessionCookies) -> RefreshReply {
        let grace_seconds = self.auth.grace_seconds();

        if let Some(existing) = cookies.session_jwt() {
            if classify(Some(&existing), grace_seconds) == TokenState::Valid {
                debug!("returning existing valid jwt");
                return RefreshReply::Existing(existing);
            }
            debug!("existing jwt is expired, fetching new one");
        }

        let Some(session_token) = cookies.session_token() else {
            warn!("no session token found in cookies");
            return RefreshReply::Rejected("session_not_found");
        };

        debug!("exchanging session token for new jwt");
        match self
            .identity_provider
            .authenticate(&session_token, self.auth.session_duration_minutes())
            .await
        {
            Ok(jwt) if jwt.is_empty() => {
                error!("identity provider response missing session jwt");
                RefreshReply::Rejected("session_missing_jwt")
            }
            Ok(jwt) if classify(Some(&jwt), grace_seconds) != TokenState::Valid => {
                error!("newly issued jwt is already expired");
                RefreshReply::Rejected("session_jwt_expired")
            }
            Ok(jwt) => {
                info!("issued new session jwt");
                cookies.persist_session_jwt(&jwt);
                RefreshReply::Issued(jwt)
            }
            Err(e) => {
                error!("identity provider authentication failed: {}", e);
                cookies.clear();
                RefreshReply::Rejected("session_invalid")
            }
        }
    }
}

enum RefreshReply {
    Existing(String),
    Issued(String),
    Rejected(&'static str),
}

impl RefreshReply {
    fn result(&self) -> &'static str {
        match self {
            RefreshReply::Existing(_) => "existing",
            RefreshReply::Issued(_) => "issued",
            RefreshReply::Rejected(code) => *code,
        }
    }
}

impl IntoResponse for RefreshReply {
    fn into_response(self) -> Response {
        match self {
            RefreshReply::Existing(jwt) | RefreshReply::Issued(jwt) => Json(json!({ "sessionJwt": jwt })).into_response(),
            RefreshReply::Rejected(code) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "sessionJwt": null, "error": code })),
            )
                .into_response(),
        }
    }
}

async fn refresh_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let metrics = get_metrics().await;
    let jar = CookieJar::from_headers(&headers);
    let cookies = state.session_state.cookies(jar.clone());

    let reply = state.session_state.refresh(&cookies).await;
    metrics.endpoint_responses.with_label_values(&[reply.result()]).inc();

    (jar.take_set_cookie_headers(), reply).into_response()
}

#[derive(Debug, Deserialize)]
struct LogoutQuery {
    #[serde(rename = "returnTo")]
    return_to: Option<String>,
}

async fn logout(
    State(state): State<AppState>,
    Query(query): Query<LogoutQuery>,
    headers: HeaderMap,
) -> Response {
    let redirect_path = resolve_return_to(query.return_to.as_deref());
    let jar = CookieJar::from_headers(&headers);
    let cookies = state.session_state.cookies(jar.clone());

    if let Some(session_token) = cookies.session_token() {
        // the user is leaving either way
        if let Err(e) = state.session_state.identity_provider.revoke(&session_token).await {
            debug!("session revoke failed: {}", e);
        }
    }
    cookies.clear();
    info!(redirect = %redirect_path, "session logged out");

    (jar.take_set_cookie_headers(), Redirect::temporary(&redirect_path)).into_response()
}
