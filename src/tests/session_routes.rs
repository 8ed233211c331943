// Refresh and logout routes served by axum, exercised over HTTP, plus the
// browser-side source talking to them.

#[cfg(test)]
mod test {

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use http::header::{COOKIE, LOCATION, SET_COOKIE};
    use http::StatusCode;
    use reqwest::redirect::Policy;
    use reqwest::Client;
    use serde_json::Value;

    use crate::cache::token::{decode_access_token, AccessClaims};
    use crate::config::settings::{MetricsConfig, ServerConfig, SettingsConfig};
    use crate::observability::metrics::get_metrics;
    use crate::server::server::{router, AppState};
    use crate::session::cookies::{CookieJar, CookieStore};
    use crate::sources::identity_provider::IdentityProvider;
    use crate::sources::session_endpoint::SessionEndpointSource;
    use crate::sources::{FetchFailure, TokenSource};
    use crate::tests::common::{auth_config, build_reqwest_client, jwt_expiring_in, session_cookies, spawn_axum};
    use crate::utils::constants::{SESSION_COOKIE_NAME, SESSION_JWT_COOKIE_NAME};

    #[derive(Debug)]
    struct StubProvider {
        issued: Result<String, String>,
        calls: AtomicUsize,
        revoked: Mutex<Vec<String>>,
    }

    impl StubProvider {
        fn issuing(issued: Result<String, String>) -> Arc<Self> {
            Arc::new(Self { issued, calls: AtomicUsize::new(0), revoked: Mutex::new(Vec::new()) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdentityProvider for StubProvider {
        async fn authenticate(&self, _session_token: &str, _duration_minutes: u64) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.issued.clone().map_err(|e| anyhow!(e))
        }

        async fn authenticate_jwt(&self, session_jwt: &str) -> Result<AccessClaims> {
            Ok(decode_access_token(session_jwt)?)
        }

        async fn revoke(&self, session_token: &str) -> Result<()> {
            self.revoked.lock().unwrap().push(session_token.to_owned());
            Ok(())
        }
    }

    fn settings() -> SettingsConfig {
        SettingsConfig {
            metrics: MetricsConfig { path: "/metrics".to_owned(), is_enabled: true },
            server: ServerConfig { host: "127.0.0.1".to_owned(), port: "0".to_owned() },
            logging: None,
        }
    }

    async fn serve(provider: Arc<StubProvider>) -> String {
        let state = AppState::new(get_metrics().await, &auth_config(), provider);
        let (_h, addr) = spawn_axum(router(&settings(), state).await).await;
        format!("http://{}", addr)
    }

    async fn refresh(base_url: &str, cookie: Option<String>) -> (StatusCode, Vec<String>, Value) {
        let mut request = build_reqwest_client().post(format!("{base_url}/api/auth/session/refresh"));
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        let response = request.send().await.unwrap();
        let status = response.status();
        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|value| value.to_str().unwrap().to_owned())
            .collect();
        (status, set_cookies, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn existing_valid_jwt_is_returned_without_exchange() {
        let existing = jwt_expiring_in(3600);
        let provider = StubProvider::issuing(Ok(jwt_expiring_in(7200)));
        let base_url = serve(provider.clone()).await;

        let cookie = format!("{SESSION_COOKIE_NAME}=session-token-abc; {SESSION_JWT_COOKIE_NAME}={existing}");
        let (status, set_cookies, body) = refresh(&base_url, Some(cookie)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessionJwt"], existing.as_str());
        assert!(set_cookies.is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn missing_session_is_rejected() {
        let base_url = serve(StubProvider::issuing(Ok(jwt_expiring_in(7200)))).await;

        let (status, _, body) = refresh(&base_url, None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["sessionJwt"], Value::Null);
        assert_eq!(body["error"], "session_not_found");
    }

    #[tokio::test]
    async fn exchange_issues_jwt_and_sets_cookie() {
        let issued = jwt_expiring_in(7200);
        let provider = StubProvider::issuing(Ok(issued.clone()));
        let base_url = serve(provider.clone()).await;

        let cookie = format!("{SESSION_COOKIE_NAME}=session-token-abc; {SESSION_JWT_COOKIE_NAME}={}", jwt_expiring_in(-30));
        let (status, set_cookies, body) = refresh(&base_url, Some(cookie)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessionJwt"], issued.as_str());
        assert_eq!(provider.calls(), 1);
        assert_eq!(
            set_cookies,
            vec![format!("{SESSION_JWT_COOKIE_NAME}={issued}; Path=/; Max-Age=28800; SameSite=Lax")]
        );
    }

    #[tokio::test]
    async fn provider_failure_deletes_both_cookies() {
        let base_url = serve(StubProvider::issuing(Err("session not found".to_owned()))).await;

        let cookie = format!("{SESSION_COOKIE_NAME}=session-token-abc");
        let (status, set_cookies, body) = refresh(&base_url, Some(cookie)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "session_invalid");
        assert_eq!(set_cookies.len(), 2);
        assert!(set_cookies.iter().any(|c| c.starts_with(&format!("{SESSION_COOKIE_NAME}=;"))));
        assert!(set_cookies.iter().any(|c| c.starts_with(&format!("{SESSION_JWT_COOKIE_NAME}=;"))));
        assert!(set_cookies.iter().all(|c| c.contains("Max-Age=0")));
    }

    #[tokio::test]
    async fn unusable_issued_jwt_is_reported() {
        let cookie = format!("{SESSION_COOKIE_NAME}=session-token-abc");

        let base_url = serve(StubProvider::issuing(Ok(String::new()))).await;
        let (status, _, body) = refresh(&base_url, Some(cookie.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "session_missing_jwt");

        let base_url = serve(StubProvider::issuing(Ok(jwt_expiring_in(10)))).await;
        let (status, _, body) = refresh(&base_url, Some(cookie)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "session_jwt_expired");
    }

    #[tokio::test]
    async fn endpoint_source_round_trips_through_refresh_route() {
        let issued = jwt_expiring_in(7200);
        let base_url = serve(StubProvider::issuing(Ok(issued.clone()))).await;
        let jar = CookieJar::new().with_cookie(SESSION_COOKIE_NAME, "session-token-abc");
        let source = SessionEndpointSource::new(
            build_reqwest_client(),
            format!("{base_url}/api/auth/session/refresh"),
            session_cookies(jar.clone()),
        );

        assert_eq!(source.fetch_fresh_token().await, Ok(issued.clone()));
        assert_eq!(jar.get(SESSION_JWT_COOKIE_NAME), Some(issued));
    }

    #[tokio::test]
    async fn endpoint_source_applies_cookie_deletion_on_rejection() {
        let base_url = serve(StubProvider::issuing(Err("revoked".to_owned()))).await;
        let jar = CookieJar::new().with_cookie(SESSION_COOKIE_NAME, "session-token-abc");
        let source = SessionEndpointSource::new(
            build_reqwest_client(),
            format!("{base_url}/api/auth/session/refresh"),
            session_cookies(jar.clone()),
        );

        assert_eq!(source.fetch_fresh_token().await, Err(FetchFailure::Rejected(401)));
        assert_eq!(jar.get(SESSION_COOKIE_NAME), None);
    }

    #[tokio::test]
    async fn logout_revokes_and_redirects_to_safe_target() {
        let provider = StubProvider::issuing(Ok(jwt_expiring_in(7200)));
        let base_url = serve(provider.clone()).await;
        let client = Client::builder().redirect(Policy::none()).build().unwrap();

        let response = client
            .get(format!("{base_url}/api/auth/logout?returnTo=//evil.example.com"))
            .header(COOKIE, format!("{SESSION_COOKIE_NAME}=session-token-abc"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[LOCATION], "/");
        assert_eq!(response.headers().get_all(SET_COOKIE).iter().count(), 2);
        assert_eq!(*provider.revoked.lock().unwrap(), vec!["session-token-abc".to_owned()]);

        let response = client
            .post(format!("{base_url}/api/auth/logout?returnTo=/dashboard"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.headers()[LOCATION], "/dashboard");
    }

    #[tokio::test]
    async fn metrics_route_exposes_registry() {
        let base_url = serve(StubProvider::issuing(Ok(jwt_expiring_in(7200)))).await;
        let _ = refresh(&base_url, None).await;

        let body = build_reqwest_client()
            .get(format!("{base_url}/metrics"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        assert!(body.contains("sessionagent_refresh_endpoint_responses_total"));
    }
}
