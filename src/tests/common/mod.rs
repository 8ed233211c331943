// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::Client;

use crate::config::settings::{AuthConfig, CookieConfig, RetryConfig};
use crate::helpers::time::now_u64;
use crate::session::cookies::{CookieJar, SessionCookies};
use crate::sources::{FetchFailure, FetchResult, TokenSource};

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

/// Unsigned JWT carrying the given claims; signature segment is a placeholder.
pub fn make_jwt(exp: u64, iat: u64) -> String {
    make_jwt_from(json!({ "sub": "member-test-1", "exp": exp, "iat": iat }))
}

pub fn make_jwt_from(payload: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.c2lnbmF0dXJl")
}

/// Token expiring `seconds` from now (negative: already expired)
pub fn jwt_expiring_in(seconds: i64) -> String {
    let now = now_u64();
    let exp = now.saturating_add_signed(seconds);
    make_jwt(exp, now.saturating_sub(60))
}

pub fn session_cookies(jar: CookieJar) -> SessionCookies {
    SessionCookies::new(Arc::new(jar), CookieConfig::default(), 480)
}

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        retry: Some(RetryConfig::default()),
        ..AuthConfig::default()
    }
}

/// Source replaying a scripted sequence of outcomes, then `fallback` forever.
#[derive(Debug)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<(Option<Duration>, FetchResult)>>,
    fallback: FetchResult,
    latency: Duration,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<FetchResult>, fallback: FetchResult) -> Self {
        Self::timed(script.into_iter().map(|outcome| (None, outcome)).collect(), fallback)
    }

    /// Per-call latency overrides the source-wide one
    pub fn timed(script: Vec<(Option<Duration>, FetchResult)>, fallback: FetchResult) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(outcome: FetchResult) -> Self {
        Self::new(Vec::new(), outcome)
    }

    pub fn failing() -> Self {
        Self::always(Err(FetchFailure::Rejected(401)))
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_fresh_token(&self) -> FetchResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let (latency, outcome) = next.unwrap_or_else(|| (None, self.fallback.clone()));
        let latency = latency.unwrap_or(self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        outcome
    }
}

/// Source that never settles
#[derive(Debug, Default)]
pub struct HangingSource {
    calls: AtomicUsize,
}

impl HangingSource {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenSource for HangingSource {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn fetch_fresh_token(&self) -> FetchResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}
