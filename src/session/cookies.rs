//! Cookie storage for the two session cookies.
//!
//! The long-lived session artifact is only ever read by server-side code; the
//! short-lived session JWT is readable by clients and is what the resolver
//! consults before starting a refresh.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};
use tracing::warn;

use crate::config::settings::CookieConfig;

const EPOCH_EXPIRY: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Where session cookies live for the current execution context
pub trait CookieStore: Send + Sync + std::fmt::Debug {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, cookie: SetCookie);
    fn remove(&self, name: &str);

    /// `Cookie` request header carrying every stored cookie
    fn cookie_header(&self) -> Option<String>;
}

/// A cookie to be written, rendered as a `Set-Cookie` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub max_age_seconds: u64,
    pub secure: bool,
}

impl SetCookie {
    pub fn new(name: &str, value: &str, max_age_seconds: u64, secure: bool) -> Self {
        Self {
            name: name.to_owned(),
            value: value.to_owned(),
            max_age_seconds,
            secure,
        }
    }

    pub fn removal(name: &str) -> Self {
        Self::new(name, "", 0, false)
    }

    pub fn is_removal(&self) -> bool {
        self.max_age_seconds == 0
    }

    pub fn to_header_string(&self) -> String {
        let mut parts = vec![
            format!("{}={}", self.name, self.value),
            "Path=/".to_owned(),
            format!("Max-Age={}", self.max_age_seconds),
            "SameSite=Lax".to_owned(),
        ];
        if self.is_removal() {
            parts.push(format!("Expires={EPOCH_EXPIRY}"));
        }
        if self.secure {
            parts.push("Secure".to_owned());
        }
        parts.join("; ")
    }
}

/// In-memory cookie jar.
///
/// Serves as the browser-side store and, built from request headers, as the
/// per-request store of the refresh endpoint. Every mutation is also recorded
/// so it can be replayed as `Set-Cookie` headers.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    inner: Arc<Mutex<JarState>>,
}

#[derive(Debug, Default)]
struct JarState {
    values: HashMap<String, String>,
    changes: Vec<SetCookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `Cookie` request header (`a=1; b=2`)
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let jar = Self::new();
        {
            let mut state = jar.lock();
            for header in headers.get_all(COOKIE) {
                let Ok(raw) = header.to_str() else {
                    warn!("ignoring non-ascii cookie header");
                    continue;
                };
                for pair in raw.split(';') {
                    if let Some((name, value)) = pair.trim().split_once('=') {
                        if !name.is_empty() {
                            state.values.insert(name.to_owned(), value.to_owned());
                        }
                    }
                }
            }
        }
        jar
    }

    pub fn with_cookie(self, name: &str, value: &str) -> Self {
        self.lock().values.insert(name.to_owned(), value.to_owned());
        self
    }

    /// Drain recorded mutations as `Set-Cookie` headers
    pub fn take_set_cookie_headers(&self) -> HeaderMap {
        let changes = std::mem::take(&mut self.lock().changes);
        let mut headers = HeaderMap::new();
        for cookie in changes {
            match HeaderValue::from_str(&cookie.to_header_string()) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(err) => warn!(cookie = %cookie.name, "invalid set-cookie value: {}", err),
            }
        }
        headers
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, JarState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CookieStore for CookieJar {
    fn get(&self, name: &str) -> Option<String> {
        self.lock()
            .values
            .get(name)
            .filter(|value| !value.is_empty())
            .cloned()
    }

    fn set(&self, cookie: SetCookie) {
        let mut state = self.lock();
        if cookie.is_removal() {
            state.values.remove(&cookie.name);
        } else {
            state.values.insert(cookie.name.clone(), cookie.value.clone());
        }
        state.changes.push(cookie);
    }

    fn remove(&self, name: &str) {
        self.set(SetCookie::removal(name));
    }

    fn cookie_header(&self) -> Option<String> {
        let state = self.lock();
        if state.values.is_empty() {
            return None;
        }
        let mut pairs: Vec<String> = state
            .values
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        pairs.sort();
        Some(pairs.join("; "))
    }
}

/// Apply `Set-Cookie` response headers to `store` the way a browser would
pub fn apply_set_cookie_headers(store: &dyn CookieStore, headers: &HeaderMap) {
    for header in headers.get_all(SET_COOKIE) {
        let Ok(raw) = header.to_str() else {
            continue;
        };
        if let Some(cookie) = parse_set_cookie(raw) {
            if cookie.is_removal() {
                store.remove(&cookie.name);
            } else {
                store.set(cookie);
            }
        }
    }
}

fn parse_set_cookie(raw: &str) -> Option<SetCookie> {
    let mut parts = raw.split(';').map(str::trim);
    let (name, value) = parts.next()?.split_once('=')?;
    if name.is_empty() {
        return None;
    }

    let mut cookie = SetCookie::new(name, value, u64::MAX, false);
    for attribute in parts {
        let (key, attr_value) = attribute.split_once('=').unwrap_or((attribute, ""));
        match key.to_ascii_lowercase().as_str() {
            "max-age" => cookie.max_age_seconds = attr_value.parse::<i64>().map_or(0, |v| u64::try_from(v).unwrap_or(0)),
            "expires" if attr_value == EPOCH_EXPIRY => cookie.max_age_seconds = 0,
            "secure" => cookie.secure = true,
            _ => {}
        }
    }
    if cookie.value.is_empty() {
        cookie.max_age_seconds = 0;
    }
    Some(cookie)
}

/// Names and attributes of the two session cookies
#[derive(Debug, Clone)]
pub struct SessionCookies {
    pub store: Arc<dyn CookieStore>,
    pub config: CookieConfig,
    pub jwt_max_age_seconds: u64,
}

impl SessionCookies {
    pub fn new(store: Arc<dyn CookieStore>, config: CookieConfig, session_duration_minutes: u64) -> Self {
        Self {
            store,
            config,
            jwt_max_age_seconds: session_duration_minutes * 60,
        }
    }

    pub fn session_token(&self) -> Option<String> {
        self.store.get(&self.config.session)
    }

    pub fn session_jwt(&self) -> Option<String> {
        self.store.get(&self.config.session_jwt)
    }

    pub fn persist_session_jwt(&self, token: &str) {
        self.store.set(SetCookie::new(
            &self.config.session_jwt,
            token,
            self.jwt_max_age_seconds,
            self.config.secure,
        ));
    }

    /// Delete both cookies together
    pub fn clear(&self) {
        self.store.remove(&self.config.session);
        self.store.remove(&self.config.session_jwt);
    }
}
