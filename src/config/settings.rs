use std::time::Duration;

use serde::Deserialize;

use crate::helpers::time::get_grace_seconds;
use crate::utils::constants::{
    DEFAULT_HTTP_TIMEOUT_MS, DEFAULT_REFRESH_ATTEMPTS, DEFAULT_REFRESH_DELAYS_MS,
    DEFAULT_REFRESH_TIMEOUT_MS, DEFAULT_SESSION_DURATION_MINUTES, LOGIN_PATH, LOGOUT_PATH, SESSION_COOKIE_NAME,
    SESSION_JWT_COOKIE_NAME, SESSION_REFRESH_PATH,
};

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub settings: SettingsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub identity_provider: Option<IdentityProviderConfig>,
}

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct SettingsConfig {
    pub metrics: MetricsConfig,
    pub server: ServerConfig,
    pub logging: Option<LoggingConfig>
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default)]
    pub is_enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: String
}

/// ================================
/// Token lifecycle
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthConfig {
    /// tokens are treated as expired this many seconds before `exp`
    pub grace_seconds: Option<u64>,
    /// ceiling on the shared refresh wait
    pub refresh_timeout_ms: Option<u64>,
    /// validity requested when exchanging a session token
    pub session_duration_minutes: Option<u64>,
    pub login_path: Option<String>,
    pub refresh_path: Option<String>,
    pub logout_path: Option<String>,
    /// absolute refresh endpoint used by the endpoint source, e.g. `https://app.example.com/api/auth/session/refresh`
    pub refresh_url: Option<String>,
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub cookies: CookieConfig,
}

impl AuthConfig {
    pub fn grace_seconds(&self) -> u64 {
        get_grace_seconds(self.grace_seconds)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms.unwrap_or(DEFAULT_REFRESH_TIMEOUT_MS))
    }

    pub fn session_duration_minutes(&self) -> u64 {
        self.session_duration_minutes.unwrap_or(DEFAULT_SESSION_DURATION_MINUTES)
    }

    pub fn login_path(&self) -> &str {
        self.login_path.as_deref().unwrap_or(LOGIN_PATH)
    }

    pub fn refresh_path(&self) -> &str {
        self.refresh_path.as_deref().unwrap_or(SESSION_REFRESH_PATH)
    }

    pub fn logout_path(&self) -> &str {
        self.logout_path.as_deref().unwrap_or(LOGOUT_PATH)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    pub attempts: Option<u32>,
    /// pause after attempt n is `delays_ms[n - 1]`; the last entry repeats
    /// invariant: non-empty, values > 0
    pub delays_ms: Option<Vec<u64>>,
}

impl RetryConfig {
    pub fn attempts(&self) -> u32 {
        self.attempts.unwrap_or(DEFAULT_REFRESH_ATTEMPTS)
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays_ms
            .clone()
            .unwrap_or_else(|| DEFAULT_REFRESH_DELAYS_MS.to_vec())
            .into_iter()
            .map(Duration::from_millis)
            .collect()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: Some(DEFAULT_REFRESH_ATTEMPTS),
            delays_ms: Some(DEFAULT_REFRESH_DELAYS_MS.to_vec()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CookieConfig {
    #[serde(default = "default_session_cookie")]
    pub session: String,
    #[serde(default = "default_session_jwt_cookie")]
    pub session_jwt: String,
    #[serde(default)]
    pub secure: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            session: default_session_cookie(),
            session_jwt: default_session_jwt_cookie(),
            secure: false,
        }
    }
}

/// ================================
/// Identity provider
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct IdentityProviderConfig {
    pub authenticate_url: String,
    pub authenticate_jwt_url: Option<String>,
    pub revoke_url: Option<String>,
    pub project_id: String,
    pub secret: String,
    pub timeout_ms: Option<u64>,
}

impl IdentityProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_HTTP_TIMEOUT_MS))
    }
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new (level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "json".to_string())
            .to_lowercase()
            .as_str()
        {
            "compact" | "text" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_session_cookie() -> String {
    SESSION_COOKIE_NAME.to_owned()
}

fn default_session_jwt_cookie() -> String {
    SESSION_JWT_COOKIE_NAME.to_owned()
}
