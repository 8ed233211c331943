//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Validates invariants of the token lifecycle:
//!   * retry budget and backoff schedule
//!   * grace window vs. requested session duration
//!   * route paths, server address, logging level
//!   * identity provider endpoints

use tracing::{error, info};

use crate::config::settings::{AuthConfig, IdentityProviderConfig, RetryConfig, ServiceConfig, SettingsConfig};
use crate::observability::metrics::get_metrics;

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_auth(&cfg.auth, &mut errors);

    if let Some(idp) = &cfg.identity_provider {
        validate_identity_provider(idp, &mut errors);
    }

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        get_metrics().await.config_validation_errors.inc_by(errors.len() as u64);
        Err(errors)
    }
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if settings.server.host.is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!(
            "settings.server.port '{}' must be an integer in range 0-65535",
            settings.server.port
        ));
    }

    // metrics endpoint start with '/'
    let metrics = &settings.metrics;
    if !metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            metrics.path
        ));
    }

    // logging level
    if let Some(logging) = &settings.logging {
        let valid = ["trace", "debug", "info", "warn", "error"];
        if !valid.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' invalid; allowed: {:?}",
                logging.level, valid
            ));
        }
    }
}

/// AUTH VALIDATION
fn validate_auth(auth: &AuthConfig, errors: &mut Vec<String>) {
    if let Some(retry) = &auth.retry {
        validate_retry("auth.retry", retry, errors);
    }

    if auth.refresh_timeout_ms == Some(0) {
        errors.push("auth.refresh_timeout_ms must be > 0".to_string());
    }

    let duration_minutes = auth.session_duration_minutes();
    if duration_minutes == 0 {
        errors.push("auth.session_duration_minutes must be > 0".to_string());
    } else if auth.grace_seconds() >= duration_minutes * 60 {
        errors.push(format!(
            "auth.grace_seconds ({}) must be shorter than the session duration ({}s); every issued token would be born expired",
            auth.grace_seconds(),
            duration_minutes * 60
        ));
    }

    for (path, value) in [
        ("auth.login_path", auth.login_path()),
        ("auth.refresh_path", auth.refresh_path()),
        ("auth.logout_path", auth.logout_path()),
    ] {
        if !value.starts_with('/') || value.starts_with("//") {
            errors.push(format!("{} '{}' must be an absolute same-origin path", path, value));
        }
    }

    if let Some(url) = &auth.refresh_url {
        validate_url("auth.refresh_url", url, errors);
    }

    if auth.cookies.session.trim().is_empty() || auth.cookies.session_jwt.trim().is_empty() {
        errors.push("auth.cookies names must not be empty".to_string());
    } else if auth.cookies.session == auth.cookies.session_jwt {
        errors.push(format!(
            "auth.cookies.session and auth.cookies.session_jwt must differ (both '{}')",
            auth.cookies.session
        ));
    }
}

fn validate_retry(path: &str, retry: &RetryConfig, errors: &mut Vec<String>) {
    if retry.attempts == Some(0) {
        errors.push(format!("{}.attempts must be > 0", path));
    }
    if let Some(delays) = &retry.delays_ms {
        if delays.is_empty() {
            errors.push(format!("{}.delays_ms must not be empty", path));
        }
        if delays.iter().any(|d| *d == 0) {
            errors.push(format!("{}.delays_ms values must be > 0", path));
        }
    }
}

/// IDENTITY PROVIDER VALIDATION
fn validate_identity_provider(idp: &IdentityProviderConfig, errors: &mut Vec<String>) {
    validate_url("identity_provider.authenticate_url", &idp.authenticate_url, errors);
    if let Some(url) = &idp.authenticate_jwt_url {
        validate_url("identity_provider.authenticate_jwt_url", url, errors);
    }
    if let Some(url) = &idp.revoke_url {
        validate_url("identity_provider.revoke_url", url, errors);
    }
    if idp.project_id.trim().is_empty() {
        errors.push("identity_provider.project_id must not be empty".to_string());
    }
    if idp.secret.trim().is_empty() {
        errors.push("identity_provider.secret must not be empty".to_string());
    }
}

fn validate_url(path: &str, value: &str, errors: &mut Vec<String>) {
    match url::Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(format!("{} '{}' has unsupported scheme '{}'", path, value, url.scheme())),
        Err(e) => errors.push(format!("{} '{}' is not a valid URL: {}", path, value, e)),
    }
}
