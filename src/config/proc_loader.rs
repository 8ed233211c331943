use std::{fs, path::Path};
use crate::config::settings::{AuthConfig, CookieConfig, LogFormat, LoggingConfig, RetryConfig, ServiceConfig};
use crate::observability::metrics::get_metrics;
use crate::utils::constants::{
    DEFAULT_GRACE_SECONDS, DEFAULT_REFRESH_TIMEOUT_MS, DEFAULT_SESSION_DURATION_MINUTES, LOGIN_PATH,
    LOGOUT_PATH, SESSION_REFRESH_PATH,
};
use anyhow::{anyhow, Result};
use regex::Regex;
use tracing::{debug, error};
use crate::config::proc_validator;

/// Load and validate config from YAML file
pub async  fn file_to_config(path: &Path) -> Result<ServiceConfig> {
    let content= fs::read_to_string(path)?;

    let expanded = expand_env_vars(&content)?;
    parse_config(expanded).await
}

pub async fn parse_config(content: String) -> Result<ServiceConfig> {
    let metrics = get_metrics().await;
    let mut service_config: ServiceConfig = serde_yaml::from_str(&content)
        .inspect_err(|e| {
            error!("parse config error: {}", e);
            metrics.config_validation_errors.inc();
        })?;

    // Apply defaults
    if service_config.settings.logging.is_none() {
        service_config.settings.logging = Some(LoggingConfig::new("info".to_owned(), LogFormat::from_env()));
    }
    service_config.auth = initiate_default_values(service_config.auth);

    debug!("validation config ...");
    proc_validator::validate_service_config(&service_config)
        .await
        .map_err(|errors| anyhow!("config is not valid, total errors:{}, \n{}", errors.len(), errors.join("\n")))?;

    Ok(service_config)
}

fn initiate_default_values(mut auth: AuthConfig) -> AuthConfig {
    auth.grace_seconds.get_or_insert(DEFAULT_GRACE_SECONDS);
    auth.refresh_timeout_ms.get_or_insert(DEFAULT_REFRESH_TIMEOUT_MS);
    auth.session_duration_minutes.get_or_insert(DEFAULT_SESSION_DURATION_MINUTES);
    auth.login_path.get_or_insert_with(|| LOGIN_PATH.to_owned());
    auth.refresh_path.get_or_insert_with(|| SESSION_REFRESH_PATH.to_owned());
    auth.logout_path.get_or_insert_with(|| LOGOUT_PATH.to_owned());

    let defaults = RetryConfig::default();
    let retry = auth.retry.get_or_insert_with(RetryConfig::default);
    if retry.attempts.is_none() {
        retry.attempts = defaults.attempts;
    }
    if retry.delays_ms.is_none() {
        retry.delays_ms = defaults.delays_ms;
    }

    if auth.cookies.session.is_empty() && auth.cookies.session_jwt.is_empty() {
        auth.cookies = CookieConfig { secure: auth.cookies.secure, ..CookieConfig::default() };
    }
    auth
}

/// Replace `${VAR}` and `${VAR:default}` with environment values
pub fn expand_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{(\w+)(?::([^\}]+))?\}")?;
    Ok(re.replace_all(input, |caps: &regex::Captures| {
        let var = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var).unwrap_or_else(|_| default.to_string())
    })
    .to_string())
}
