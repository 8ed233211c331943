#[cfg(test)]
mod tests {

    use std::io::Write;
    use std::time::Duration;

    use serial_test::serial;

    use crate::config::proc_loader::{expand_env_vars, file_to_config, parse_config};
    use crate::config::settings::LogFormat;
    use crate::resilience::retry::RetrySettings;
    use crate::utils::config_loader;

    const MINIMAL: &str = r#"
settings:
  metrics:
    is_enabled: true
  server:
    host: 127.0.0.1
    port: "8091"
"#;

    #[tokio::test]
    async fn minimal_config_gets_lifecycle_defaults() {
        let cfg = parse_config(MINIMAL.to_owned()).await.unwrap();

        assert_eq!(cfg.settings.metrics.path, "/metrics");
        assert_eq!(cfg.auth.grace_seconds(), 60);
        assert_eq!(cfg.auth.refresh_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.auth.session_duration_minutes(), 480);
        assert_eq!(cfg.auth.login_path(), "/auth");
        assert_eq!(cfg.auth.refresh_path(), "/api/auth/session/refresh");
        assert_eq!(cfg.auth.cookies.session, "stytch_session");
        assert_eq!(cfg.auth.cookies.session_jwt, "stytch_session_jwt");

        let retry = RetrySettings::from_config(cfg.auth.retry.as_ref());
        assert_eq!(retry.attempts, 3);
        assert_eq!(retry.total_backoff(), Duration::from_secs(7));
        assert!(cfg.identity_provider.is_none());
    }

    #[tokio::test]
    async fn validation_reports_every_problem() {
        let yaml = r#"
settings:
  metrics:
    is_enabled: false
    path: metrics
  server:
    host: 127.0.0.1
    port: "http"
  logging:
    level: chatty
    format: json
auth:
  login_path: auth
  retry:
    attempts: 0
    delays_ms: [1000, 0]
  cookies:
    session: same
    session_jwt: same
identity_provider:
  authenticate_url: "ftp://idp.example.com/authenticate"
  project_id: ""
  secret: secret-test
"#;
        let err = parse_config(yaml.to_owned()).await.unwrap_err().to_string();

        assert!(err.starts_with("config is not valid, total errors:9"), "{err}");
        for expected in [
            "settings.server.port 'http'",
            "settings.metrics.path 'metrics'",
            "settings.logging.level 'chatty'",
            "auth.login_path 'auth'",
            "auth.retry.attempts must be > 0",
            "auth.retry.delays_ms values must be > 0",
            "must differ (both 'same')",
            "unsupported scheme 'ftp'",
            "identity_provider.project_id must not be empty",
        ] {
            assert!(err.contains(expected), "missing '{expected}' in: {err}");
        }
    }

    #[tokio::test]
    async fn grace_must_be_shorter_than_session() {
        let yaml = format!("{MINIMAL}auth:\n  grace_seconds: 600\n  session_duration_minutes: 5\n");
        let err = parse_config(yaml).await.unwrap_err().to_string();
        assert!(err.contains("born expired"), "{err}");
    }

    #[test]
    #[serial]
    fn env_vars_expand_with_defaults() {
        std::env::set_var("SESSION_AGENT_TEST_HOST", "10.0.0.7");
        std::env::remove_var("SESSION_AGENT_TEST_UNSET");

        let out = expand_env_vars("host: ${SESSION_AGENT_TEST_HOST}\nport: ${SESSION_AGENT_TEST_UNSET:8080}").unwrap();

        assert_eq!(out, "host: 10.0.0.7\nport: 8080");
        std::env::remove_var("SESSION_AGENT_TEST_HOST");
    }

    #[tokio::test]
    #[serial]
    async fn file_config_expands_environment() {
        std::env::set_var("SESSION_AGENT_TEST_IDP", "https://idp.example.com");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{MINIMAL}  logging:
    level: debug
    format: compact
auth:
  refresh_url: "http://127.0.0.1:8091/api/auth/session/refresh"
  retry:
    attempts: 5
identity_provider:
  authenticate_url: "${{SESSION_AGENT_TEST_IDP}}/v1/b2b/sessions/authenticate"
  revoke_url: "${{SESSION_AGENT_TEST_IDP:http://localhost}}/v1/b2b/sessions/revoke"
  project_id: "${{SESSION_AGENT_TEST_PROJECT:project-test-1}}"
  secret: secret-test
"#
        )
        .unwrap();

        let cfg = file_to_config(file.path()).await.unwrap();
        std::env::remove_var("SESSION_AGENT_TEST_IDP");

        let logging = cfg.settings.logging.unwrap();
        assert_eq!(logging.level, "debug");
        assert_eq!(logging.format, LogFormat::Compact);
        let retry = cfg.auth.retry.unwrap();
        assert_eq!(retry.attempts, Some(5));
        assert_eq!(retry.delays_ms, Some(vec![1000, 2000, 4000]));
        let idp = cfg.identity_provider.unwrap();
        assert_eq!(idp.authenticate_url, "https://idp.example.com/v1/b2b/sessions/authenticate");
        assert_eq!(idp.revoke_url.as_deref(), Some("https://idp.example.com/v1/b2b/sessions/revoke"));
        assert_eq!(idp.project_id, "project-test-1");
    }

    #[tokio::test]
    async fn sample_config_in_repo_root_is_valid() {
        let cfg = config_loader::run("session-agent.yaml").await.unwrap();
        assert!(cfg.identity_provider.is_some());
    }

    #[tokio::test]
    #[should_panic(expected = "Invalid config")]
    async fn missing_file_fails() {
        config_loader::run("does-not-exist.yaml").await.unwrap();
    }
}
