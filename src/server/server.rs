use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tracing::info;

use crate::config::settings::{AuthConfig, SettingsConfig};
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::server::session_routes::SessionState;
use crate::sources::identity_provider::IdentityProvider;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub session_state: SessionState,
}

impl AppState {
    pub fn new(metrics: &Metrics, auth: &AuthConfig, identity_provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            session_state: SessionState::new(auth.clone(), identity_provider),
        }
    }
}

pub async fn router(settings_config: &SettingsConfig, state: AppState) -> Router {
    Router::new()
        .merge(state.metrics_state.router(&settings_config.metrics).await)
        .merge(state.session_state.router().await)
        .with_state(state)
}

/// Serve the session routes and, when enabled, the metrics route.
pub async fn start(
    settings_config: &SettingsConfig,
    auth: &AuthConfig,
    identity_provider: Arc<dyn IdentityProvider>,
) -> Result<()> {
    let metrics = get_metrics().await;
    let state = AppState::new(metrics, auth, identity_provider);
    let app = router(settings_config, state).await;

    let bind_addr = &settings_config.server.host;
    let port = &settings_config.server.port;
    info!("address: {}, port: {}", bind_addr, port);
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind_addr, port))
        .await
        .with_context(|| format!("failed to bind {}:{}", bind_addr, port))?;
    metrics.up.set(1);
    axum::serve(listener, app).await.context("http server failed")?;

    Ok(())
}
