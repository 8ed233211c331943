use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;
use session_agent::server;
use session_agent::sources::identity_provider::HttpIdentityProvider;
use session_agent::utils::config_loader;
use session_agent::utils::logging;
use session_agent::utils::logging::LogLevel;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "session-agent.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, start logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level).await?;

    // -------------------------------
    // 2. Identity provider client
    // -------------------------------

    let provider_config = service_config
        .identity_provider
        .clone()
        .ok_or_else(|| anyhow!("identity_provider section is required to serve session routes"))?;
    let identity_provider = Arc::new(HttpIdentityProvider::new(provider_config)?);

    // -------------------------------
    // 3. Serve refresh / logout / metrics routes
    // -------------------------------

    info!("Service starting...");
    server::server::start(&service_config.settings, &service_config.auth, identity_provider).await
}
