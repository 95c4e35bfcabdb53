use anyhow::Context as _;
use clap::Parser as _;
use tracing::{info, warn};

use mistral_relay_server::config::{self, ServerConfig};
use mistral_relay_server::observability::init_observability;
use mistral_relay_server::{AppState, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init();
    init_observability();

    let config = ServerConfig::parse();
    let provider = config
        .provider()
        .context("failed to configure Mistral provider")?;
    if provider.is_none() {
        warn!("MISTRAL_API_KEY is not set; /api/chat will answer 500");
    }

    let app = build_router(AppState::new(provider));
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(addr = %config.bind, base_url = %config.mistral_base_url, "mistral relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("mistral relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
