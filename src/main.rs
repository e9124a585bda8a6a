use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

mod dispatch;

mod state;

mod upload;

use config::Config;

use state::RelayState;

#[tokio::main]

async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Honors RUST_LOG if present
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = Config::from_env()?;

    info!(
        max_upload_bytes = config.max_upload_bytes,
        "Starting command-relay..."
    );

    // One store for the whole process; every connection shares it through the router.
    let state = RelayState::new();

    let app = dispatch::router(state, config.max_upload_bytes);

    let addr = config.socket_addr();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(address = %format!("http://{}", addr), "Relay server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Relay server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
