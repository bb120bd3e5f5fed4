//! narrator server entry point

use std::sync::Arc;

use anyhow::Context;

use narrator::config::ServiceConfig;
use narrator::server::{create_router, AppState};
use narrator::utils::logger::init_logger;
use narrator::Narrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    log::info!("Starting narrator v{}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::load().context("failed to load configuration")?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let narrator = Arc::new(Narrator::new(config));
    let app = create_router(AppState::new(Arc::clone(&narrator)));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    log::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    narrator.shutdown().await;
    log::info!("Server shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Received Ctrl+C, shutting down"),
        _ = terminate => log::info!("Received SIGTERM, shutting down"),
    }
}
