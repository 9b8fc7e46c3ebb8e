// Pricebook - Web Server
// REST API with Axum over the SQLite pricebook

use anyhow::{Context, Result};
use pricebook::api::{app_router, AppState};
use pricebook::{init_tracing, Config, PricebookPool, PricebookStore};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    // Open database
    let store = PricebookStore::open(&config.db_path)
        .with_context(|| format!("Failed to open pricebook at {}", config.db_path.display()))?;
    let count = store.count()?;
    store.close()?;
    tracing::info!(path = %config.db_path.display(), entries = count, "database opened");
    if count == 0 {
        tracing::warn!("pricebook is empty; run `pricebook seed` to load rates");
    }

    // Read pool shared by the handlers
    let pool = PricebookPool::open(&config.db_path, config.pool_size)
        .context("Failed to open pricebook read pool")?;
    let state = AppState::new(pool);
    let app = app_router(state.clone(), &config);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_addr))?;
    tracing::info!("API on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    state.close();
    tracing::info!("pricebook closed");
    Ok(())
}
