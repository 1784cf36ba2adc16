use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use chairbook::clock::SystemClock;
use chairbook::config::AppConfig;
use chairbook::handlers;
use chairbook::services::expiry::ExpiryEnforcer;
use chairbook::services::live::LiveOverview;
use chairbook::state::AppState;
use chairbook::store::SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;

    let store = Arc::new(SqliteStore::open(&config.database_url)?);
    let clock = Arc::new(SystemClock::new(config.utc_offset));
    tracing::info!(
        database = %config.database_url,
        slots = config.grid.times().len(),
        services = config.catalog.all().len(),
        "configuration loaded"
    );

    let (state, overview_tx) = AppState::new(store.clone(), clock.clone(), config.clone());

    let live = LiveOverview::start(store, clock, overview_tx);
    let enforcer = ExpiryEnforcer::start(state.clone());

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    enforcer.stop().await;
    live.stop().await;
    tracing::info!("shut down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
