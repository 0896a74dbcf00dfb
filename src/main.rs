use std::sync::Arc;

use hourglass_rs::{SafeTimeProvider, TimeSource};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hrms_rs::config::AppConfig;
use hrms_rs::http::{build_router, AppState};
use hrms_rs::{bootstrap, store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let bind_addr = config.bind_addr;

    let store = store::open_store(&config.store_url)
        .map_err(|e| anyhow::anyhow!("opening store: {e}"))?;
    info!(store = %config.store_url, "store opened");

    let clock = Arc::new(SafeTimeProvider::new(TimeSource::System));
    let state = AppState::new(config, store, clock).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    bootstrap::seed(&state).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let app = build_router(state)
        .into_make_service_with_connect_info::<std::net::SocketAddr>();

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(%bind_addr, "hrms listening");
    axum::serve(listener, app).await?;
    Ok(())
}
