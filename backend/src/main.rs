use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use jersey_orders::backend::config::AppConfig;
use jersey_orders::backend::{create_router, initialize_backend};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load()?;
    let app_state = initialize_backend(&config).await?;

    let _sweeper = app_state.data_service.cache().spawn_sweeper(config.cache.sweep_interval());
    let app = create_router(app_state, &config.allowed_origin)?;

    let addr = config.bind_address();
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
