mod routes;
mod state;

use anyhow::{Context, Result};
use coursecal_core::AppConfig;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

const DEFAULT_FILTER: &str = "coursecal=info,coursecal_server=info,coursecal_core=info,coursecal_google=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
        .init();

    // Config file from $COURSECAL_CONFIG or the default location
    let config = AppConfig::load(None).context("Failed to load configuration")?;
    config.validate()?;

    let state = AppState::connect(&config)?;
    let app = routes::router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!(addr = %config.server.bind, "coursecal-server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
