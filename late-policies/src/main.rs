//! Late Policy Service - Main Entry Point

use anyhow::{Context, Result};
use late_policies::{config::Config, create_app, AppState};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse_config();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,late_policies=debug,tower_http=debug"));
    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting Late Policy Service");
    info!("  Store: {:?}", config.store);
    info!("  Templates: {}", config.templates_glob());

    let state = match AppState::new(&config).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to initialize application state: {:#}", e);
            return Err(e);
        }
    };

    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("Late Policy Service listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .context("Server failed to start")?;

    Ok(())
}
