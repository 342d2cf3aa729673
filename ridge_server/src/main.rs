mod error;
mod pages;
mod routes;

use anyhow::{Context, Result};
use common::{Artifacts, ServerConfig, FEATURE_NAMES};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ridge_server=info,common=info,tower_http=info")),
        )
        .init();

    info!("======================================================================");
    info!("Ridge FWI Server - Starting");
    info!("======================================================================");

    let config = ServerConfig::from_env().context("Failed to resolve server configuration")?;
    info!("Models directory: {}", config.models_dir.display());
    info!("Features: {}", FEATURE_NAMES.join(", "));

    let artifacts = match Artifacts::load_files(
        &config.models_dir,
        &config.scaler_file,
        &config.model_file,
    ) {
        Ok(artifacts) => artifacts,
        Err(e) => {
            error!("{}", e);
            error!(
                "Make sure {} and {} are in {}",
                config.scaler_file,
                config.model_file,
                config.models_dir.display()
            );
            return Err(e).context("Failed to load model artifacts");
        }
    };

    info!("✓ Artifacts loaded in {:.2}ms", artifacts.load_time_ms);
    info!("");
    info!("Server ready on http://{}", config.bind_addr);
    info!("======================================================================");

    let state = Arc::new(routes::AppState::new(artifacts));
    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
