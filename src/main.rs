use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chamuyo::{api, config::Config, state::AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chamuyo=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Chamuyo...");

    let config = Config::from_env();

    let catalog = config.load_catalog().inspect_err(|e| {
        tracing::error!("Failed to load phrase catalog: {}", e);
    })?;
    tracing::info!(decks = catalog.decks().len(), "Catalog loaded");

    let store = config.open_store().inspect_err(|e| {
        tracing::error!("Failed to open room store: {}", e);
    })?;
    tracing::info!(store = ?config.store, "Room store ready");

    let state = Arc::new(AppState::new(store, Arc::new(catalog), config.rules.clone()));
    let app = api::router(state, config.static_dir.clone());

    tracing::info!("Listening on http://{}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
