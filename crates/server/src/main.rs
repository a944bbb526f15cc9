use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Extension, Router};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use chess_core::OpeningTrie;
use server::config;
use server::routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;

    tracing::info!(path = %config.eco_book_path.display(), "Loading opening corpus...");
    let openings = OpeningTrie::load(&config.eco_book_path)
        .context("Failed to load opening corpus")?;
    tracing::info!("Loaded {} openings", openings.len());

    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/ws", get(routes::game_ws::ws_handler))
        // Shared state
        .layer(Extension(Arc::new(openings)))
        .layer(Extension(config.clone()))
        .layer(cors);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
