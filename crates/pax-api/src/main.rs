//! # pax-api — Binary Entry Point
//!
//! Starts the Axum HTTP server. With `DATABASE_URL` set, all state lives in
//! PostgreSQL; without it the server runs on in-memory stores, which is
//! useful for local development but survives nothing.

use std::sync::Arc;

use pax_api::state::{AppConfig, AppState};
use pax_store::PgStore;
use pax_testkit::MemStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let config = AppConfig { port };

    let pool = pax_store::db::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;

    let state = match pool {
        Some(pool) => AppState::from_store(Arc::new(PgStore::new(pool)), config),
        None => AppState::from_store(Arc::new(MemStore::new()), config),
    };

    let app = pax_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("PAX API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
