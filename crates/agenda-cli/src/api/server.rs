use std::sync::Arc;

use agenda_core::db;
use agenda_core::expansion::ExpansionEngine;
use agenda_core::models::ExpansionConfig;
use agenda_core::repository::SqliteRepository;
use anyhow::Context;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::routes;
use crate::api::state::{AppState, SharedState};
use crate::config::Config;

pub fn app(shared_state: SharedState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        // API routes
        .nest("/api", routes::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

/// Run the server until it fails or the process is stopped.
pub async fn serve(host: &str, port: u16, config: &Config) -> anyhow::Result<()> {
    let pool = db::establish_connection(&config.database_path)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database_path))?;
    let engine = ExpansionEngine::new(ExpansionConfig::from(&config.expansion))?;

    let app_state = AppState::new(SqliteRepository::new(pool), engine);
    let app = app(Arc::new(app_state));

    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;

    tracing::info!("Server started. Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
