//! Test utilities for the API integration tests
use std::sync::Arc;

use agenda_cli::api::{app, AppState};
use agenda_core::db::establish_connection;
use agenda_core::expansion::ExpansionEngine;
use agenda_core::models::ExpansionConfig;
use agenda_core::repository::SqliteRepository;
use axum::{
    body::{to_bytes, Body},
    http::{Request, Response},
    Router,
};
use serde_json::Value;

/// Router over a private in-memory database with default expansion settings.
pub async fn test_app() -> Router {
    test_app_with(ExpansionConfig::default()).await
}

pub async fn test_app_with(config: ExpansionConfig) -> Router {
    let pool = establish_connection(":memory:")
        .await
        .expect("Failed to open in-memory database");
    let engine = ExpansionEngine::new(config).expect("Invalid expansion config");
    app(Arc::new(AppState::new(SqliteRepository::new(pool), engine)))
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
