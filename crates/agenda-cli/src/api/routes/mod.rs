//! API routes module

pub mod events;

use axum::Router;

use crate::api::state::SharedState;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new().nest("/events", events::router())
}
