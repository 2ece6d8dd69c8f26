//! Public API types

use agenda_core::error::CoreError;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;

// Errors

pub struct ApiError {
    status: StatusCode,
    error: anyhow::Error,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: anyhow::anyhow!(message.into()),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Convert `ApiError` into an Axum compatible response.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Always log the error
        if self.status.is_server_error() {
            tracing::error!("{:#}", self.error);
        } else {
            tracing::warn!(status = %self.status, "{:#}", self.error);
        }

        let message = if self.status.is_server_error() {
            "Something went wrong".to_string()
        } else {
            self.error.to_string()
        };

        (self.status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Enables using `?` on functions that return `Result<_,
/// anyhow::Error>` to turn them into `Result<_, ApiError>`. Core errors
/// keep their meaning in the status code.
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let error = err.into();
        let status = match error.downcast_ref::<CoreError>() {
            Some(CoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(core) if core.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, error }
    }
}

// Re-export public types from each route

pub mod events {
    pub use crate::api::routes::events::public::*;
}
