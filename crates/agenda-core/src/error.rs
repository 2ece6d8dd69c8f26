use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::rule::RuleError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(#[from] RuleError),

    #[error("Invalid window: start {start} is after end {end}")]
    InvertedWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Invalid window: span of {span_days} days exceeds the limit of {max_days} days")]
    WindowTooLarge { span_days: i64, max_days: i64 },

    #[error("Ambiguous short ID. Did you mean one of these?")]
    AmbiguousId(Vec<(String, String)>), // Vec of (ID, Title)
}

impl CoreError {
    /// True for failures caused by the caller's input rather than by storage.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidInput(_)
                | CoreError::InvalidTimezone(_)
                | CoreError::InvalidRule(_)
                | CoreError::InvertedWindow { .. }
                | CoreError::WindowTooLarge { .. }
                | CoreError::AmbiguousId(_)
        )
    }
}
