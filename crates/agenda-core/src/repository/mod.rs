use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{
    EventException, EventWithExceptions, MasterEvent, NewEventData, NewEventException,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod events;
pub mod exceptions;

/// Storage operations on master events
#[async_trait]
pub trait EventRepository {
    /// Validates and stores a new event. The rule is stored in canonical form.
    async fn add_event(&self, data: NewEventData) -> Result<MasterEvent, CoreError>;
    async fn find_event_by_id(&self, id: Uuid) -> Result<Option<MasterEvent>, CoreError>;
    async fn find_events_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<MasterEvent>, CoreError>;
    /// Events whose stored span overlaps `[start, end]`, plus every recurring
    /// event, each with all of its exceptions.
    async fn find_events_for_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EventWithExceptions>, CoreError>;
    async fn delete_event(&self, id: Uuid) -> Result<(), CoreError>;
}

/// Storage operations on per-occurrence exceptions
#[async_trait]
pub trait ExceptionRepository {
    /// Creates the exception, or updates `skipped`/`note` when one already
    /// exists for the same occurrence.
    async fn upsert_exception(&self, exception: NewEventException) -> Result<EventException, CoreError>;
    async fn find_exceptions(&self, event_id: Uuid) -> Result<Vec<EventException>, CoreError>;
    async fn remove_exception(&self, event_id: Uuid, occurrence_at: DateTime<Utc>) -> Result<(), CoreError>;
}

/// Main repository trait that composes all domain traits
pub trait Repository: EventRepository + ExceptionRepository + Send + Sync {}

/// SQLite implementation of the repository pattern
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: DbPool,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl Repository for SqliteRepository {}
