use crate::error::CoreError;
use crate::models::{EventException, MasterEvent, NewEventException};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
impl super::ExceptionRepository for SqliteRepository {
    async fn upsert_exception(&self, exception: NewEventException) -> Result<EventException, CoreError> {
        let mut tx = self.pool().begin().await?;

        // Validate that the event exists and recurs
        let event: Option<MasterEvent> = sqlx::query_as("SELECT * FROM events WHERE id = $1")
            .bind(exception.event_id)
            .fetch_optional(&mut *tx)
            .await?;

        let event = event.ok_or_else(|| CoreError::NotFound(format!("event {}", exception.event_id)))?;
        if !event.is_recurring() {
            return Err(CoreError::InvalidInput(format!(
                "Event {} does not recur; exceptions only apply to recurring events",
                event.id
            )));
        }

        let note = exception
            .note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let stored: EventException = sqlx::query_as(
            r#"INSERT INTO event_exceptions (id, event_id, occurrence_at, skipped, note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (event_id, occurrence_at)
            DO UPDATE SET skipped = excluded.skipped, note = excluded.note
            RETURNING *"#,
        )
        .bind(Uuid::now_v7())
        .bind(exception.event_id)
        .bind(exception.occurrence_at)
        .bind(exception.skipped)
        .bind(&note)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            event_id = %stored.event_id,
            occurrence_at = %stored.occurrence_at,
            skipped = stored.skipped,
            "exception stored"
        );
        Ok(stored)
    }

    async fn find_exceptions(&self, event_id: Uuid) -> Result<Vec<EventException>, CoreError> {
        let exceptions = sqlx::query_as(
            "SELECT * FROM event_exceptions WHERE event_id = $1 ORDER BY occurrence_at",
        )
        .bind(event_id)
        .fetch_all(self.pool())
        .await?;
        Ok(exceptions)
    }

    async fn remove_exception(&self, event_id: Uuid, occurrence_at: DateTime<Utc>) -> Result<(), CoreError> {
        let result = sqlx::query(
            "DELETE FROM event_exceptions WHERE event_id = $1 AND occurrence_at = $2",
        )
        .bind(event_id)
        .bind(occurrence_at)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!(
                "exception for event {} at {}",
                event_id, occurrence_at
            )));
        }

        Ok(())
    }
}
