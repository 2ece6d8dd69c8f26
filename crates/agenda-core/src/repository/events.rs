use std::collections::HashMap;

use crate::error::CoreError;
use crate::models::{EventException, EventWithExceptions, MasterEvent, NewEventData};
use crate::repository::SqliteRepository;
use crate::rule::RecurrenceRule;
use crate::timezone::validate_timezone;
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

/// Trims optional text fields, mapping blank input to `None`.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl super::EventRepository for SqliteRepository {
    async fn add_event(&self, data: NewEventData) -> Result<MasterEvent, CoreError> {
        let title = data.title.trim();
        if title.is_empty() {
            return Err(CoreError::InvalidInput("Event title cannot be empty".to_string()));
        }
        if data.ends_at < data.starts_at {
            return Err(CoreError::InvalidInput(format!(
                "Event ends at {} before it starts at {}",
                data.ends_at, data.starts_at
            )));
        }

        let timezone = non_blank(data.timezone);
        let tz = match &timezone {
            Some(name) => validate_timezone(name)?,
            None => chrono_tz::UTC,
        };

        // Stored rules are always canonical and accepted by the recurrence
        // engine; anything it would refuse never reaches the table.
        let recurrence_rule = match non_blank(data.recurrence_rule) {
            Some(raw) => {
                let rule = raw.parse::<RecurrenceRule>()?;
                rule.to_rrule_set(data.starts_at.trunc_subsecs(0), tz)?;
                Some(rule.to_string())
            }
            None => None,
        };

        let now = Utc::now();
        let event = MasterEvent {
            id: Uuid::now_v7(),
            title: title.to_string(),
            description: non_blank(data.description),
            location: non_blank(data.location),
            starts_at: data.starts_at,
            ends_at: data.ends_at,
            recurrence_rule,
            timezone,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"INSERT INTO events (id, title, description, location, starts_at, ends_at, recurrence_rule, timezone, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.starts_at)
        .bind(event.ends_at)
        .bind(&event.recurrence_rule)
        .bind(&event.timezone)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(self.pool())
        .await?;

        tracing::debug!(event_id = %event.id, recurring = event.is_recurring(), "event created");
        Ok(event)
    }

    async fn find_event_by_id(&self, id: Uuid) -> Result<Option<MasterEvent>, CoreError> {
        let event = sqlx::query_as("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(event)
    }

    async fn find_events_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<MasterEvent>, CoreError> {
        // Ids are stored as 16-byte blobs, so the prefix is matched against their hex form.
        let prefix: String = short_id
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(Vec::new());
        }

        let mut pattern = String::with_capacity(prefix.len() + 1);
        pattern.push_str(&prefix);
        pattern.push('%');

        let events: Vec<MasterEvent> =
            sqlx::query_as("SELECT * FROM events WHERE lower(hex(id)) LIKE ? ORDER BY created_at")
                .bind(pattern)
                .fetch_all(self.pool())
                .await?;
        Ok(events)
    }

    async fn find_events_for_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EventWithExceptions>, CoreError> {
        let events: Vec<MasterEvent> = sqlx::query_as(
            r#"SELECT * FROM events
            WHERE recurrence_rule IS NOT NULL
               OR (starts_at <= $1 AND ends_at >= $2)
            ORDER BY starts_at, id"#,
        )
        .bind(end)
        .bind(start)
        .fetch_all(self.pool())
        .await?;

        let exceptions: Vec<EventException> = sqlx::query_as(
            r#"SELECT x.* FROM event_exceptions x
            JOIN events e ON e.id = x.event_id
            WHERE e.recurrence_rule IS NOT NULL
            ORDER BY x.event_id, x.occurrence_at"#,
        )
        .fetch_all(self.pool())
        .await?;

        let mut by_event: HashMap<Uuid, Vec<EventException>> = HashMap::new();
        for exception in exceptions {
            by_event.entry(exception.event_id).or_default().push(exception);
        }

        Ok(events
            .into_iter()
            .map(|event| {
                let exceptions = by_event.remove(&event.id).unwrap_or_default();
                EventWithExceptions { event, exceptions }
            })
            .collect())
    }

    async fn delete_event(&self, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("event {}", id)));
        }

        tracing::debug!(event_id = %id, "event deleted");
        Ok(())
    }
}
