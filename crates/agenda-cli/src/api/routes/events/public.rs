//! Public types for the events API
use agenda_core::models::{EventException, MasterEvent};
use agenda_core::occurrence::OccurrenceInstance;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `GET /api/events` query. Instants are ISO 8601 / RFC 3339 strings and are
/// validated by the handler so a malformed value is a 400.
#[derive(Deserialize)]
pub struct EventsQuery {
    pub start: String,
    pub end: String,
}

/// One entry of the merged window listing: a one-off event or an occurrence.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventInstance {
    /// Occurrence id for recurrences, the event id otherwise
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: String,
    pub end: String,
    pub is_recurrence: bool,
    pub timezone: Option<String>,
    pub degraded: bool,
}

impl From<&OccurrenceInstance<'_>> for EventInstance {
    fn from(instance: &OccurrenceInstance<'_>) -> Self {
        Self {
            id: instance.occurrence_id,
            parent_id: instance.parent_id(),
            title: instance.title().to_string(),
            description: instance.description().map(str::to_string),
            location: instance.location().map(str::to_string),
            start: rfc3339(instance.starts_at),
            end: rfc3339(instance.ends_at),
            is_recurrence: instance.is_recurrence,
            timezone: instance.event.timezone.clone(),
            degraded: instance.degraded,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewEventRequest {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub recurrence_rule: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: String,
    pub end: String,
    pub recurrence_rule: Option<String>,
    pub timezone: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<MasterEvent> for EventResponse {
    fn from(event: MasterEvent) -> Self {
        Self {
            id: event.id,
            title: event.title,
            description: event.description,
            location: event.location,
            start: rfc3339(event.starts_at),
            end: rfc3339(event.ends_at),
            recurrence_rule: event.recurrence_rule,
            timezone: event.timezone,
            created_at: rfc3339(event.created_at),
            updated_at: rfc3339(event.updated_at),
        }
    }
}

/// Body of `PUT /api/events/{id}/exceptions`
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionRequest {
    /// Start of the targeted occurrence; snapped to the nearest real one
    pub occurrence_at: DateTime<Utc>,
    #[serde(default = "default_skipped")]
    pub skipped: bool,
    pub note: Option<String>,
}

fn default_skipped() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionResponse {
    pub id: Uuid,
    pub event_id: Uuid,
    pub occurrence_at: String,
    pub skipped: bool,
    pub note: Option<String>,
}

impl From<EventException> for ExceptionResponse {
    fn from(exception: EventException) -> Self {
        Self {
            id: exception.id,
            event_id: exception.event_id,
            occurrence_at: rfc3339(exception.occurrence_at),
            skipped: exception.skipped,
            note: exception.note,
        }
    }
}

fn rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
