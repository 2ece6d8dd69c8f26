use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A stored calendar entry. When `recurrence_rule` is set the entry is the
/// master of a series and `starts_at`/`ends_at` describe its first occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MasterEvent {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Canonical RRULE body (no `RRULE:` prefix, no DTSTART)
    pub recurrence_rule: Option<String>,
    /// IANA timezone the rule resolves against; `None` means the configured default
    pub timezone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MasterEvent {
    /// Length of every occurrence of this event.
    pub fn duration(&self) -> TimeDelta {
        self.ends_at - self.starts_at
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence_rule.is_some()
    }
}

impl Default for MasterEvent {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            title: String::new(),
            description: None,
            location: None,
            starts_at: now,
            ends_at: now,
            recurrence_rule: None,
            timezone: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A per-occurrence override of a recurring event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct EventException {
    pub id: Uuid,
    /// Foreign key to events
    pub event_id: Uuid,
    /// The unmodified instant the rule produces for the targeted occurrence
    pub occurrence_at: DateTime<Utc>,
    /// When true the occurrence is hidden; false records the override without hiding it
    pub skipped: bool,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EventException {
    /// A skip exception for the occurrence at `occurrence_at`.
    pub fn skip(event_id: Uuid, occurrence_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_id,
            occurrence_at,
            skipped: true,
            note: None,
            created_at: Utc::now(),
        }
    }
}

/// An event as returned by the window fetch, with every exception attached.
#[derive(Debug, Clone, PartialEq)]
pub struct EventWithExceptions {
    pub event: MasterEvent,
    pub exceptions: Vec<EventException>,
}

impl From<MasterEvent> for EventWithExceptions {
    fn from(event: MasterEvent) -> Self {
        Self {
            event,
            exceptions: Vec::new(),
        }
    }
}

// ============================================================================
// Data Transfer Objects (DTOs)
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct NewEventData {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Raw rule text; normalized to canonical form before storage
    pub recurrence_rule: Option<String>,
    pub timezone: Option<String>,
}

/// Data for creating or updating the exception of a single occurrence
#[derive(Debug, Clone)]
pub struct NewEventException {
    pub event_id: Uuid,
    /// Which occurrence to affect
    pub occurrence_at: DateTime<Utc>,
    pub skipped: bool,
    pub note: Option<String>,
}

/// Configuration for window expansion - core version.
/// The CLI keeps its own settings type and converts into this one.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionConfig {
    /// IANA zone used for events that carry no timezone
    pub default_timezone: String,
    /// Distance within which an exception matches a recomputed occurrence
    pub tolerance_ms: i64,
    /// Per-event cap on generated occurrences; larger results are truncated
    pub max_occurrences: usize,
    /// Widest window a caller may request
    pub max_window_days: i64,
}

impl ExpansionConfig {
    pub fn tolerance(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.tolerance_ms.max(0))
    }
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            default_timezone: "UTC".to_string(),
            tolerance_ms: 60_000,
            max_occurrences: 10_000,
            max_window_days: 400,
        }
    }
}
