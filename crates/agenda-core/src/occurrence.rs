use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use uuid::Uuid;

use crate::models::MasterEvent;

/// Deterministic identity of the occurrence of `event_id` starting at `start`.
///
/// UUIDv5 in the master's namespace over the nanosecond RFC 3339 rendering of
/// the raw start, so the same occurrence gets the same id on every expansion.
pub fn occurrence_id(event_id: Uuid, start: DateTime<Utc>) -> Uuid {
    let key = start.to_rfc3339_opts(SecondsFormat::Nanos, true);
    Uuid::new_v5(&event_id, key.as_bytes())
}

/// One concrete occurrence of a master event. Derived per request, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct OccurrenceInstance<'a> {
    pub occurrence_id: Uuid,
    pub source_event_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// False only for a non-recurring master passed through as-is
    pub is_recurrence: bool,
    /// Set when the event could not be expanded and fell back to its master instant
    pub degraded: bool,
    /// Display fields are read from here
    pub event: &'a MasterEvent,
}

impl<'a> OccurrenceInstance<'a> {
    /// Builds the occurrence of a recurring master starting at `start`.
    pub fn assemble(event: &'a MasterEvent, start: DateTime<Utc>) -> Self {
        Self {
            occurrence_id: occurrence_id(event.id, start),
            source_event_id: event.id,
            starts_at: start,
            ends_at: start + event.duration(),
            is_recurrence: true,
            degraded: false,
            event,
        }
    }

    /// The master itself as its only occurrence.
    pub fn single(event: &'a MasterEvent) -> Self {
        Self {
            occurrence_id: event.id,
            source_event_id: event.id,
            starts_at: event.starts_at,
            ends_at: event.ends_at,
            is_recurrence: false,
            degraded: false,
            event,
        }
    }

    /// Id of the master for generated occurrences; `None` for a one-off.
    pub fn parent_id(&self) -> Option<Uuid> {
        self.is_recurrence.then_some(self.source_event_id)
    }

    pub fn title(&self) -> &str {
        &self.event.title
    }

    pub fn description(&self) -> Option<&str> {
        self.event.description.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.event.location.as_deref()
    }

    pub fn duration(&self) -> TimeDelta {
        self.ends_at - self.starts_at
    }
}

/// A notification due for one occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    /// Stable per (occurrence, lead time); use it to deduplicate deliveries
    pub key: Uuid,
    pub occurrence_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub fire_at: DateTime<Utc>,
}

/// Reminders whose fire time `starts_at - lead` falls in `[from, to)`.
///
/// Ordered by fire time. Polling consecutive half-open ranges therefore sees
/// every reminder exactly once.
pub fn reminders_between(
    instances: &[OccurrenceInstance<'_>],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    lead: TimeDelta,
) -> Vec<Reminder> {
    let lead_key = lead.num_seconds().to_string();
    let mut reminders: Vec<Reminder> = instances
        .iter()
        .filter_map(|instance| {
            let fire_at = instance.starts_at - lead;
            (from <= fire_at && fire_at < to).then(|| Reminder {
                key: Uuid::new_v5(&instance.occurrence_id, lead_key.as_bytes()),
                occurrence_id: instance.occurrence_id,
                starts_at: instance.starts_at,
                fire_at,
            })
        })
        .collect();
    reminders.sort_by_key(|r| (r.fire_at, r.occurrence_id));
    reminders
}
