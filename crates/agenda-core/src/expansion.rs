//! Window expansion across a batch of events.
//!
//! The engine is synchronous and pure: callers fetch events and their
//! exceptions first, then hand them over together with a validated window.
//! One event failing to expand never affects the others; it degrades to its
//! master instant and is reported in [`Expansion::degraded`].

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{EventWithExceptions, ExpansionConfig, MasterEvent};
use crate::occurrence::OccurrenceInstance;
use crate::recurrence::{ExceptionFilter, RecurrenceManager, TimeWindow};
use crate::rule::RuleError;
use crate::timezone::{resolve_timezone, validate_timezone};

/// Why an event's result is incomplete or approximate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DegradationReason {
    #[error("unparseable recurrence rule: {0}")]
    UnparseableRule(RuleError),

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("more than {cap} occurrences in window, result truncated")]
    Truncated { cap: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Degradation {
    pub event_id: Uuid,
    pub reason: DegradationReason,
}

/// Merged result of expanding a batch of events.
#[derive(Debug, Clone, Default)]
pub struct Expansion<'a> {
    /// Ordered by start, then end, then occurrence id
    pub instances: Vec<OccurrenceInstance<'a>>,
    pub degraded: Vec<Degradation>,
}

impl<'a> Expansion<'a> {
    /// True when at least one event was truncated or fell back.
    pub fn is_partial(&self) -> bool {
        !self.degraded.is_empty()
    }

    pub fn degraded_event_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.degraded.iter().map(|d| d.event_id).collect();
        ids.dedup();
        ids
    }
}

#[derive(Debug, Clone)]
pub struct ExpansionEngine {
    config: ExpansionConfig,
    default_timezone: Tz,
}

impl ExpansionEngine {
    /// Creates an engine, validating the configured default timezone.
    pub fn new(config: ExpansionConfig) -> Result<Self, CoreError> {
        if config.max_occurrences == 0 {
            return Err(CoreError::InvalidInput(
                "max_occurrences must be at least 1".to_string(),
            ));
        }
        if config.max_window_days <= 0 {
            return Err(CoreError::InvalidInput(
                "max_window_days must be positive".to_string(),
            ));
        }
        let default_timezone = validate_timezone(&config.default_timezone)?;
        Ok(Self {
            config,
            default_timezone,
        })
    }

    pub fn with_defaults() -> Self {
        Self {
            config: ExpansionConfig::default(),
            default_timezone: chrono_tz::UTC,
        }
    }

    pub fn config(&self) -> &ExpansionConfig {
        &self.config
    }

    pub fn default_timezone(&self) -> Tz {
        self.default_timezone
    }

    /// Validates a caller-supplied window before any rule is evaluated.
    pub fn window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<TimeWindow, CoreError> {
        let window = TimeWindow::new(start, end)?;
        let max_span = TimeDelta::days(self.config.max_window_days);
        if window.span() > max_span {
            let span = window.span();
            let whole_days = span.num_days();
            let span_days = if span > TimeDelta::days(whole_days) {
                whole_days + 1
            } else {
                whole_days
            };
            return Err(CoreError::WindowTooLarge {
                span_days,
                max_days: self.config.max_window_days,
            });
        }
        Ok(window)
    }

    /// Expands one event into its occurrences inside `window`.
    ///
    /// # Returns
    /// * The surviving instances, ascending by start
    /// * The degradation, if the event fell back or was truncated
    ///
    /// # Behavior
    /// - Non-recurring events pass through when their start is in the window;
    ///   their exceptions are ignored
    /// - An unknown timezone or unparseable rule yields the master instant,
    ///   flagged `degraded`
    /// - Skipped occurrences are removed within the configured tolerance
    pub fn expand_event<'a>(
        &self,
        item: &'a EventWithExceptions,
        window: &TimeWindow,
    ) -> (Vec<OccurrenceInstance<'a>>, Option<Degradation>) {
        let event = &item.event;

        if !event.is_recurring() {
            let instances = if window.contains(event.starts_at) {
                vec![OccurrenceInstance::single(event)]
            } else {
                Vec::new()
            };
            return (instances, None);
        }

        let manager = resolve_timezone(event.timezone.as_deref(), self.default_timezone)
            .map_err(|_| {
                DegradationReason::UnknownTimezone(event.timezone.clone().unwrap_or_default())
            })
            .and_then(|tz| {
                RecurrenceManager::new(event, tz).map_err(DegradationReason::UnparseableRule)
            });

        let materialized = manager.and_then(|m| {
            m.materialize(window, self.config.max_occurrences)
                .map_err(DegradationReason::UnparseableRule)
        });

        let materialized = match materialized {
            Ok(materialized) => materialized,
            Err(reason) => {
                tracing::warn!(event_id = %event.id, %reason, "falling back to master instant");
                let instances = if window.contains(event.starts_at) {
                    // Still part of the series, so it keeps its parent link.
                    let mut fallback = OccurrenceInstance::assemble(event, event.starts_at);
                    fallback.degraded = true;
                    vec![fallback]
                } else {
                    Vec::new()
                };
                let degradation = Degradation {
                    event_id: event.id,
                    reason,
                };
                return (instances, Some(degradation));
            }
        };

        let degradation = materialized.truncated.then(|| {
            let cap = self.config.max_occurrences;
            tracing::warn!(event_id = %event.id, cap, "occurrence cap reached, truncating");
            Degradation {
                event_id: event.id,
                reason: DegradationReason::Truncated { cap },
            }
        });

        let filter = ExceptionFilter::new(&item.exceptions, self.config.tolerance());
        let instances = filter
            .apply(materialized.starts)
            .into_iter()
            .map(|start| OccurrenceInstance::assemble(event, start))
            .collect();

        (instances, degradation)
    }

    /// Expands every event and merges the results into one ordered list.
    pub fn expand<'a>(&self, events: &'a [EventWithExceptions], window: &TimeWindow) -> Expansion<'a> {
        let mut expansion = Expansion::default();

        for item in events {
            let (instances, degradation) = self.expand_event(item, window);
            expansion.instances.extend(instances);
            expansion.degraded.extend(degradation);
        }

        expansion
            .instances
            .sort_by(|a, b| {
                (a.starts_at, a.ends_at, a.occurrence_id).cmp(&(b.starts_at, b.ends_at, b.occurrence_id))
            });

        tracing::debug!(
            events = events.len(),
            instances = expansion.instances.len(),
            degraded = expansion.degraded.len(),
            window_start = %window.start,
            window_end = %window.end,
            "expanded window"
        );

        expansion
    }

    /// The occurrence start of `event` nearest to `at`, if one lies within the
    /// matching tolerance. Used to pin a user-supplied instant to the exact
    /// start an exception should be stored under.
    pub fn locate_occurrence(
        &self,
        event: &MasterEvent,
        at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, CoreError> {
        let tz = resolve_timezone(event.timezone.as_deref(), self.default_timezone)?;
        let manager = RecurrenceManager::new(event, tz)?;
        let tolerance = self.config.tolerance();
        let window = TimeWindow::new(at - tolerance, at + tolerance)?;

        let materialized = manager.materialize(&window, self.config.max_occurrences)?;
        Ok(materialized
            .starts
            .into_iter()
            .min_by_key(|start| (*start - at).abs()))
    }

    /// Validates `[start, end]` and expands `events` over it.
    pub fn expand_between<'a>(
        &self,
        events: &'a [EventWithExceptions],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Expansion<'a>, CoreError> {
        let window = self.window(start, end)?;
        Ok(self.expand(events, &window))
    }
}

impl Default for ExpansionEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}
