use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use chrono_tz::Tz;
use rrule::Tz as RRuleTz;

use crate::error::CoreError;
use crate::models::{EventException, MasterEvent};
use crate::rule::{RecurrenceRule, RuleError};

/// Closed interval `[start, end]` a caller asks occurrences for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a window, rejecting `start > end`. An empty window
    /// (`start == end`) is allowed and matches instants exactly at that time.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, CoreError> {
        if start > end {
            return Err(CoreError::InvertedWindow { start, end });
        }
        Ok(Self { start, end })
    }

    #[inline]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    pub fn span(&self) -> TimeDelta {
        self.end - self.start
    }
}

/// Raw occurrence starts for one event within one window.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Materialized {
    /// Ascending occurrence start instants
    pub starts: Vec<DateTime<Utc>>,
    /// True when the cap was hit and later starts were dropped
    pub truncated: bool,
}

/// Turns one master event into the start instants of its occurrences.
///
/// The rule is parsed once at construction. A manager for a non-recurring
/// event yields the master's own start when it lies in the window.
#[derive(Debug)]
pub struct RecurrenceManager<'a> {
    event: &'a MasterEvent,
    /// Parsed rule; `None` for a one-off event
    rule: Option<RecurrenceRule>,
    /// Zone the rule's local-time fields resolve against
    timezone: Tz,
}

impl<'a> RecurrenceManager<'a> {
    /// Creates a manager for `event`, parsing its recurrence rule.
    ///
    /// # Arguments
    /// * `event` - The master event to expand
    /// * `timezone` - Already resolved zone for the event
    ///
    /// # Returns
    /// * `Result<Self, RuleError>` - Manager, or the reason the rule could not be parsed
    pub fn new(event: &'a MasterEvent, timezone: Tz) -> Result<Self, RuleError> {
        let rule = event
            .recurrence_rule
            .as_deref()
            .map(str::parse::<RecurrenceRule>)
            .transpose()?;

        Ok(Self {
            event,
            rule,
            timezone,
        })
    }

    pub fn is_recurring(&self) -> bool {
        self.rule.is_some()
    }

    pub fn rule(&self) -> Option<&RecurrenceRule> {
        self.rule.as_ref()
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Generates occurrence starts inside `window`.
    ///
    /// # Arguments
    /// * `window` - Inclusive bounds on occurrence **start**
    /// * `cap` - Maximum number of starts returned
    ///
    /// # Returns
    /// * `Result<Materialized, RuleError>` - Ascending starts and the truncation flag
    ///
    /// # Behavior
    /// - Anchors the rule at the master start, in the event's zone, so local
    ///   times stay fixed across DST changes
    /// - A series that has ended before `window.start` yields nothing
    /// - Returns at most `cap` starts; `truncated` reports whether more existed
    pub fn materialize(&self, window: &TimeWindow, cap: usize) -> Result<Materialized, RuleError> {
        let Some(rule) = &self.rule else {
            let starts = if window.contains(self.event.starts_at) {
                vec![self.event.starts_at]
            } else {
                Vec::new()
            };
            return Ok(Materialized {
                starts,
                truncated: false,
            });
        };

        // The engine works in whole seconds; the fraction is added back to
        // every generated start.
        let dtstart = self.event.starts_at.trunc_subsecs(0);
        let fraction = self.event.starts_at - dtstart;
        if self.event.starts_at > window.end {
            return Ok(Materialized::default());
        }
        if let Some(until) = rule.until_instant(self.timezone) {
            // The engine refuses UNTIL before DTSTART; such a series is empty.
            if until < dtstart || until < window.start {
                return Ok(Materialized::default());
            }
        }

        let zone = RRuleTz::Tz(self.timezone);
        let cap = cap.min(usize::from(u16::MAX) - 1);
        // One extra start tells us whether the cap cut anything off.
        let limit = u16::try_from(cap + 1).unwrap_or(u16::MAX);

        // The engine bounds are widened by a second and the exact inclusive
        // check happens below.
        let result = rule
            .to_rrule_set(dtstart, self.timezone)?
            .after((window.start - TimeDelta::seconds(1)).with_timezone(&zone))
            .before((window.end + TimeDelta::seconds(1)).with_timezone(&zone))
            .all(limit);

        let mut starts: Vec<DateTime<Utc>> = result
            .dates
            .into_iter()
            .map(|dt| dt.with_timezone(&Utc) + fraction)
            .filter(|s| window.contains(*s))
            .collect();

        let truncated = starts.len() > cap;
        starts.truncate(cap);

        tracing::trace!(
            event_id = %self.event.id,
            count = starts.len(),
            truncated,
            "materialized occurrences"
        );

        Ok(Materialized { starts, truncated })
    }
}

/// Skip-list lookup built from an event's exceptions.
///
/// Only exceptions with `skipped == true` take part; matching is by instant
/// proximity within an inclusive tolerance.
#[derive(Debug, Clone)]
pub struct ExceptionFilter {
    /// Sorted skipped instants
    skipped: Vec<DateTime<Utc>>,
    tolerance: TimeDelta,
}

impl ExceptionFilter {
    pub fn new(exceptions: &[EventException], tolerance: TimeDelta) -> Self {
        let mut skipped: Vec<DateTime<Utc>> = exceptions
            .iter()
            .filter(|e| e.skipped)
            .map(|e| e.occurrence_at)
            .collect();
        skipped.sort_unstable();

        Self {
            skipped,
            tolerance: tolerance.max(TimeDelta::zero()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.skipped.is_empty()
    }

    /// True when some skipped instant lies within the tolerance of `start`.
    pub fn is_skipped(&self, start: DateTime<Utc>) -> bool {
        let lower = start - self.tolerance;
        let upper = start + self.tolerance;
        let idx = self.skipped.partition_point(|at| *at < lower);
        self.skipped.get(idx).is_some_and(|at| *at <= upper)
    }

    /// Drops skipped starts, keeping the order of the rest.
    pub fn apply(&self, mut starts: Vec<DateTime<Utc>>) -> Vec<DateTime<Utc>> {
        if !self.is_empty() {
            starts.retain(|s| !self.is_skipped(*s));
        }
        starts
    }
}

/// Removes every start within `tolerance_ms` of a skipped exception.
pub fn filter_skipped(
    starts: Vec<DateTime<Utc>>,
    exceptions: &[EventException],
    tolerance_ms: i64,
) -> Vec<DateTime<Utc>> {
    ExceptionFilter::new(exceptions, TimeDelta::milliseconds(tolerance_ms)).apply(starts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn create_event(rule: Option<&str>, start: DateTime<Utc>, minutes: i64) -> MasterEvent {
        MasterEvent {
            title: "Standup".to_string(),
            starts_at: start,
            ends_at: start + TimeDelta::minutes(minutes),
            recurrence_rule: rule.map(str::to_string),
            ..MasterEvent::default()
        }
    }

    fn window(start: DateTime<Utc>, end: DateTime<Utc>) -> TimeWindow {
        TimeWindow::new(start, end).unwrap()
    }

    mod materializer_tests {
        use super::*;

        #[test]
        fn test_daily_inclusive_window() {
            let event = create_event(Some("FREQ=DAILY"), utc(2024, 1, 1, 9, 0), 60);
            let manager = RecurrenceManager::new(&event, chrono_tz::UTC).unwrap();
            let result = manager
                .materialize(&window(utc(2024, 1, 3, 9, 0), utc(2024, 1, 5, 9, 0)), 100)
                .unwrap();

            assert_eq!(
                result.starts,
                vec![utc(2024, 1, 3, 9, 0), utc(2024, 1, 4, 9, 0), utc(2024, 1, 5, 9, 0)]
            );
            assert!(!result.truncated);
        }

        #[test]
        fn test_window_end_before_occurrence_excludes_it() {
            let event = create_event(Some("FREQ=DAILY"), utc(2024, 1, 1, 9, 0), 60);
            let manager = RecurrenceManager::new(&event, chrono_tz::UTC).unwrap();
            let result = manager
                .materialize(&window(utc(2024, 1, 3, 0, 0), utc(2024, 1, 5, 0, 0)), 100)
                .unwrap();

            assert_eq!(result.starts, vec![utc(2024, 1, 3, 9, 0), utc(2024, 1, 4, 9, 0)]);
        }

        #[test]
        fn test_weekly_until_date() {
            // 2024-01-01 is a Monday
            let event = create_event(
                Some("FREQ=WEEKLY;BYDAY=MO;UNTIL=20240201"),
                utc(2024, 1, 1, 14, 0),
                30,
            );
            let manager = RecurrenceManager::new(&event, chrono_tz::UTC).unwrap();
            let result = manager
                .materialize(&window(utc(2024, 1, 1, 0, 0), utc(2024, 3, 1, 0, 0)), 100)
                .unwrap();

            assert_eq!(
                result.starts,
                vec![
                    utc(2024, 1, 1, 14, 0),
                    utc(2024, 1, 8, 14, 0),
                    utc(2024, 1, 15, 14, 0),
                    utc(2024, 1, 22, 14, 0),
                    utc(2024, 1, 29, 14, 0),
                ]
            );
        }

        #[rstest::rstest]
        #[case(chrono_tz::Europe::Berlin, 13)]
        #[case(chrono_tz::America::New_York, 14)]
        fn test_weekly_until_in_named_zone(#[case] tz: Tz, #[case] hour: u32) {
            let event = create_event(
                Some("FREQ=WEEKLY;BYDAY=MO;UNTIL=20240201"),
                utc(2024, 1, 1, hour, 0),
                30,
            );
            let manager = RecurrenceManager::new(&event, tz).unwrap();
            let result = manager
                .materialize(&window(utc(2024, 1, 1, 0, 0), utc(2024, 3, 1, 0, 0)), 100)
                .unwrap();

            assert_eq!(result.starts.len(), 5);
            assert_eq!(result.starts.last(), Some(&utc(2024, 1, 29, hour, 0)));
        }

        #[test]
        fn test_subsecond_start_is_preserved() {
            let start = utc(2024, 1, 1, 9, 0) + TimeDelta::milliseconds(500);
            let event = create_event(Some("FREQ=DAILY"), start, 60);
            let manager = RecurrenceManager::new(&event, chrono_tz::UTC).unwrap();

            let exact = manager.materialize(&window(start, start), 10).unwrap();
            assert_eq!(exact.starts, vec![start]);

            let later = manager
                .materialize(&window(utc(2024, 1, 2, 0, 0), utc(2024, 1, 3, 0, 0)), 10)
                .unwrap();
            assert_eq!(later.starts, vec![start + TimeDelta::days(1)]);
        }

        #[test]
        fn test_count_limits_series() {
            let event = create_event(Some("FREQ=DAILY;COUNT=3"), utc(2024, 1, 1, 9, 0), 60);
            let manager = RecurrenceManager::new(&event, chrono_tz::UTC).unwrap();
            let result = manager
                .materialize(&window(utc(2024, 1, 1, 0, 0), utc(2024, 2, 1, 0, 0)), 100)
                .unwrap();
            assert_eq!(result.starts.len(), 3);
        }

        #[test]
        fn test_ended_series_is_empty() {
            let event = create_event(
                Some("FREQ=DAILY;UNTIL=20240105T000000Z"),
                utc(2024, 1, 1, 9, 0),
                60,
            );
            let manager = RecurrenceManager::new(&event, chrono_tz::UTC).unwrap();
            let result = manager
                .materialize(&window(utc(2024, 6, 1, 0, 0), utc(2024, 6, 30, 0, 0)), 100)
                .unwrap();
            assert!(result.starts.is_empty());
        }

        #[test]
        fn test_until_before_start_is_empty() {
            let event = create_event(
                Some("FREQ=DAILY;UNTIL=20231201T000000Z"),
                utc(2024, 1, 1, 9, 0),
                60,
            );
            let manager = RecurrenceManager::new(&event, chrono_tz::UTC).unwrap();
            let result = manager
                .materialize(&window(utc(2023, 1, 1, 0, 0), utc(2024, 6, 30, 0, 0)), 100)
                .unwrap();
            assert!(result.starts.is_empty());
        }

        #[test]
        fn test_cap_truncates() {
            let event = create_event(Some("FREQ=DAILY"), utc(2024, 1, 1, 9, 0), 60);
            let manager = RecurrenceManager::new(&event, chrono_tz::UTC).unwrap();
            let result = manager
                .materialize(&window(utc(2024, 1, 1, 0, 0), utc(2024, 12, 31, 0, 0)), 10)
                .unwrap();

            assert_eq!(result.starts.len(), 10);
            assert!(result.truncated);
            assert_eq!(result.starts[9], utc(2024, 1, 10, 9, 0));
        }

        #[test]
        fn test_exact_cap_is_not_truncated() {
            let event = create_event(Some("FREQ=DAILY;COUNT=5"), utc(2024, 1, 1, 9, 0), 60);
            let manager = RecurrenceManager::new(&event, chrono_tz::UTC).unwrap();
            let result = manager
                .materialize(&window(utc(2024, 1, 1, 0, 0), utc(2024, 12, 31, 0, 0)), 5)
                .unwrap();
            assert_eq!(result.starts.len(), 5);
            assert!(!result.truncated);
        }

        #[test]
        fn test_local_time_survives_dst() {
            // 09:00 New York is 14:00Z in winter and 13:00Z after 2024-03-10
            let event = create_event(Some("FREQ=DAILY"), utc(2024, 3, 8, 14, 0), 60);
            let manager = RecurrenceManager::new(&event, chrono_tz::America::New_York).unwrap();
            let result = manager
                .materialize(&window(utc(2024, 3, 9, 0, 0), utc(2024, 3, 11, 23, 0)), 100)
                .unwrap();

            assert_eq!(
                result.starts,
                vec![utc(2024, 3, 9, 14, 0), utc(2024, 3, 10, 13, 0), utc(2024, 3, 11, 13, 0)]
            );
        }

        #[test]
        fn test_non_recurring_passthrough() {
            let event = create_event(None, utc(2024, 1, 2, 9, 0), 60);
            let manager = RecurrenceManager::new(&event, chrono_tz::UTC).unwrap();
            assert!(!manager.is_recurring());

            let inside = manager
                .materialize(&window(utc(2024, 1, 1, 0, 0), utc(2024, 1, 3, 0, 0)), 100)
                .unwrap();
            assert_eq!(inside.starts, vec![event.starts_at]);

            let outside = manager
                .materialize(&window(utc(2024, 2, 1, 0, 0), utc(2024, 2, 3, 0, 0)), 100)
                .unwrap();
            assert!(outside.starts.is_empty());
        }

        #[test]
        fn test_invalid_rule_is_error() {
            let event = create_event(Some("FREQ=SECONDLY"), utc(2024, 1, 1, 9, 0), 60);
            assert!(RecurrenceManager::new(&event, chrono_tz::UTC).is_err());
        }

        #[test]
        fn test_inverted_window_rejected() {
            let result = TimeWindow::new(utc(2024, 1, 5, 0, 0), utc(2024, 1, 3, 0, 0));
            assert!(matches!(result, Err(CoreError::InvertedWindow { .. })));
        }
    }

    mod exception_filter_tests {
        use super::*;

        fn skip(at: DateTime<Utc>) -> EventException {
            EventException::skip(Uuid::now_v7(), at)
        }

        #[test]
        fn test_exact_match_removed() {
            let starts = vec![utc(2024, 1, 3, 9, 0), utc(2024, 1, 4, 9, 0), utc(2024, 1, 5, 9, 0)];
            let result = filter_skipped(starts, &[skip(utc(2024, 1, 4, 9, 0))], 60_000);
            assert_eq!(result, vec![utc(2024, 1, 3, 9, 0), utc(2024, 1, 5, 9, 0)]);
        }

        #[test]
        fn test_within_tolerance_removed() {
            let starts = vec![utc(2024, 1, 3, 9, 0), utc(2024, 1, 4, 9, 0)];
            let off = utc(2024, 1, 4, 9, 0) + TimeDelta::seconds(30);
            let result = filter_skipped(starts, &[skip(off)], 60_000);
            assert_eq!(result, vec![utc(2024, 1, 3, 9, 0)]);
        }

        #[test]
        fn test_tolerance_is_inclusive() {
            let at = utc(2024, 1, 4, 9, 0);
            let filter = ExceptionFilter::new(&[skip(at + TimeDelta::minutes(1))], TimeDelta::minutes(1));
            assert!(filter.is_skipped(at));
            assert!(!filter.is_skipped(at - TimeDelta::milliseconds(1)));
        }

        #[test]
        fn test_unskipped_exception_ignored() {
            let at = utc(2024, 1, 4, 9, 0);
            let mut exception = skip(at);
            exception.skipped = false;
            assert_eq!(filter_skipped(vec![at], &[exception], 60_000), vec![at]);
        }

        #[test]
        fn test_any_skipped_match_wins() {
            let at = utc(2024, 1, 4, 9, 0);
            let mut restored = skip(at);
            restored.skipped = false;
            let result = filter_skipped(vec![at], &[restored, skip(at + TimeDelta::seconds(5))], 60_000);
            assert!(result.is_empty());
        }

        #[test]
        fn test_negative_tolerance_treated_as_zero() {
            let at = utc(2024, 1, 4, 9, 0);
            let filter = ExceptionFilter::new(&[skip(at)], TimeDelta::milliseconds(-500));
            assert!(filter.is_skipped(at));
            assert!(!filter.is_skipped(at + TimeDelta::milliseconds(1)));
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_filter_preserves_order_and_only_removes(
                offsets in prop::collection::vec(0i64..100_000, 0..50),
                skips in prop::collection::vec(0i64..100_000, 0..10),
                tolerance in 0i64..5_000,
            ) {
                let base = utc(2024, 1, 1, 0, 0);
                let starts: Vec<_> = offsets.iter().map(|o| base + TimeDelta::seconds(*o)).collect();
                let exceptions: Vec<_> = skips
                    .iter()
                    .map(|o| EventException::skip(Uuid::nil(), base + TimeDelta::seconds(*o)))
                    .collect();

                let kept = filter_skipped(starts.clone(), &exceptions, tolerance);

                // kept is a subsequence of starts
                let mut it = starts.iter();
                for k in &kept {
                    prop_assert!(it.any(|s| s == k));
                }
                // a start is removed iff a skip lies within tolerance of it
                for s in &starts {
                    let near = exceptions
                        .iter()
                        .any(|e| (e.occurrence_at - *s).num_milliseconds().abs() <= tolerance);
                    prop_assert_eq!(kept.contains(s), !near);
                }
            }

            #[test]
            fn prop_daily_starts_stay_in_window(
                from_day in 0i64..60,
                span_hours in 0i64..(24 * 30),
            ) {
                let event = create_event(Some("FREQ=DAILY"), utc(2024, 1, 1, 9, 0), 60);
                let manager = RecurrenceManager::new(&event, chrono_tz::UTC).unwrap();
                let start = utc(2024, 1, 1, 0, 0) + TimeDelta::days(from_day);
                let w = window(start, start + TimeDelta::hours(span_hours));

                let result = manager.materialize(&w, 1_000).unwrap();
                prop_assert!(result.starts.iter().all(|s| w.contains(*s)));
                prop_assert!(result.starts.windows(2).all(|p| p[0] < p[1]));
            }
        }
    }
}
