use crate::error::CoreError;
use chrono::{DateTime, LocalResult, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Parse an IANA timezone name
pub fn validate_timezone(timezone: &str) -> Result<Tz, CoreError> {
    Tz::from_str(timezone.trim()).map_err(|_| CoreError::InvalidTimezone(timezone.to_string()))
}

/// The zone an event's rule resolves against: its own when set, `default` otherwise
pub fn resolve_timezone(timezone: Option<&str>, default: Tz) -> Result<Tz, CoreError> {
    match timezone.map(str::trim).filter(|tz| !tz.is_empty()) {
        Some(name) => validate_timezone(name),
        None => Ok(default),
    }
}

/// Interpret a wall-clock time in `tz`.
///
/// Ambiguous times (DST fall back) take the earlier instant. Times inside a
/// spring-forward gap are moved forward by the gap, the way clocks do.
pub fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>, CoreError> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => tz
            .from_local_datetime(&(naive + TimeDelta::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| CoreError::InvalidInput(format!("{} does not exist in {}", naive, tz))),
    }
}

/// Format datetime in the given zone
pub fn format_with_timezone(datetime: DateTime<Utc>, tz: Tz, format: &str) -> String {
    datetime.with_timezone(&tz).format(format).to_string()
}

/// Get timezone abbreviation (e.g., "EST", "EDT")
pub fn timezone_abbreviation(tz: Tz, at_time: DateTime<Utc>) -> String {
    at_time.with_timezone(&tz).format("%Z").to_string()
}
