use agenda_core::error::CoreError;
use agenda_core::timezone::local_to_utc;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use chrono_tz::Tz;

const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parses a user-supplied instant.
///
/// Accepts RFC 3339 (`2024-01-03T09:00:00Z`), local date-times
/// (`2024-01-03 09:00`), bare dates (local midnight) and the keywords
/// `now`, `today`, `tomorrow` and `yesterday`. Local values resolve in `tz`.
pub fn parse_datetime(input: &str, tz: Tz, now: DateTime<Utc>) -> Result<DateTime<Utc>, CoreError> {
    let input = input.trim();

    let today = now.with_timezone(&tz).date_naive();
    let keyword_day = match input.to_ascii_lowercase().as_str() {
        "now" => return Ok(now),
        "today" => Some(today),
        "tomorrow" => today.succ_opt(),
        "yesterday" => today.pred_opt(),
        _ => None,
    };
    if let Some(day) = keyword_day {
        return local_to_utc(NaiveDateTime::new(day, NaiveTime::MIN), tz);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in LOCAL_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return local_to_utc(naive, tz);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return local_to_utc(NaiveDateTime::new(date, NaiveTime::MIN), tz);
    }

    Err(CoreError::InvalidInput(format!(
        "Could not understand date '{}'. Use e.g. '2024-01-03 09:00', '2024-01-03' or an RFC 3339 timestamp",
        input
    )))
}

/// Parses a duration given in minutes (`90`) or with a unit (`90m`, `2h`, `1d`).
pub fn parse_duration(input: &str) -> Result<TimeDelta, CoreError> {
    let input = input.trim().to_ascii_lowercase();
    let (digits, unit) = match input.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => input.split_at(idx),
        None => (input.as_str(), "m"),
    };

    let amount: i64 = digits
        .parse()
        .map_err(|_| CoreError::InvalidInput(format!("Invalid duration '{}'", input)))?;
    match unit {
        "m" | "min" => Ok(TimeDelta::minutes(amount)),
        "h" => Ok(TimeDelta::hours(amount)),
        "d" => Ok(TimeDelta::days(amount)),
        _ => Err(CoreError::InvalidInput(format!(
            "Invalid duration unit '{}', use m, h or d",
            unit
        ))),
    }
}
