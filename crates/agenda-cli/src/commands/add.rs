use agenda_cli::config::Config;
use agenda_cli::parser::{parse_datetime, parse_duration};
use agenda_core::error::CoreError;
use agenda_core::models::NewEventData;
use agenda_core::repository::Repository;
use agenda_core::timezone::{format_with_timezone, validate_timezone};
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use owo_colors::{OwoColorize, Style};

use crate::cli::{AddCommand, RecurrenceShortcut};

pub async fn add_event(repo: &impl Repository, command: AddCommand, config: &Config) -> Result<()> {
    let timezone = command
        .timezone
        .as_deref()
        .map(validate_timezone)
        .transpose()?;
    let tz = match timezone {
        Some(tz) => tz,
        None => validate_timezone(&config.expansion.default_timezone)?,
    };

    let now = Utc::now();
    let starts_at = parse_datetime(&command.start, tz, now)?;
    let ends_at = match &command.end {
        Some(end) => parse_datetime(end, tz, now)?,
        None => starts_at + parse_duration(&command.duration)?,
    };

    let recurrence_rule = match (command.recurrence, command.every) {
        (Some(raw), _) => Some(raw),
        (None, Some(shortcut)) => Some(build_rule(
            shortcut,
            command.on.as_deref(),
            command.until.as_deref(),
            command.count,
        )?),
        (None, None) => None,
    };

    // Recurring events keep the zone they were created in, so a later change
    // of the configured default does not move them.
    let timezone = match (&recurrence_rule, timezone) {
        (_, Some(tz)) => Some(tz.name().to_string()),
        (Some(_), None) => Some(tz.name().to_string()),
        (None, None) => None,
    };

    let added = repo
        .add_event(NewEventData {
            title: command.title,
            description: command.description,
            location: command.location,
            starts_at,
            ends_at,
            recurrence_rule,
            timezone,
        })
        .await?;

    let success_style = Style::new().green().bold();
    let info_style = Style::new().blue();
    let subtle_style = Style::new().bright_black();

    let kind = if added.is_recurring() { "recurring event" } else { "event" };
    println!(
        "{} Created {}: {}",
        "✓".style(success_style),
        kind,
        added.title.bright_white().bold()
    );
    println!(
        "  {} {}",
        "Starts:".style(info_style),
        format_with_timezone(added.starts_at, tz, "%a %Y-%m-%d %H:%M %Z")
    );
    if let Some(rule) = &added.recurrence_rule {
        println!("  {} {}", "Repeats:".style(info_style), rule);
    }
    println!("  {} {}", "ID:".style(subtle_style), added.id.style(subtle_style));

    Ok(())
}

/// Builds rule text from the `--every` family of flags.
fn build_rule(
    shortcut: RecurrenceShortcut,
    on: Option<&str>,
    until: Option<&str>,
    count: Option<u32>,
) -> Result<String, CoreError> {
    let mut rule = shortcut.to_rrule().to_string();

    if let Some(days) = on {
        if shortcut != RecurrenceShortcut::Weekly {
            return Err(CoreError::InvalidInput(format!(
                "--on only applies to --every weekly, not {}",
                shortcut
            )));
        }
        let codes = days
            .split(',')
            .map(|day| weekday_code(day.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        rule.push_str(";BYDAY=");
        rule.push_str(&codes.join(","));
    }

    if let Some(until) = until {
        let date = NaiveDate::parse_from_str(until.trim(), "%Y-%m-%d").map_err(|_| {
            CoreError::InvalidInput(format!("Invalid --until date '{}', expected YYYY-MM-DD", until))
        })?;
        rule.push_str(&format!(";UNTIL={}", date.format("%Y%m%d")));
    }

    if let Some(count) = count {
        rule.push_str(&format!(";COUNT={}", count));
    }

    Ok(rule)
}

fn weekday_code(day: &str) -> Result<&'static str, CoreError> {
    match day.to_ascii_lowercase().as_str() {
        "mon" | "monday" | "mo" => Ok("MO"),
        "tue" | "tuesday" | "tu" => Ok("TU"),
        "wed" | "wednesday" | "we" => Ok("WE"),
        "thu" | "thursday" | "th" => Ok("TH"),
        "fri" | "friday" | "fr" => Ok("FR"),
        "sat" | "saturday" | "sa" => Ok("SA"),
        "sun" | "sunday" | "su" => Ok("SU"),
        _ => Err(CoreError::InvalidInput(format!("Unknown weekday '{}'", day))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_rule_weekly_with_days() {
        let rule = build_rule(RecurrenceShortcut::Weekly, Some("mon, Wed,fri"), None, Some(6)).unwrap();
        assert_eq!(rule, "FREQ=WEEKLY;BYDAY=MO,WE,FR;COUNT=6");
    }

    #[test]
    fn test_build_rule_until_is_date_only() {
        let rule = build_rule(RecurrenceShortcut::Weekdays, None, Some("2024-02-01"), None).unwrap();
        assert_eq!(rule, "FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR;UNTIL=20240201");
    }

    #[test]
    fn test_build_rule_rejects_bad_input() {
        assert!(build_rule(RecurrenceShortcut::Daily, Some("mon"), None, None).is_err());
        assert!(build_rule(RecurrenceShortcut::Weekly, Some("funday"), None, None).is_err());
        assert!(build_rule(RecurrenceShortcut::Weekly, None, Some("soon"), None).is_err());
    }
}
