use agenda_cli::config::Config;
use agenda_cli::parser::parse_datetime;
use agenda_core::expansion::ExpansionEngine;
use agenda_core::repository::Repository;
use agenda_core::timezone::validate_timezone;
use anyhow::Result;
use chrono::{TimeDelta, Utc};
use owo_colors::{OwoColorize, Style};

use crate::cli::ListCommand;
use crate::views::table::display_instances;

const DEFAULT_SPAN_DAYS: i64 = 7;

pub async fn list_events(
    repo: &impl Repository,
    engine: &ExpansionEngine,
    command: ListCommand,
    config: &Config,
) -> Result<()> {
    let tz = validate_timezone(
        command
            .timezone
            .as_deref()
            .unwrap_or(&config.expansion.default_timezone),
    )?;

    let now = Utc::now();
    let from = match &command.from {
        Some(from) => parse_datetime(from, tz, now)?,
        None => now,
    };
    let to = match &command.to {
        Some(to) => parse_datetime(to, tz, now)?,
        None => from + TimeDelta::days(DEFAULT_SPAN_DAYS),
    };

    // Reject a bad window before touching storage.
    let window = engine.window(from, to)?;
    let events = repo.find_events_for_window(window.start, window.end).await?;
    let expansion = engine.expand(&events, &window);

    display_instances(&expansion.instances, tz);

    if expansion.is_partial() {
        let warn_style = Style::new().yellow();
        println!();
        for degradation in &expansion.degraded {
            let title = events
                .iter()
                .find(|e| e.event.id == degradation.event_id)
                .map(|e| e.event.title.as_str())
                .unwrap_or("?");
            println!(
                "{} {}: {}",
                "⚠".style(warn_style),
                title.bold(),
                degradation.reason.style(warn_style)
            );
        }
    }

    Ok(())
}
