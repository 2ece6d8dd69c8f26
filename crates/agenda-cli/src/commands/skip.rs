use agenda_cli::config::Config;
use agenda_cli::parser::parse_datetime;
use agenda_core::error::CoreError;
use agenda_core::expansion::ExpansionEngine;
use agenda_core::models::{MasterEvent, NewEventException};
use agenda_core::repository::Repository;
use agenda_core::timezone::{format_with_timezone, resolve_timezone};
use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use owo_colors::{OwoColorize, Style};

use crate::cli::{RestoreCommand, SkipCommand};
use crate::util::resolve_event_id;

pub async fn skip_occurrence(
    repo: &impl Repository,
    engine: &ExpansionEngine,
    command: SkipCommand,
    config: &Config,
) -> Result<()> {
    let (event, tz, occurrence_at) = find_occurrence(repo, engine, &command.id, &command.at, config).await?;

    repo.upsert_exception(NewEventException {
        event_id: event.id,
        occurrence_at,
        skipped: true,
        note: command.note,
    })
    .await?;

    let success_style = Style::new().green().bold();
    println!(
        "{} Skipped {} on {}",
        "✓".style(success_style),
        event.title.bright_white().bold(),
        format_with_timezone(occurrence_at, tz, "%a %Y-%m-%d %H:%M %Z")
    );
    Ok(())
}

pub async fn restore_occurrence(
    repo: &impl Repository,
    engine: &ExpansionEngine,
    command: RestoreCommand,
    config: &Config,
) -> Result<()> {
    let (event, tz, occurrence_at) = find_occurrence(repo, engine, &command.id, &command.at, config).await?;

    repo.upsert_exception(NewEventException {
        event_id: event.id,
        occurrence_at,
        skipped: false,
        note: None,
    })
    .await?;

    let success_style = Style::new().green().bold();
    println!(
        "{} Restored {} on {}",
        "✓".style(success_style),
        event.title.bright_white().bold(),
        format_with_timezone(occurrence_at, tz, "%a %Y-%m-%d %H:%M %Z")
    );
    Ok(())
}

/// Resolves the event and pins `at` to the exact start of one of its occurrences.
async fn find_occurrence(
    repo: &impl Repository,
    engine: &ExpansionEngine,
    id: &str,
    at: &str,
    config: &Config,
) -> Result<(MasterEvent, Tz, DateTime<Utc>)> {
    let event_id = resolve_event_id(repo, id).await?;
    let event = repo
        .find_event_by_id(event_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("event {}", event_id)))?;

    if !event.is_recurring() {
        return Err(CoreError::InvalidInput(format!(
            "'{}' does not repeat; delete it instead of skipping an occurrence",
            event.title
        ))
        .into());
    }

    let tz = resolve_timezone(event.timezone.as_deref(), engine.default_timezone())?;
    let requested = parse_datetime(at, tz, Utc::now())?;
    let occurrence_at = engine.locate_occurrence(&event, requested)?.ok_or_else(|| {
        CoreError::InvalidInput(format!(
            "'{}' has no occurrence within {}ms of {}",
            event.title,
            config.expansion.tolerance_ms,
            format_with_timezone(requested, tz, "%a %Y-%m-%d %H:%M %Z")
        ))
    })?;

    Ok((event, tz, occurrence_at))
}
