//! # Agenda Core Library
//!
//! Calendar storage and recurring-event expansion: turns stored events and
//! their skip exceptions into the concrete occurrences of a time window.
//!
//! ## Features
//!
//! - **Typed Recurrence Rules**: an RFC 5545 `RRULE` subset parsed once into
//!   a structured value; unsupported syntax is rejected
//! - **Timezone Awareness**: rules resolve in the event's IANA zone, so local
//!   times survive DST changes
//! - **Skip Exceptions**: occurrences are hidden by instant proximity within a
//!   configurable tolerance
//! - **Stable Identity**: every occurrence carries a deterministic id derived
//!   from its master and start instant
//! - **Graceful Degradation**: one broken event never fails a whole window
//!
//! ## Core Modules
//!
//! - [`db`]: Database connection and migration management
//! - [`models`]: Core data structures and transfer objects
//! - [`repository`]: Data access layer with Repository pattern
//! - [`rule`]: Recurrence rule parsing
//! - [`recurrence`]: Occurrence materialization and exception filtering
//! - [`occurrence`]: Occurrence instances, identity and reminders
//! - [`expansion`]: Batch expansion of a window
//! - [`timezone`]: Timezone utilities and validation
//! - [`error`]: Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use agenda_core::{
//!     db, error::CoreError, expansion::ExpansionEngine, models::NewEventData,
//!     repository::{EventRepository, SqliteRepository},
//! };
//! use chrono::{TimeDelta, TimeZone, Utc};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CoreError> {
//!     let pool = db::establish_connection("agenda.db").await?;
//!     let repo = SqliteRepository::new(pool);
//!
//!     let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
//!     repo.add_event(NewEventData {
//!         title: "Daily standup".to_string(),
//!         starts_at: start,
//!         ends_at: start + TimeDelta::minutes(15),
//!         recurrence_rule: Some("FREQ=DAILY;BYDAY=MO,TU,WE,TH,FR".to_string()),
//!         timezone: Some("America/New_York".to_string()),
//!         ..Default::default()
//!     })
//!     .await?;
//!
//!     let end = start + TimeDelta::days(7);
//!     let events = repo.find_events_for_window(start, end).await?;
//!     let expansion = ExpansionEngine::with_defaults().expand_between(&events, start, end)?;
//!     for instance in &expansion.instances {
//!         println!("{} {}", instance.starts_at, instance.title());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod error;
pub mod expansion;
pub mod models;
pub mod occurrence;
pub mod recurrence;
pub mod repository;
pub mod rule;
pub mod timezone;
