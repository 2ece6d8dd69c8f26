use std::fmt;

use clap::{Parser, Subcommand, ValueEnum};

/// Personal calendar with recurring events
#[derive(Parser, Debug)]
#[command(name = "agenda", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Add a new event
    Add(AddCommand),
    /// List occurrences in a time window
    List(ListCommand),
    /// Skip one occurrence of a recurring event
    Skip(SkipCommand),
    /// Bring back a skipped occurrence
    Restore(RestoreCommand),
    /// Delete an event and all of its exceptions
    Delete(DeleteCommand),
    /// Run the HTTP API
    Serve(ServeCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// The title of the event
    pub title: String,
    /// When the (first) occurrence starts, e.g. '2024-01-03 09:00'
    #[clap(short, long)]
    pub start: String,
    /// When it ends; defaults to start plus --duration
    #[clap(short, long, conflicts_with = "duration")]
    pub end: Option<String>,
    /// Length of each occurrence, e.g. '45', '90m', '2h'
    #[clap(long, default_value = "60")]
    pub duration: String,
    /// The description of the event
    #[clap(short, long)]
    pub description: Option<String>,
    /// Where the event takes place
    #[clap(short, long)]
    pub location: Option<String>,
    #[clap(long, conflicts_with_all = ["every", "on"], help = "RRULE text, e.g. FREQ=WEEKLY;BYDAY=MO,WE")]
    pub recurrence: Option<String>,
    #[clap(long, value_enum, help = "Repeat on a common schedule instead of writing a rule")]
    pub every: Option<RecurrenceShortcut>,
    #[clap(long, requires = "every", help = "Days of week (mon,tue,wed,thu,fri,sat,sun)")]
    pub on: Option<String>,
    #[clap(long, requires = "every", conflicts_with = "count", help = "Last day of the series (e.g., '2025-12-31')")]
    pub until: Option<String>,
    #[clap(long, requires = "every", help = "Maximum number of occurrences")]
    pub count: Option<u32>,
    /// IANA zone the start and the rule are read in, e.g. 'America/New_York'
    #[clap(long)]
    pub timezone: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// Start of the window (default: now)
    #[clap(long)]
    pub from: Option<String>,
    /// End of the window (default: seven days after --from)
    #[clap(long)]
    pub to: Option<String>,
    /// Zone to display times in (default: configured timezone)
    #[clap(long)]
    pub timezone: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct SkipCommand {
    /// The ID (or ID prefix) of the recurring event
    pub id: String,
    /// Start of the occurrence to skip
    #[clap(long)]
    pub at: String,
    /// Why the occurrence is skipped
    #[clap(long)]
    pub note: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct RestoreCommand {
    /// The ID (or ID prefix) of the recurring event
    pub id: String,
    /// Start of the occurrence to bring back
    #[clap(long)]
    pub at: String,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    /// The ID of the event to delete
    pub id: String,
    /// Skip the confirmation prompt
    #[clap(short, long)]
    pub force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ServeCommand {
    /// Address to bind (default: server.host from config)
    #[clap(long)]
    pub host: Option<String>,
    /// Port to listen on (default: server.port from config)
    #[clap(long)]
    pub port: Option<u16>,
}

/// Schedules accepted by `add --every`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceShortcut {
    /// Every day
    Daily,
    /// Every week (same day)
    Weekly,
    /// Same day of the month
    Monthly,
    /// Same date each year
    Yearly,
    /// Monday to Friday
    Weekdays,
    /// Saturday and Sunday
    Weekends,
}

impl fmt::Display for RecurrenceShortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => Ok(()),
        }
    }
}

impl RecurrenceShortcut {
    /// Rule text for this schedule
    pub fn to_rrule(self) -> &'static str {
        match self {
            RecurrenceShortcut::Daily => "FREQ=DAILY",
            RecurrenceShortcut::Weekly => "FREQ=WEEKLY",
            RecurrenceShortcut::Monthly => "FREQ=MONTHLY",
            RecurrenceShortcut::Yearly => "FREQ=YEARLY",
            RecurrenceShortcut::Weekdays => "FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR",
            RecurrenceShortcut::Weekends => "FREQ=WEEKLY;BYDAY=SA,SU",
        }
    }
}
