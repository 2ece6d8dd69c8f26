use agenda_core::occurrence::OccurrenceInstance;
use agenda_core::timezone::{format_with_timezone, timezone_abbreviation};
use chrono::Utc;
use chrono_tz::Tz;
use comfy_table::{Attribute, Cell, Color, Row, Table};

/// Width of the short ids shown in tables; long enough to pass back as a prefix
const SHORT_ID_LEN: usize = 8;

pub fn display_instances(instances: &[OccurrenceInstance<'_>], tz: Tz) {
    if instances.is_empty() {
        println!("No events found.");
        return;
    }

    let now = Utc::now();
    let mut table = Table::new();
    table.set_header(vec!["ID", "When", "Title", "Location"]);

    for instance in instances {
        let mut row = Row::new();
        row.add_cell(Cell::new(&instance.source_event_id.to_string()[..SHORT_ID_LEN]));

        let same_day = instance.starts_at.with_timezone(&tz).date_naive()
            == instance.ends_at.with_timezone(&tz).date_naive();
        let end_format = if same_day { "%H:%M" } else { "%a %Y-%m-%d %H:%M" };
        let when = format!(
            "{}–{} {}",
            format_with_timezone(instance.starts_at, tz, "%a %Y-%m-%d %H:%M"),
            format_with_timezone(instance.ends_at, tz, end_format),
            timezone_abbreviation(tz, instance.starts_at),
        );
        let when_cell = if instance.ends_at < now {
            Cell::new(when).fg(Color::DarkGrey)
        } else if instance.starts_at <= now {
            Cell::new(when).fg(Color::Green).add_attribute(Attribute::Bold)
        } else {
            Cell::new(when)
        };
        row.add_cell(when_cell);

        // Build title with visual indicators
        let mut display_title = String::new();
        if instance.is_recurrence {
            display_title.push('↻'); // Recurring symbol
            display_title.push(' ');
        }
        display_title.push_str(instance.title());
        if instance.degraded {
            display_title.push_str(" ⚠");
        }
        let title_cell = if instance.degraded {
            Cell::new(display_title).fg(Color::Yellow)
        } else {
            Cell::new(display_title)
        };
        row.add_cell(title_cell);

        row.add_cell(Cell::new(instance.location().unwrap_or("")));
        table.add_row(row);
    }

    println!("{table}");
}
