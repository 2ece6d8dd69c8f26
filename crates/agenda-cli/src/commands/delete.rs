use agenda_core::repository::Repository;
use anyhow::Result;
use dialoguer::Confirm;
use owo_colors::{OwoColorize, Style};

use crate::cli::DeleteCommand;
use crate::util::resolve_event_id;

pub async fn delete_event(repo: &impl Repository, command: DeleteCommand) -> Result<()> {
    let event_id = resolve_event_id(repo, &command.id).await?;

    if !command.force {
        let title = match repo.find_event_by_id(event_id).await? {
            Some(event) => event.title,
            None => event_id.to_string(),
        };
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete '{}' and all of its exceptions?", title))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    repo.delete_event(event_id).await?;

    let success_style = Style::new().green().bold();
    println!("{} Event deleted.", "✓".style(success_style));
    Ok(())
}
