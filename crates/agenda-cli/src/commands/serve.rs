use agenda_cli::api;
use agenda_cli::config::Config;
use anyhow::Result;

use crate::cli::ServeCommand;

pub async fn serve(command: ServeCommand, config: &Config) -> Result<()> {
    let host = command.host.as_deref().unwrap_or(&config.server.host);
    let port = command.port.unwrap_or(config.server.port);
    api::serve(host, port, config).await
}
