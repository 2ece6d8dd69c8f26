use agenda_cli::config::Config;
use agenda_core::db;
use agenda_core::error::CoreError;
use agenda_core::expansion::ExpansionEngine;
use agenda_core::models::ExpansionConfig;
use agenda_core::repository::SqliteRepository;
use anyhow::Context;
use clap::Parser;
use owo_colors::{OwoColorize, Style};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod util;
mod views;

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = cli::Cli::parse();

    let config = match Config::new() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} invalid configuration: {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli.command, &config).await {
        handle_error(e);
        std::process::exit(1);
    }
}

async fn run(command: cli::Commands, config: &Config) -> anyhow::Result<()> {
    match command {
        cli::Commands::Serve(command) => commands::serve::serve(command, config).await,
        cli::Commands::Add(command) => {
            let repository = open_repository(config).await?;
            commands::add::add_event(&repository, command, config).await
        }
        cli::Commands::List(command) => {
            let repository = open_repository(config).await?;
            let engine = build_engine(config)?;
            commands::list::list_events(&repository, &engine, command, config).await
        }
        cli::Commands::Skip(command) => {
            let repository = open_repository(config).await?;
            let engine = build_engine(config)?;
            commands::skip::skip_occurrence(&repository, &engine, command, config).await
        }
        cli::Commands::Restore(command) => {
            let repository = open_repository(config).await?;
            let engine = build_engine(config)?;
            commands::skip::restore_occurrence(&repository, &engine, command, config).await
        }
        cli::Commands::Delete(command) => {
            let repository = open_repository(config).await?;
            commands::delete::delete_event(&repository, command).await
        }
    }
}

async fn open_repository(config: &Config) -> anyhow::Result<SqliteRepository> {
    let pool = db::establish_connection(&config.database_path)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database_path))?;
    Ok(SqliteRepository::new(pool))
}

fn build_engine(config: &Config) -> Result<ExpansionEngine, CoreError> {
    ExpansionEngine::new(ExpansionConfig::from(&config.expansion))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("agenda=info,agenda_cli=info,agenda_core=info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    match err.downcast_ref::<CoreError>() {
        Some(CoreError::NotFound(s)) => {
            eprintln!("{} {}", "Error:".style(error_style), s);
        }
        Some(CoreError::AmbiguousId(events)) => {
            eprintln!("{}", "Error: Ambiguous ID.".style(error_style));
            eprintln!("Did you mean one of these?");
            for (id, title) in events {
                eprintln!("  {} ({})", id.yellow(), title);
            }
        }
        Some(CoreError::InvalidInput(s)) => {
            eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
        }
        Some(CoreError::InvalidRule(rule_error)) => {
            eprintln!(
                "{} Invalid recurrence rule: {}",
                "Error:".style(error_style),
                rule_error.yellow()
            );
        }
        Some(core_error @ (CoreError::InvertedWindow { .. } | CoreError::WindowTooLarge { .. })) => {
            eprintln!("{} {}", "Error:".style(error_style), core_error);
        }
        _ => eprintln!("{} {:#}", "Error:".style(error_style), err),
    }
}
