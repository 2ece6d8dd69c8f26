use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::error::CoreError;

pub type DbPool = SqlitePool;

/// Opens (creating if needed) the database at `database` and applies pending
/// migrations. `":memory:"` gives a private in-memory database.
pub async fn establish_connection(database: &str) -> Result<DbPool, CoreError> {
    let in_memory = matches!(database, ":memory:" | "sqlite::memory:");

    let pool = if in_memory {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        // Every connection to :memory: is a separate database.
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        let options = SqliteConnectOptions::new()
            .filename(database)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?
    };

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::debug!(database, "database ready");

    Ok(pool)
}
