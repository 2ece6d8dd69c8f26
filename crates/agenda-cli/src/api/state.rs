use std::sync::Arc;

use agenda_core::expansion::ExpansionEngine;
use agenda_core::repository::SqliteRepository;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub repo: SqliteRepository,
    pub engine: ExpansionEngine,
}

impl AppState {
    pub fn new(repo: SqliteRepository, engine: ExpansionEngine) -> Self {
        Self { repo, engine }
    }
}
