use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

/// Test harness for running CLI commands against a temporary database
pub struct CliTestHarness {
    temp_dir: TempDir,
    db_path: PathBuf,
}

impl CliTestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");

        Self { temp_dir, db_path }
    }

    /// A Command isolated from the user's config file and environment
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("agenda").expect("Failed to find agenda binary");

        cmd.current_dir(self.temp_dir.path())
            .env("AGENDA_CONFIG", self.temp_dir.path().join("agenda.toml"))
            .env("AGENDA_DATABASE_PATH", &self.db_path)
            .env("AGENDA_EXPANSION__DEFAULT_TIMEZONE", "UTC")
            .env_remove("RUST_LOG");

        cmd
    }

    #[allow(dead_code)]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }

    /// Runs `add` and returns the id printed for the new event
    pub fn add_event(&self, args: &[&str]) -> Uuid {
        let mut full = vec!["add"];
        full.extend_from_slice(args);
        let output = self.run_success(&full).get_output().stdout.clone();
        extract_id(&String::from_utf8_lossy(&output)).expect("add printed no event id")
    }

    /// Runs `list` over the first week of 2024
    pub fn list_first_week(&self) -> String {
        let output = self
            .run_success(&["list", "--from", "2024-01-01", "--to", "2024-01-08"])
            .get_output()
            .stdout
            .clone();
        String::from_utf8_lossy(&output).into_owned()
    }
}

/// Finds the first hyphenated UUID in `text`, ignoring any colour codes around it.
pub fn extract_id(text: &str) -> Option<Uuid> {
    let bytes = text.as_bytes();
    (0..bytes.len().saturating_sub(35))
        .filter(|&i| text.is_char_boundary(i) && text.is_char_boundary(i + 36))
        .find_map(|i| Uuid::parse_str(&text[i..i + 36]).ok())
}

/// Utility predicates for test assertions
pub mod assertions {
    use predicates::prelude::*;

    pub fn has_event_table_headers() -> impl Predicate<str> {
        predicate::str::contains("ID")
            .and(predicate::str::contains("When"))
            .and(predicate::str::contains("Title"))
    }

    pub fn event_created_successfully() -> impl Predicate<str> {
        predicate::str::contains("✓").and(predicate::str::contains("Created"))
    }

    pub fn has_error() -> impl Predicate<str> {
        predicate::str::contains("Error").or(predicate::str::contains("error"))
    }
}
