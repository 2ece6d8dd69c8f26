use agenda_core::models::ExpansionConfig;
use agenda_core::timezone::validate_timezone;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Config file read when `AGENDA_CONFIG` is not set
pub const DEFAULT_CONFIG_FILE: &str = "agenda.toml";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// SQLite database file
    pub database_path: String,
    pub server: ServerConfig,
    pub expansion: ExpansionSettings,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Configuration for window expansion
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ExpansionSettings {
    /// User's default timezone (IANA format), used for events without one
    pub default_timezone: String,
    /// How close a skip must be to an occurrence to hide it
    pub tolerance_ms: i64,
    /// Per-event cap on occurrences in one window
    pub max_occurrences: usize,
    /// Widest window accepted
    pub max_window_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "agenda.db".to_string(),
            server: ServerConfig::default(),
            expansion: ExpansionSettings::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for ExpansionSettings {
    fn default() -> Self {
        let core = ExpansionConfig::default();
        Self {
            default_timezone: detect_system_timezone(),
            tolerance_ms: core.tolerance_ms,
            max_occurrences: core.max_occurrences,
            max_window_days: core.max_window_days,
        }
    }
}

impl From<&ExpansionSettings> for ExpansionConfig {
    fn from(settings: &ExpansionSettings) -> Self {
        Self {
            default_timezone: settings.default_timezone.clone(),
            tolerance_ms: settings.tolerance_ms,
            max_occurrences: settings.max_occurrences,
            max_window_days: settings.max_window_days,
        }
    }
}

impl Config {
    /// Defaults, then the TOML file, then `AGENDA_*` environment variables
    /// (`AGENDA_SERVER__PORT=8080` sets `server.port`).
    pub fn new() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    pub fn figment() -> Figment {
        let file = std::env::var("AGENDA_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("AGENDA_").ignore(&["config"]).split("__"))
    }
}

/// Detects the system timezone, falling back to UTC if detection fails
pub fn detect_system_timezone() -> String {
    // TZ takes precedence over the platform setting
    if let Ok(tz) = std::env::var("TZ") {
        if validate_timezone(&tz).is_ok() {
            return tz;
        }
    }

    if let Ok(local_tz) = iana_time_zone::get_timezone() {
        if validate_timezone(&local_tz).is_ok() {
            return local_tz;
        }
    }

    "UTC".to_string()
}
