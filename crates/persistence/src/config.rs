//! Database configuration
//!
//! Every knob has a serde default and can be overridden from the environment.

use crate::error::{PersistenceError, PersistenceResult};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_DATABASE_URL: &str = "QRCREDIT_DATABASE_URL";
pub const ENV_MAX_CONNECTIONS: &str = "QRCREDIT_MAX_CONNECTIONS";
pub const ENV_BUSY_TIMEOUT_MS: &str = "QRCREDIT_BUSY_TIMEOUT_MS";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite URL, e.g. `sqlite:data/qrcredit.db?mode=rwc`
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits for the database lock before giving up
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Write-ahead logging lets readers proceed while a writer holds the lock
    #[serde(default = "default_wal")]
    pub wal: bool,
}

fn default_url() -> String {
    "sqlite:data/qrcredit.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    8
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_wal() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
            wal: default_wal(),
        }
    }
}

impl DatabaseConfig {
    /// Defaults overridden by `QRCREDIT_*` environment variables
    pub fn from_env() -> PersistenceResult<Self> {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(ENV_DATABASE_URL) {
            config.url = url;
        }
        if let Ok(value) = std::env::var(ENV_MAX_CONNECTIONS) {
            config.max_connections = parse_env(ENV_MAX_CONNECTIONS, &value)?;
        }
        if let Ok(value) = std::env::var(ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout_ms = parse_env(ENV_BUSY_TIMEOUT_MS, &value)?;
        }
        Ok(config)
    }

    /// File-backed database at `path`, created if missing
    pub fn for_path(path: impl AsRef<std::path::Path>) -> Self {
        Self {
            url: format!("sqlite:{}?mode=rwc", path.as_ref().display()),
            ..Self::default()
        }
    }

    /// Private in-memory database on a single connection (tests, dry runs)
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            wal: false,
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    pub fn connect_options(&self) -> PersistenceResult<SqliteConnectOptions> {
        if self.max_connections == 0 {
            return Err(PersistenceError::Configuration(
                "max_connections must be at least 1".to_string(),
            ));
        }
        let journal_mode = if self.wal && !self.is_in_memory() {
            SqliteJournalMode::Wal
        } else {
            SqliteJournalMode::Delete
        };
        let options = SqliteConnectOptions::from_str(&self.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .journal_mode(journal_mode);
        Ok(options)
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> PersistenceResult<T> {
    value
        .parse()
        .map_err(|_| PersistenceError::Configuration(format!("{} has invalid value {:?}", name, value)))
}
