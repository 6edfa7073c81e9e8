//! Engine configuration via `vellum.toml`
//!
//! Every field has a default, so an empty or missing file is a valid
//! configuration. `VELLUM_DB` and `VELLUM_LOG_PROFILE` override the file.
//!
//! ```toml
//! [database]
//! path = ".vellum/store.db"
//! busy_timeout_ms = 5000
//! journal_mode = "wal"      # delete | truncate | memory | wal
//!
//! [logging]
//! profile = "development"   # development | production | test
//! ```

#![allow(clippy::result_large_err)]

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use vellum_core::errors::{ExError, ExErrorKind};
use vellum_core::logging_facility::Profile;
use vellum_store::db::{self, DbOptions, JournalMode};
use vellum_store::migrations::apply_migrations;
use vellum_store::Result;

pub const CONFIG_FILE_NAME: &str = "vellum.toml";
pub const ENV_DB: &str = "VELLUM_DB";
pub const ENV_LOG_PROFILE: &str = "VELLUM_LOG_PROFILE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
    pub journal_mode: JournalMode,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".vellum/store.db"),
            busy_timeout_ms: 5000,
            journal_mode: JournalMode::Wal,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub profile: Profile,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

fn config_error(message: String) -> ExError {
    ExError::new(ExErrorKind::Config)
        .with_op("load_config")
        .with_message(message)
}

impl EngineConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the document is not valid TOML or has
    /// fields of the wrong type.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| config_error(format!("invalid configuration: {}", e)))
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an `Io` error if the file cannot be read, or a `Config`
    /// error if it cannot be parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExError::new(ExErrorKind::Io)
                .with_op("load_config")
                .with_message(format!("failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load `path` if given (or `vellum.toml` if present), then apply
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// See [`EngineConfig::from_file`] and [`EngineConfig::apply_env`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(CONFIG_FILE_NAME).exists() => {
                Self::from_file(Path::new(CONFIG_FILE_NAME))?
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup; `std::env::var` in production.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error for an unknown logging profile.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB).filter(|p| !p.is_empty()) {
            self.database.path = PathBuf::from(path);
        }
        if let Some(profile) = lookup(ENV_LOG_PROFILE).filter(|p| !p.is_empty()) {
            self.logging.profile = profile.parse().map_err(config_error)?;
        }
        Ok(())
    }

    pub fn db_options(&self) -> DbOptions {
        DbOptions {
            busy_timeout: Duration::from_millis(self.database.busy_timeout_ms),
            journal_mode: self.database.journal_mode,
        }
    }

    /// Open the configured database, creating its directory if needed, and
    /// bring the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an `Io` error if the directory cannot be created, or any
    /// error from opening, configuring or migrating the database.
    pub fn open_connection(&self) -> Result<Connection> {
        if let Some(dir) = self.database.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                ExError::new(ExErrorKind::Io)
                    .with_op("open_connection")
                    .with_message(format!("failed to create '{}': {}", dir.display(), e))
            })?;
        }
        let mut conn = db::open(&self.database.path)?;
        db::configure(&conn, &self.db_options())?;
        apply_migrations(&mut conn)?;
        Ok(conn)
    }
}
