//! Layered configuration
//!
//! Precedence, lowest first: built-in defaults, the TOML config file, environment
//! variables, command-line flags. Every key is optional in the file.
//!
//! ```toml
//! environment = "production"
//! database = "/var/lib/intake/prod.db"
//! timezone = "Europe/Paris"
//! sheet_prefix = "sheet_prefix_to_find"
//!
//! [columns]
//! column_a = "column_a"
//! column_b = "column_b"
//!
//! [flag]
//! prefix = "flag"
//! markers = ["marker1", "marker2"]
//!
//! [tables]
//! intermediate = "intermediate_table_name"
//! history = "history_log_table_name"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::matching::FlagRule;
use crate::pipeline::IngestSettings;
use crate::store::TableName;

pub const ENV_ENVIRONMENT: &str = "INTAKE_ENVIRONMENT";
pub const ENV_DATABASE: &str = "INTAKE_DATABASE";
pub const ENV_TIMEZONE: &str = "INTAKE_TIMEZONE";

/// Deployment environment; selects the default database file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    #[default]
    Development,
}

impl Environment {
    /// "production" selects production, anything else development
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Development => "development",
        }
    }
}

/// Target prefixes for the required columns
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnTargets {
    pub column_a: String,
    pub column_b: String,
}

impl Default for ColumnTargets {
    fn default() -> Self {
        Self {
            column_a: "column_a".to_string(),
            column_b: "column_b".to_string(),
        }
    }
}

/// Output table names
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Tables {
    pub intermediate: String,
    pub history: String,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            intermediate: "intermediate_table_name".to_string(),
            history: "history_log_table_name".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub environment: Environment,
    pub database: Option<PathBuf>,
    pub timezone: Option<String>,
    pub sheet_prefix: String,
    pub columns: ColumnTargets,
    pub flag: FlagRule,
    pub tables: Tables,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            database: None,
            timezone: None,
            sheet_prefix: "sheet_prefix_to_find".to_string(),
            columns: ColumnTargets::default(),
            flag: FlagRule::default(),
            tables: Tables::default(),
        }
    }
}

impl Config {
    /// Default config file location: `<config dir>/intake/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("intake").join("config.toml"))
    }

    /// Load defaults, then the config file, then the process environment
    ///
    /// An explicit path must exist; the default path is used only if present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Override fields from environment variables read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(env) = lookup(ENV_ENVIRONMENT) {
            self.environment = Environment::from_name(&env);
        }
        if let Some(db) = lookup(ENV_DATABASE).filter(|v| !v.trim().is_empty()) {
            self.database = Some(PathBuf::from(db));
        }
        if let Some(tz) = lookup(ENV_TIMEZONE).filter(|v| !v.trim().is_empty()) {
            self.timezone = Some(tz);
        }
    }

    /// Configured database, or `<data dir>/intake/<environment>.db`
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir().context("Could not determine a data directory; set INTAKE_DATABASE")?;
        Ok(data_dir
            .join("intake")
            .join(format!("{}.db", self.environment.as_str())))
    }

    /// Parsed IANA timezone, `None` means the machine's local zone
    pub fn timezone(&self) -> Result<Option<Tz>> {
        self.timezone
            .as_deref()
            .map(|name| {
                name.parse::<Tz>()
                    .map_err(|e| anyhow!("Invalid timezone '{}': {}", name, e))
            })
            .transpose()
    }

    pub fn intermediate_table(&self) -> Result<TableName> {
        Ok(TableName::parse(&self.tables.intermediate)?)
    }

    pub fn history_table(&self) -> Result<TableName> {
        Ok(TableName::parse(&self.tables.history)?)
    }

    pub fn ingest_settings(&self) -> Result<IngestSettings> {
        Ok(IngestSettings {
            sheet_prefix: self.sheet_prefix.clone(),
            column_a: self.columns.column_a.clone(),
            column_b: self.columns.column_b.clone(),
            flag: self.flag.clone(),
            intermediate_table: self.intermediate_table()?,
        })
    }
}
