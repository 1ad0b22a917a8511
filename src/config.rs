//! Configuration handling for mysql-table-sync

use std::collections::HashMap;
use std::fs;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Load configuration from a YAML file and validate it
pub fn load_from_file(path: &str) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

    let config: Config = serde_yaml::from_str(&config_str)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

    config.validate()?;

    Ok(config)
}

/// Represents the complete mysql-table-sync configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    #[serde(default)]
    pub options: OptionsConfig,
    /// Named connections used by the structure-comparison entry point.
    /// The names `source` and `target` always resolve to `database`.
    #[serde(default)]
    pub databases: HashMap<String, DbConnection>,
}

/// The source/target connection pair driving data synchronization
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub source: DbConnection,
    pub target: DbConnection,
}

/// Connection parameters for one MySQL database
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DbConnection {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub pool_size: Option<u32>,
}

impl DbConnection {
    /// Build the connection URL for this database
    pub fn url(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

/// Data synchronization settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Seconds between scheduler ticks
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default)]
    pub sync_mode: SyncMode,
    #[serde(default)]
    pub table_pairs: Vec<TablePairConfig>,
}

fn default_batch_size() -> usize {
    100
}

fn default_interval() -> u64 {
    60
}

impl SyncConfig {
    /// Look up the pair configuration for a source table, falling back to a
    /// same-name pair checked by checksum when none is configured.
    pub fn pair_for(&self, source_table: &str) -> TablePairConfig {
        self.table_pairs
            .iter()
            .find(|p| p.source == source_table)
            .cloned()
            .unwrap_or_else(|| TablePairConfig {
                source: source_table.to_string(),
                target: source_table.to_string(),
                check_method: Some(CheckMethod::Checksum),
                update_field: None,
            })
    }
}

/// One source/target table pair with its drift-detection settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TablePairConfig {
    pub source: String,
    pub target: String,
    pub check_method: Option<CheckMethod>,
    pub update_field: Option<String>,
}

/// Drift-detection strategy for one table pair
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckMethod {
    Checksum,
    Count,
    UpdateTime,
}

/// Replication mode for the batch replicator
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    Full,
    Incremental,
}

/// Structure-comparison output behavior
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct OptionsConfig {
    /// Aggregate all table diffs into a single report/script pair
    #[serde(default)]
    pub merge_output: bool,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_output_dir() -> String {
    ".".to_string()
}

impl Config {
    /// Resolve a named connection for the comparison entry point
    pub fn connection(&self, name: &str) -> Option<&DbConnection> {
        match name {
            "source" => Some(&self.database.source),
            "target" => Some(&self.database.target),
            other => self.databases.get(other),
        }
    }

    /// Validate the configuration, failing startup on the first problem
    pub fn validate(&self) -> Result<()> {
        if self.database.source.password.is_empty() {
            return Err(Error::Config(
                "source database password is required".to_string(),
            ));
        }
        if self.database.target.password.is_empty() {
            return Err(Error::Config(
                "target database password is required".to_string(),
            ));
        }

        if self.sync.batch_size == 0 {
            return Err(Error::Config(
                "sync batch_size must be greater than 0".to_string(),
            ));
        }
        if self.sync.interval == 0 {
            return Err(Error::Config(
                "sync interval must be greater than 0".to_string(),
            ));
        }

        for pair in &self.sync.table_pairs {
            if pair.source.is_empty() || pair.target.is_empty() {
                return Err(Error::Config(
                    "table pair source and target must not be empty".to_string(),
                ));
            }

            if pair.check_method == Some(CheckMethod::UpdateTime)
                && pair.update_field.as_deref().unwrap_or("").is_empty()
            {
                return Err(Error::Config(format!(
                    "update_field is required for table '{}' when check_method is update_time",
                    pair.source
                )));
            }
        }

        Ok(())
    }
}
