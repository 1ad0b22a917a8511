//! Error types for mysql-table-sync

use thiserror::Error;

/// Result type for mysql-table-sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for mysql-table-sync
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Table '{0}' has no columns (missing or inaccessible)")]
    TableNotFound(String),

    #[error("Catalog query error: {0}")]
    Catalog(String),

    #[error("Change detection error: {0}")]
    Detection(String),

    #[error("Schema repair error: {0}")]
    SchemaRepair(String),

    #[error("Replication error: {0}")]
    Replication(String),

    #[error("Cleanup error: {0}")]
    Cleanup(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Convert Serde JSON errors to report serialization errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serialization(error.to_string())
    }
}

/// Convert YAML deserialization errors to configuration errors
impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Error::Config(error.to_string())
    }
}
