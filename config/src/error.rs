//! Error types for configuration loading.

use std::path::PathBuf;

use tablesync_core::{SchemaError, ValidationError};
use thiserror::Error;

/// Errors that can occur while loading declarations or options.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// File extension is not `.json`, `.yaml` or `.yml`.
    #[error("unsupported file format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// A declared table failed validation.
    #[error("invalid table '{table}': {}", join_errors(.errors))]
    InvalidTable {
        table: String,
        errors: Vec<ValidationError>,
    },

    /// Two declarations use the same table name.
    #[error("duplicate table: {0}")]
    DuplicateTable(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<SchemaError> for ConfigError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::InvalidTable { table, errors } => Self::InvalidTable { table, errors },
            SchemaError::DuplicateTable(table) | SchemaError::DuplicateType { table, .. } => {
                Self::DuplicateTable(table)
            }
        }
    }
}

/// Convenience alias for results with [`ConfigError`].
pub type Result<T> = std::result::Result<T, ConfigError>;
