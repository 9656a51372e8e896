//! Table declaration files.
//!
//! A declaration file holds either a single table or a list of tables, in
//! JSON (`.json`) or YAML (`.yaml`, `.yml`):
//!
//! ```yaml
//! - name: users
//!   columns:
//!     - { name: id, sql_type: INTEGER, primary_key_rank: 1 }
//!     - { name: email, sql_type: TEXT, not_null: true, default: "''" }
//! - name: audit
//!   columns:
//!     - { name: id, sql_type: INTEGER, primary_key_rank: 1 }
//! ```
//!
//! Loading does not validate; validation happens when the tables are
//! registered in a [`Schema`](tablesync_core::Schema).

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tablesync_core::TableDefinition;

use crate::error::{ConfigError, Result};

#[derive(Deserialize)]
#[serde(untagged)]
enum TableFile {
    Many(Vec<TableDefinition>),
    One(Box<TableDefinition>),
}

impl TableFile {
    fn into_tables(self) -> Vec<TableDefinition> {
        match self {
            Self::Many(tables) => tables,
            Self::One(table) => vec![*table],
        }
    }
}

#[derive(Clone, Copy)]
enum Format {
    Json,
    Yaml,
}

fn format_of(path: &Path) -> Option<Format> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Some(Format::Json),
        Some("yaml" | "yml") => Some(Format::Yaml),
        _ => None,
    }
}

/// Loads the tables declared in one file.
///
/// # Errors
///
/// Returns [`ConfigError::UnsupportedFormat`] for unknown extensions,
/// [`ConfigError::IoError`] if the file cannot be read, or a parse error.
pub fn load_tables(path: impl AsRef<Path>) -> Result<Vec<TableDefinition>> {
    let path = path.as_ref();
    let format =
        format_of(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
    let reader = BufReader::new(File::open(path)?);
    let file: TableFile = match format {
        Format::Json => serde_json::from_reader(reader)?,
        Format::Yaml => serde_yaml::from_reader(reader)?,
    };
    Ok(file.into_tables())
}

/// Loads every declaration file in a directory.
///
/// Files are read in file-name order so the resulting table order is
/// stable. Files with other extensions and subdirectories are skipped.
///
/// # Errors
///
/// Returns [`ConfigError::IoError`] if the directory cannot be listed, or
/// the first error from [`load_tables`].
pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<TableDefinition>> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && format_of(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();

    let mut tables = Vec::new();
    for file in files {
        tables.extend(load_tables(&file)?);
    }
    Ok(tables)
}

/// Loads a file or, for a directory, every declaration file inside it.
pub fn load_path(path: impl AsRef<Path>) -> Result<Vec<TableDefinition>> {
    let path = path.as_ref();
    if path.is_dir() {
        load_dir(path)
    } else {
        load_tables(path)
    }
}
