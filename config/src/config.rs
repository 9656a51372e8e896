//! Synchronization options and table declarations in one YAML file.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! preserve_data: true
//! capabilities:
//!   drop_column: false
//! include:
//!   - tables/
//! tables:
//!   - name: users
//!     columns:
//!       - { name: id, sql_type: INTEGER, primary_key_rank: 1 }
//!       - { name: email, sql_type: TEXT, not_null: true, unique: true }
//!     indexes:
//!       - { name: idx_users_email, columns: [email] }
//! ```
//!
//! `include` lists declaration files or directories, relative to the
//! configuration file, whose tables are appended after the inline ones.

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tablesync_core::{Capabilities, Schema, TableDefinition};

use crate::error::Result;
use crate::loader::load_path;

fn default_version() -> String {
    "1.0".to_string()
}

/// Manual overrides of the detected engine capabilities.
///
/// Unset fields keep the detected value.
///
/// # Examples
///
/// ```
/// # use tablesync_config::CapabilityOverrides;
/// use tablesync_core::Capabilities;
///
/// let overrides = CapabilityOverrides {
///     drop_column: Some(false),
///     generated_columns: None,
/// };
/// assert_eq!(
///     overrides.apply(Capabilities::new(true, true)),
///     Capabilities::new(false, true)
/// );
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_column: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_columns: Option<bool>,
}

impl CapabilityOverrides {
    /// Merges the overrides into detected capabilities.
    pub fn apply(&self, detected: Capabilities) -> Capabilities {
        Capabilities::new(
            self.drop_column.unwrap_or(detected.supports_drop_column),
            self.generated_columns
                .unwrap_or(detected.supports_generated_columns),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.drop_column.is_none() && self.generated_columns.is_none()
    }
}

/// Top-level synchronization configuration.
///
/// Typically loaded from `tablesync.yml` next to the database it manages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Configuration format version (e.g., `"1.0"`).
    #[serde(default = "default_version")]
    pub version: String,
    /// Retain undeclared columns instead of rebuilding when they cannot be
    /// dropped in place.
    #[serde(default)]
    pub preserve_data: bool,
    #[serde(default, skip_serializing_if = "CapabilityOverrides::is_empty")]
    pub capabilities: CapabilityOverrides,
    /// Declaration files or directories to merge in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<PathBuf>,
    /// Inline table declarations, in synchronization order.
    #[serde(default)]
    pub tables: Vec<TableDefinition>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            preserve_data: false,
            capabilities: CapabilityOverrides::default(),
            include: Vec::new(),
            tables: Vec::new(),
        }
    }
}

impl SyncConfig {
    /// Loads configuration from a YAML file and resolves its includes.
    ///
    /// Included tables are appended to [`tables`](Self::tables) and the
    /// `include` list is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::ConfigError::IoError) if a file cannot be
    /// read, or a parse error from the configuration or an included file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let mut config: Self = serde_yaml::from_reader(reader)?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for include in std::mem::take(&mut config.include) {
            config.tables.extend(load_path(base.join(include))?);
        }
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::ConfigError::IoError) if the file cannot
    /// be written, or [`YamlError`](crate::ConfigError::YamlError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Validates every declared table and registers them in order.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTable`](crate::ConfigError::InvalidTable) for the
    /// first table that fails validation, or
    /// [`DuplicateTable`](crate::ConfigError::DuplicateTable).
    pub fn schema(&self) -> Result<Schema> {
        let mut schema = Schema::new();
        for table in &self.tables {
            schema.insert(table.clone())?;
        }
        Ok(schema)
    }

    /// Applies the configured overrides to detected capabilities.
    pub fn apply_capabilities(&self, detected: Capabilities) -> Capabilities {
        self.capabilities.apply(detected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use tablesync_core::ValidationError;
    use tempfile::TempDir;

    fn sample_yaml() -> &'static str {
        r#"
version: "1.0"
preserve_data: true
capabilities:
  drop_column: false
tables:
  - name: users
    columns:
      - { name: id, sql_type: INTEGER, primary_key_rank: 1 }
      - { name: email, sql_type: TEXT, not_null: true, unique: true }
    indexes:
      - { name: idx_users_email, columns: [email] }
  - name: audit
    columns:
      - { name: id, sql_type: INTEGER, primary_key_rank: 1, autoincrement: true }
      - { name: at, sql_type: TEXT, default: CURRENT_TIMESTAMP }
"#
    }

    #[test]
    fn test_deserialize_complete() {
        let config: SyncConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.version, "1.0");
        assert!(config.preserve_data);
        assert_eq!(config.capabilities.drop_column, Some(false));
        assert_eq!(config.capabilities.generated_columns, None);
        assert_eq!(config.tables.len(), 2);
        assert!(config.tables[1].columns[0].autoincrement);
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: SyncConfig = serde_yaml::from_str("tables: []").unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_schema_keeps_declaration_order() {
        let config: SyncConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        let schema = config.schema().unwrap();
        assert_eq!(schema.table_names(), vec!["users", "audit"]);
    }

    #[test]
    fn test_schema_rejects_invalid_table() {
        let yaml = r#"
tables:
  - name: broken
    columns:
      - { name: a, sql_type: TEXT }
    indexes:
      - { name: idx_b, columns: [b] }
"#;
        let config: SyncConfig = serde_yaml::from_str(yaml).unwrap();
        match config.schema() {
            Err(ConfigError::InvalidTable { table, errors }) => {
                assert_eq!(table, "broken");
                assert_eq!(
                    errors,
                    vec![ValidationError::UnknownIndexColumn {
                        index: "idx_b".into(),
                        column: "b".into(),
                    }]
                );
            }
            other => panic!("expected invalid table, got {other:?}"),
        }
    }

    #[test]
    fn test_schema_rejects_duplicate_table() {
        let mut config: SyncConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        let mut copy = config.tables[0].clone();
        copy.name = "USERS".into();
        config.tables.push(copy);
        assert!(matches!(
            config.schema(),
            Err(ConfigError::DuplicateTable(name)) if name == "USERS"
        ));
    }

    #[test]
    fn test_apply_capabilities() {
        let config: SyncConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        let caps = config.apply_capabilities(Capabilities::new(true, false));
        assert_eq!(caps, Capabilities::new(false, false));
    }

    #[test]
    fn test_load_resolves_includes_relative_to_file() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("tables")).unwrap();
        std::fs::write(
            dir.path().join("tables").join("extra.yaml"),
            "name: extra\ncolumns:\n  - { name: id, sql_type: INTEGER }\n",
        )
        .unwrap();
        let path = dir.path().join("tablesync.yml");
        std::fs::write(
            &path,
            format!("{}include:\n  - tables\n", sample_yaml()),
        )
        .unwrap();

        let config = SyncConfig::load(&path).unwrap();
        assert!(config.include.is_empty());
        let schema = config.schema().unwrap();
        assert_eq!(schema.table_names(), vec!["users", "audit", "extra"]);
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");

        let original: SyncConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        original.save(&path).unwrap();

        let loaded = SyncConfig::load(&path).unwrap();
        assert_eq!(loaded, original);
    }
}
