//! Column and table type definitions.
//!
//! This module defines the data model shared by the declaration side
//! ([`ColumnDescriptor`], [`TableDefinition`]) and the inspection side
//! ([`InspectedColumn`]) of schema synchronization. Both sides expose the
//! same comparison attributes (not-null, default presence, primary key
//! rank) so the diff engine can compare them directly.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lowest SQLite version (as returned by `sqlite3_libversion_number`)
/// supporting `ALTER TABLE ... DROP COLUMN`.
pub const DROP_COLUMN_MIN_VERSION: i32 = 3_035_000;

/// Lowest SQLite version supporting `GENERATED ALWAYS AS` columns and
/// `PRAGMA table_xinfo`.
pub const GENERATED_COLUMNS_MIN_VERSION: i32 = 3_031_000;

/// Classification of a column with respect to generated values.
///
/// # Examples
///
/// ```
/// use tablesync_core::{Column, GeneratedKind};
///
/// let plain = Column::integer("a").into_descriptor();
/// assert_eq!(plain.generated_kind(), GeneratedKind::None);
///
/// let total = Column::integer("total").generated_stored("a * 2").into_descriptor();
/// assert_eq!(total.generated_kind(), GeneratedKind::Stored);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GeneratedKind {
    /// Regular stored column (the default).
    #[default]
    None,
    /// Computed on read, not stored.
    Virtual,
    /// Computed on write and stored in the table.
    Stored,
}

/// Storage class of a generated column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GeneratedStorage {
    #[default]
    Virtual,
    Stored,
}

impl GeneratedStorage {
    /// Returns the SQL keyword for this storage class.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Virtual => "VIRTUAL",
            Self::Stored => "STORED",
        }
    }
}

/// `GENERATED ALWAYS AS (expression)` clause of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedColumn {
    /// SQL expression computing the value.
    pub expression: String,
    /// Whether the value is stored or computed on read.
    #[serde(default)]
    pub storage: GeneratedStorage,
}

/// Type affinity derived from a declared column type.
///
/// Follows SQLite's affinity rules, which are applied in order to the
/// declared type text.
///
/// # Examples
///
/// ```
/// use tablesync_core::Affinity;
///
/// assert_eq!(Affinity::from_declared_type("BIGINT"), Affinity::Integer);
/// assert_eq!(Affinity::from_declared_type("VARCHAR(255)"), Affinity::Text);
/// assert_eq!(Affinity::from_declared_type(""), Affinity::Blob);
/// assert_eq!(Affinity::from_declared_type("DOUBLE"), Affinity::Real);
/// assert_eq!(Affinity::from_declared_type("DECIMAL(10,2)"), Affinity::Numeric);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Affinity {
    Integer,
    Text,
    Blob,
    Real,
    Numeric,
}

impl Affinity {
    /// Determines the affinity of a declared SQL type.
    pub fn from_declared_type(sql_type: &str) -> Self {
        let upper = sql_type.to_ascii_uppercase();
        if upper.contains("INT") {
            Self::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Self::Text
        } else if upper.contains("BLOB") || upper.trim().is_empty() {
            Self::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Self::Real
        } else {
            Self::Numeric
        }
    }

    /// Returns a non-NULL literal of this affinity.
    ///
    /// Used to populate NOT NULL columns that have no default when rows are
    /// copied into a rebuilt table.
    pub fn fill_literal(self) -> &'static str {
        match self {
            Self::Integer | Self::Real | Self::Numeric => "0",
            Self::Text => "''",
            Self::Blob => "X''",
        }
    }
}

/// Declared description of one mapped column.
///
/// Constructed through [`Column`](crate::Column) or deserialized from a
/// configuration file, then owned by a [`TableDefinition`]. Schema
/// synchronization never mutates descriptors; only the live database
/// changes.
///
/// # Examples
///
/// ```
/// use tablesync_core::Column;
///
/// let email = Column::text("email").not_null().default_value("''").into_descriptor();
/// assert!(email.not_null);
/// assert!(email.has_default());
/// assert_eq!(email.primary_key_rank, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name, unique within its table.
    pub name: String,
    /// Declared SQL type (e.g. `INTEGER`, `TEXT`). May be empty.
    #[serde(default)]
    pub sql_type: String,
    /// Whether the column carries a `NOT NULL` constraint.
    #[serde(default)]
    pub not_null: bool,
    /// Raw SQL text of the `DEFAULT` clause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// 1-based position in the primary key, `0` when not part of it.
    #[serde(default)]
    pub primary_key_rank: u32,
    /// Whether the column carries a `UNIQUE` constraint.
    #[serde(default)]
    pub unique: bool,
    /// `AUTOINCREMENT` on a single `INTEGER PRIMARY KEY`.
    #[serde(default)]
    pub autoincrement: bool,
    /// Generated-column clause, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<GeneratedColumn>,
}

impl ColumnDescriptor {
    /// Returns `true` if the default clause has a non-empty textual value.
    pub fn has_default(&self) -> bool {
        self.default
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty())
    }

    /// Returns `true` if the default is a constant that `ALTER TABLE ...
    /// ADD COLUMN` accepts.
    ///
    /// Parenthesised expressions and the `CURRENT_*` keywords are
    /// evaluated per row and are rejected by SQLite when adding a column.
    ///
    /// # Examples
    ///
    /// ```
    /// use tablesync_core::Column;
    ///
    /// assert!(Column::integer("n").default_value("0").into_descriptor().has_constant_default());
    /// assert!(!Column::text("at").default_value("CURRENT_TIMESTAMP").into_descriptor().has_constant_default());
    /// assert!(!Column::text("at").default_value("(datetime('now'))").into_descriptor().has_constant_default());
    /// ```
    pub fn has_constant_default(&self) -> bool {
        let Some(value) = self.default.as_deref().map(str::trim) else {
            return false;
        };
        if value.is_empty() || value.starts_with('(') {
            return false;
        }
        !matches!(
            value.to_ascii_uppercase().as_str(),
            "CURRENT_TIME" | "CURRENT_DATE" | "CURRENT_TIMESTAMP"
        )
    }

    /// Returns `true` if the column is part of the primary key.
    pub fn is_primary_key(&self) -> bool {
        self.primary_key_rank > 0
    }

    /// Returns the generated-column classification.
    pub fn generated_kind(&self) -> GeneratedKind {
        match &self.generated {
            None => GeneratedKind::None,
            Some(generated) => match generated.storage {
                GeneratedStorage::Virtual => GeneratedKind::Virtual,
                GeneratedStorage::Stored => GeneratedKind::Stored,
            },
        }
    }

    /// Returns `true` for generated (virtual or stored) columns.
    pub fn is_generated(&self) -> bool {
        self.generated.is_some()
    }

    /// Returns the type affinity of the declared type.
    pub fn affinity(&self) -> Affinity {
        Affinity::from_declared_type(&self.sql_type)
    }
}

/// Declared index over one or more columns of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Index name, unique within the database.
    pub name: String,
    /// Indexed columns, in key order.
    pub columns: Vec<String>,
    /// Whether this is a `UNIQUE` index.
    #[serde(default)]
    pub unique: bool,
}

/// Declared definition of one table.
///
/// Produced by [`TableBuilder::finish`](crate::TableBuilder::finish), which
/// validates it, or loaded from configuration and validated with
/// [`validate_table`](crate::validate_table).
///
/// # Examples
///
/// ```
/// use tablesync_core::{Column, TableBuilder};
///
/// let users = TableBuilder::new("users")
///     .column(Column::integer("id").primary_key())
///     .column(Column::text("name").not_null())
///     .finish()
///     .unwrap();
///
/// assert_eq!(users.column_names(), vec!["id", "name"]);
/// assert_eq!(users.primary_key_columns()[0].name, "id");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDescriptor>,
    /// Indexes created alongside the table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexDefinition>,
    /// Emit `WITHOUT ROWID`.
    #[serde(default)]
    pub without_rowid: bool,
}

impl TableDefinition {
    /// Finds a declared column by name (ASCII case-insensitive, like SQLite).
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }

    /// Returns column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Returns primary key columns ordered by rank.
    pub fn primary_key_columns(&self) -> Vec<&ColumnDescriptor> {
        let mut key: Vec<_> = self.columns.iter().filter(|c| c.is_primary_key()).collect();
        key.sort_by_key(|c| c.primary_key_rank);
        key
    }
}

/// `hidden` code reported by `PRAGMA table_xinfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HiddenKind {
    /// Ordinary column (`0`).
    #[default]
    Normal,
    /// Hidden column of a virtual table (`1`).
    Hidden,
    /// Virtual generated column (`2`).
    Virtual,
    /// Stored generated column (`3`).
    Stored,
}

impl HiddenKind {
    /// Maps the numeric `hidden` value of `PRAGMA table_xinfo`.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Normal,
            2 => Self::Virtual,
            3 => Self::Stored,
            _ => Self::Hidden,
        }
    }
}

/// One column as reported by the live database.
///
/// Mirrors the comparison attributes of [`ColumnDescriptor`]. Constructed
/// fresh on every inspection and discarded afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectedColumn {
    /// Internal column id; inspection results are ordered by it.
    pub cid: i64,
    pub name: String,
    /// Declared type text as stored in the schema.
    pub sql_type: String,
    pub not_null: bool,
    /// Default expression text, `None` when the column has no default.
    pub default_value: Option<String>,
    /// 1-based position in the primary key, `0` when not part of it.
    pub primary_key_rank: u32,
    #[serde(default)]
    pub hidden: HiddenKind,
}

impl InspectedColumn {
    /// Returns `true` if the reported default text is non-empty.
    pub fn has_default(&self) -> bool {
        self.default_value
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty())
    }

    /// Returns the generated-column classification.
    pub fn generated_kind(&self) -> GeneratedKind {
        match self.hidden {
            HiddenKind::Virtual => GeneratedKind::Virtual,
            HiddenKind::Stored => GeneratedKind::Stored,
            HiddenKind::Normal | HiddenKind::Hidden => GeneratedKind::None,
        }
    }

    /// Returns `true` for generated (virtual or stored) columns.
    pub fn is_generated(&self) -> bool {
        self.generated_kind() != GeneratedKind::None
    }
}

/// Optional features of the database engine that affect planning.
///
/// Fixed per engine build; read once and branched on at runtime.
///
/// # Examples
///
/// ```
/// use tablesync_core::Capabilities;
///
/// let old = Capabilities::from_version_number(3_030_001);
/// assert!(!old.supports_drop_column);
/// assert!(!old.supports_generated_columns);
///
/// let new = Capabilities::from_version_number(3_045_000);
/// assert!(new.supports_drop_column);
/// assert!(new.supports_generated_columns);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capabilities {
    /// `ALTER TABLE ... DROP COLUMN` is available.
    pub supports_drop_column: bool,
    /// Generated columns and `PRAGMA table_xinfo` are available.
    pub supports_generated_columns: bool,
}

impl Capabilities {
    /// Creates capabilities from explicit flags.
    pub const fn new(supports_drop_column: bool, supports_generated_columns: bool) -> Self {
        Self {
            supports_drop_column,
            supports_generated_columns,
        }
    }

    /// Derives capabilities from a SQLite version number such as `3045000`.
    pub fn from_version_number(version: i32) -> Self {
        Self {
            supports_drop_column: version >= DROP_COLUMN_MIN_VERSION,
            supports_generated_columns: version >= GENERATED_COLUMNS_MIN_VERSION,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::new(true, true)
    }
}

/// Outcome of synchronizing one table.
///
/// Exactly one value is produced per table and synchronization call.
///
/// # Examples
///
/// ```
/// use tablesync_core::SyncResult;
///
/// assert_eq!(SyncResult::NewColumnsAdded.to_string(), "new columns added");
/// assert!(!SyncResult::AlreadyInSync.changes_schema());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncResult {
    /// Live table already matches the declaration.
    AlreadyInSync,
    /// Table did not exist and was created.
    NewTableCreated,
    /// Missing columns were added in place.
    NewColumnsAdded,
    /// Undeclared columns were removed, or retained when they could not be
    /// removed without losing data.
    OldColumnsRemoved,
    /// Both of the above.
    NewColumnsAddedAndOldColumnsRemoved,
    /// Table was rebuilt from the declaration.
    DroppedAndRecreated,
}

impl SyncResult {
    /// Returns `true` for every outcome other than [`AlreadyInSync`](Self::AlreadyInSync).
    pub fn changes_schema(self) -> bool {
        self != Self::AlreadyInSync
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::AlreadyInSync => "already in sync",
            Self::NewTableCreated => "new table created",
            Self::NewColumnsAdded => "new columns added",
            Self::OldColumnsRemoved => "old columns removed",
            Self::NewColumnsAddedAndOldColumnsRemoved => "new columns added and old columns removed",
            Self::DroppedAndRecreated => "old table dropped and recreated",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inspected(name: &str, default_value: Option<&str>) -> InspectedColumn {
        InspectedColumn {
            cid: 0,
            name: name.to_string(),
            sql_type: "TEXT".to_string(),
            not_null: false,
            default_value: default_value.map(String::from),
            primary_key_rank: 0,
            hidden: HiddenKind::Normal,
        }
    }

    #[test]
    fn test_blank_default_is_not_a_default() {
        let column = ColumnDescriptor {
            name: "a".into(),
            sql_type: "TEXT".into(),
            not_null: false,
            default: Some("   ".into()),
            primary_key_rank: 0,
            unique: false,
            autoincrement: false,
            generated: None,
        };
        assert!(!column.has_default());
        assert!(!column.has_constant_default());
    }

    #[test]
    fn test_inspected_default_presence() {
        assert!(inspected("a", Some("'x'")).has_default());
        assert!(!inspected("a", Some("")).has_default());
        assert!(!inspected("a", None).has_default());
    }

    #[test]
    fn test_hidden_codes() {
        assert_eq!(HiddenKind::from_code(0), HiddenKind::Normal);
        assert_eq!(HiddenKind::from_code(1), HiddenKind::Hidden);
        assert_eq!(HiddenKind::from_code(2), HiddenKind::Virtual);
        assert_eq!(HiddenKind::from_code(3), HiddenKind::Stored);

        let mut column = inspected("g", None);
        column.hidden = HiddenKind::Stored;
        assert_eq!(column.generated_kind(), GeneratedKind::Stored);
        assert!(column.is_generated());
    }

    #[test]
    fn test_capability_thresholds() {
        let caps = Capabilities::from_version_number(GENERATED_COLUMNS_MIN_VERSION);
        assert!(caps.supports_generated_columns);
        assert!(!caps.supports_drop_column);

        let caps = Capabilities::from_version_number(DROP_COLUMN_MIN_VERSION);
        assert!(caps.supports_drop_column);
    }

    #[test]
    fn test_sync_result_serializes_snake_case() {
        let json = serde_json::to_string(&SyncResult::DroppedAndRecreated).unwrap();
        assert_eq!(json, "\"dropped_and_recreated\"");
    }

    #[test]
    fn test_fill_literals() {
        assert_eq!(Affinity::Integer.fill_literal(), "0");
        assert_eq!(Affinity::Text.fill_literal(), "''");
        assert_eq!(Affinity::Blob.fill_literal(), "X''");
    }
}
