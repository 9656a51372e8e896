//! Declarative table definition builders.
//!
//! [`Column`] and [`TableBuilder`] produce the ordered list of
//! [`ColumnDescriptor`]s for a table at configuration time. Constraints are
//! declared with chained methods instead of being discovered from struct
//! fields.
//!
//! # Example
//!
//! ```
//! use tablesync_core::{Column, TableBuilder};
//!
//! let memberships = TableBuilder::new("memberships")
//!     .column(Column::integer("user_id").not_null())
//!     .column(Column::integer("group_id").not_null())
//!     .column(Column::text("role").not_null().default_value("'member'"))
//!     .primary_key(["user_id", "group_id"])
//!     .index("idx_memberships_role", ["role"])
//!     .finish()
//!     .unwrap();
//!
//! let key: Vec<_> = memberships.primary_key_columns().iter().map(|c| c.name.as_str()).collect();
//! assert_eq!(key, vec!["user_id", "group_id"]);
//! ```

use crate::types::{
    ColumnDescriptor, GeneratedColumn, GeneratedStorage, IndexDefinition, TableDefinition,
};
use crate::validate::{ValidationError, validate_table};

/// Fluent builder for a single [`ColumnDescriptor`].
#[derive(Debug, Clone)]
pub struct Column {
    descriptor: ColumnDescriptor,
}

impl Column {
    /// Creates a nullable column with the given declared type.
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            descriptor: ColumnDescriptor {
                name: name.into(),
                sql_type: sql_type.into(),
                not_null: false,
                default: None,
                primary_key_rank: 0,
                unique: false,
                autoincrement: false,
                generated: None,
            },
        }
    }

    /// Creates an `INTEGER` column.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, "INTEGER")
    }

    /// Creates a `TEXT` column.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, "TEXT")
    }

    /// Creates a `REAL` column.
    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, "REAL")
    }

    /// Creates a `BLOB` column.
    pub fn blob(name: impl Into<String>) -> Self {
        Self::new(name, "BLOB")
    }

    /// Adds a `NOT NULL` constraint.
    pub fn not_null(mut self) -> Self {
        self.descriptor.not_null = true;
        self
    }

    /// Sets the `DEFAULT` clause to the given SQL expression text.
    ///
    /// Text literals must carry their own quotes (`"'guest'"`).
    pub fn default_value(mut self, expression: impl Into<String>) -> Self {
        self.descriptor.default = Some(expression.into());
        self
    }

    /// Makes this the single-column primary key.
    pub fn primary_key(mut self) -> Self {
        self.descriptor.primary_key_rank = 1;
        self
    }

    /// Makes this an `INTEGER PRIMARY KEY AUTOINCREMENT` column.
    pub fn autoincrement(mut self) -> Self {
        self.descriptor.primary_key_rank = 1;
        self.descriptor.autoincrement = true;
        self
    }

    /// Adds a `UNIQUE` constraint.
    pub fn unique(mut self) -> Self {
        self.descriptor.unique = true;
        self
    }

    /// Makes this a virtual generated column.
    pub fn generated_virtual(mut self, expression: impl Into<String>) -> Self {
        self.descriptor.generated = Some(GeneratedColumn {
            expression: expression.into(),
            storage: GeneratedStorage::Virtual,
        });
        self
    }

    /// Makes this a stored generated column.
    pub fn generated_stored(mut self, expression: impl Into<String>) -> Self {
        self.descriptor.generated = Some(GeneratedColumn {
            expression: expression.into(),
            storage: GeneratedStorage::Stored,
        });
        self
    }

    /// Returns the finished descriptor.
    pub fn into_descriptor(self) -> ColumnDescriptor {
        self.descriptor
    }
}

impl From<Column> for ColumnDescriptor {
    fn from(column: Column) -> Self {
        column.into_descriptor()
    }
}

/// Fluent builder for a [`TableDefinition`].
///
/// Columns keep the order in which they are added; that order drives the
/// generated `CREATE TABLE`, `ADD COLUMN` and copy statements.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    columns: Vec<ColumnDescriptor>,
    composite_key: Option<Vec<String>>,
    indexes: Vec<IndexDefinition>,
    without_rowid: bool,
}

impl TableBuilder {
    /// Starts a definition for the named table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            composite_key: None,
            indexes: Vec::new(),
            without_rowid: false,
        }
    }

    /// Appends a column.
    pub fn column(mut self, column: impl Into<ColumnDescriptor>) -> Self {
        self.columns.push(column.into());
        self
    }

    /// Declares a table-level primary key; ranks follow the given order.
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.composite_key = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Declares a non-unique index.
    pub fn index<I, S>(self, name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_index(name.into(), columns, false)
    }

    /// Declares a unique index.
    pub fn unique_index<I, S>(self, name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_index(name.into(), columns, true)
    }

    /// Emits `WITHOUT ROWID` for this table.
    ///
    /// Primary key columns are made NOT NULL, matching what SQLite enforces
    /// for such tables.
    pub fn without_rowid(mut self) -> Self {
        self.without_rowid = true;
        self
    }

    /// Resolves the primary key and validates the definition.
    ///
    /// # Errors
    ///
    /// Returns every [`ValidationError`] found, e.g. duplicate column names
    /// or a primary key naming an unknown column.
    pub fn finish(self) -> Result<TableDefinition, Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut columns = self.columns;

        if let Some(key) = &self.composite_key {
            if let Some(column) = columns.iter().find(|c| c.is_primary_key()) {
                errors.push(ValidationError::ConflictingPrimaryKey(column.name.clone()));
            }
            for (position, key_column) in key.iter().enumerate() {
                match columns
                    .iter_mut()
                    .find(|c| c.name.eq_ignore_ascii_case(key_column))
                {
                    Some(column) => {
                        column.primary_key_rank = u32::try_from(position + 1).unwrap_or(u32::MAX);
                    }
                    None => errors.push(ValidationError::UnknownPrimaryKeyColumn(
                        key_column.clone(),
                    )),
                }
            }
        }

        if self.without_rowid {
            for column in columns.iter_mut().filter(|c| c.is_primary_key()) {
                column.not_null = true;
            }
        }

        let table = TableDefinition {
            name: self.name,
            columns,
            indexes: self.indexes,
            without_rowid: self.without_rowid,
        };
        errors.extend(validate_table(&table));

        if errors.is_empty() {
            Ok(table)
        } else {
            Err(errors)
        }
    }

    fn push_index<I, S>(mut self, name: String, columns: I, unique: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexes.push(IndexDefinition {
            name,
            columns: columns.into_iter().map(Into::into).collect(),
            unique,
        });
        self
    }
}
