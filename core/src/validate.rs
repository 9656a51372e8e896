//! Table definition validation.
//!
//! Catches definition-time mistakes such as duplicate column names, broken
//! primary keys and indexes over unknown columns before any statement
//! reaches the database. Synchronization assumes validated definitions.
//!
//! # Examples
//!
//! ```
//! use tablesync_core::*;
//!
//! let table = TableDefinition {
//!     name: "users".into(),
//!     columns: vec![
//!         Column::integer("id").primary_key().into_descriptor(),
//!         Column::text("id").into_descriptor(),
//!     ],
//!     indexes: vec![],
//!     without_rowid: false,
//! };
//! assert_eq!(
//!     validate_table(&table),
//!     vec![ValidationError::DuplicateColumn("id".into())]
//! );
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::types::TableDefinition;

/// Table definition validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Table name is empty or whitespace-only.
    #[error("table name cannot be empty")]
    EmptyTableName,
    /// Table declares no columns.
    #[error("table '{0}' has no columns")]
    NoColumns(String),
    /// A column name is empty or whitespace-only.
    #[error("column name cannot be empty")]
    EmptyColumnName,
    /// Two columns share a name (compared case-insensitively).
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),
    /// A table-level primary key names a column that is not declared.
    #[error("primary key references unknown column: {0}")]
    UnknownPrimaryKeyColumn(String),
    /// A column-level primary key was combined with a table-level one.
    #[error("column '{0}' is already a primary key; use either a column or a composite key")]
    ConflictingPrimaryKey(String),
    /// Primary key ranks are not exactly `1..=n`.
    #[error("primary key ranks must be distinct and consecutive from 1, found {0:?}")]
    InvalidPrimaryKeyRanks(Vec<u32>),
    /// A generated column also declares a default.
    #[error("generated column '{0}' cannot have a default value")]
    GeneratedWithDefault(String),
    /// A generated column is part of the primary key.
    #[error("generated column '{0}' cannot be part of the primary key")]
    GeneratedPrimaryKey(String),
    /// `AUTOINCREMENT` outside a single `INTEGER PRIMARY KEY`.
    #[error("AUTOINCREMENT requires a single INTEGER PRIMARY KEY column: {0}")]
    InvalidAutoincrement(String),
    /// Index declares no columns.
    #[error("index '{0}' has no columns")]
    EmptyIndex(String),
    /// Two indexes share a name.
    #[error("duplicate index: {0}")]
    DuplicateIndex(String),
    /// Index references a column that is not declared.
    #[error("index '{index}' references unknown column: {column}")]
    UnknownIndexColumn {
        /// Index name.
        index: String,
        /// Missing column name.
        column: String,
    },
    /// `WITHOUT ROWID` tables must declare a primary key.
    #[error("WITHOUT ROWID table '{0}' must declare a primary key")]
    WithoutRowidRequiresPrimaryKey(String),
    /// SQLite forces key columns of `WITHOUT ROWID` tables to NOT NULL, so
    /// a nullable declaration would never match the live table.
    #[error("primary key column '{0}' of a WITHOUT ROWID table must be NOT NULL")]
    NullableWithoutRowidKey(String),
}

/// Validates a table definition, returning every problem found.
///
/// An empty vector means the definition is usable for synchronization.
pub fn validate_table(table: &TableDefinition) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if table.name.trim().is_empty() {
        errors.push(ValidationError::EmptyTableName);
        return errors;
    }
    if table.columns.is_empty() {
        errors.push(ValidationError::NoColumns(table.name.clone()));
        return errors;
    }

    let mut seen = HashSet::new();
    for column in &table.columns {
        let name = column.name.trim();
        if name.is_empty() {
            errors.push(ValidationError::EmptyColumnName);
            continue;
        }
        if !seen.insert(name.to_ascii_lowercase()) {
            errors.push(ValidationError::DuplicateColumn(column.name.clone()));
        }
        if column.is_generated() {
            if column.default.is_some() {
                errors.push(ValidationError::GeneratedWithDefault(column.name.clone()));
            }
            if column.is_primary_key() {
                errors.push(ValidationError::GeneratedPrimaryKey(column.name.clone()));
            }
        }
    }

    errors.extend(validate_primary_key(table));
    errors.extend(validate_indexes(table));

    errors
}

fn validate_primary_key(table: &TableDefinition) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let key = table.primary_key_columns();

    let ranks: Vec<u32> = key.iter().map(|c| c.primary_key_rank).collect();
    let consecutive = ranks
        .iter()
        .enumerate()
        .all(|(position, rank)| usize::try_from(*rank).is_ok_and(|r| r == position + 1));
    if !consecutive {
        errors.push(ValidationError::InvalidPrimaryKeyRanks(ranks));
    }

    for column in table.columns.iter().filter(|c| c.autoincrement) {
        let integer_key = column.sql_type.trim().eq_ignore_ascii_case("INTEGER")
            && column.is_primary_key()
            && key.len() == 1;
        if !integer_key || table.without_rowid {
            errors.push(ValidationError::InvalidAutoincrement(column.name.clone()));
        }
    }

    if table.without_rowid && key.is_empty() {
        errors.push(ValidationError::WithoutRowidRequiresPrimaryKey(
            table.name.clone(),
        ));
    }
    if table.without_rowid {
        errors.extend(
            key.iter()
                .filter(|c| !c.not_null)
                .map(|c| ValidationError::NullableWithoutRowidKey(c.name.clone())),
        );
    }

    errors
}

fn validate_indexes(table: &TableDefinition) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for index in &table.indexes {
        if !seen.insert(index.name.to_ascii_lowercase()) {
            errors.push(ValidationError::DuplicateIndex(index.name.clone()));
        }
        if index.columns.is_empty() {
            errors.push(ValidationError::EmptyIndex(index.name.clone()));
        }
        for column in &index.columns {
            if table.column(column).is_none() {
                errors.push(ValidationError::UnknownIndexColumn {
                    index: index.name.clone(),
                    column: column.clone(),
                });
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Column, TableBuilder};
    use crate::types::IndexDefinition;

    fn table(columns: Vec<Column>) -> TableDefinition {
        TableDefinition {
            name: "t".into(),
            columns: columns.into_iter().map(Column::into_descriptor).collect(),
            indexes: Vec::new(),
            without_rowid: false,
        }
    }

    #[test]
    fn test_valid_table() {
        let t = table(vec![Column::integer("id").primary_key(), Column::text("name")]);
        assert!(validate_table(&t).is_empty());
    }

    #[test]
    fn test_empty_table_name() {
        let mut t = table(vec![Column::integer("id")]);
        t.name = " ".into();
        assert_eq!(validate_table(&t), vec![ValidationError::EmptyTableName]);
    }

    #[test]
    fn test_no_columns() {
        let t = table(vec![]);
        assert_eq!(validate_table(&t), vec![ValidationError::NoColumns("t".into())]);
    }

    #[test]
    fn test_duplicate_column_is_case_insensitive() {
        let t = table(vec![Column::text("Name"), Column::text("name")]);
        assert_eq!(
            validate_table(&t),
            vec![ValidationError::DuplicateColumn("name".into())]
        );
    }

    #[test]
    fn test_generated_column_rules() {
        let mut generated = Column::integer("g").generated_virtual("1").into_descriptor();
        generated.default = Some("0".into());
        generated.primary_key_rank = 1;
        let t = TableDefinition {
            name: "t".into(),
            columns: vec![generated],
            indexes: Vec::new(),
            without_rowid: false,
        };
        let errors = validate_table(&t);
        assert!(errors.contains(&ValidationError::GeneratedWithDefault("g".into())));
        assert!(errors.contains(&ValidationError::GeneratedPrimaryKey("g".into())));
    }

    #[test]
    fn test_primary_key_ranks_must_be_consecutive() {
        let mut t = table(vec![Column::integer("a"), Column::integer("b")]);
        t.columns[0].primary_key_rank = 1;
        t.columns[1].primary_key_rank = 3;
        assert_eq!(
            validate_table(&t),
            vec![ValidationError::InvalidPrimaryKeyRanks(vec![1, 3])]
        );
    }

    #[test]
    fn test_autoincrement_requires_integer_key() {
        let mut t = table(vec![Column::text("id")]);
        t.columns[0].primary_key_rank = 1;
        t.columns[0].autoincrement = true;
        assert_eq!(
            validate_table(&t),
            vec![ValidationError::InvalidAutoincrement("id".into())]
        );
    }

    #[test]
    fn test_index_rules() {
        let mut t = table(vec![Column::text("a")]);
        t.indexes = vec![
            IndexDefinition {
                name: "idx".into(),
                columns: vec!["missing".into()],
                unique: false,
            },
            IndexDefinition {
                name: "IDX".into(),
                columns: vec![],
                unique: false,
            },
        ];
        let errors = validate_table(&t);
        assert!(errors.contains(&ValidationError::UnknownIndexColumn {
            index: "idx".into(),
            column: "missing".into(),
        }));
        assert!(errors.contains(&ValidationError::DuplicateIndex("IDX".into())));
        assert!(errors.contains(&ValidationError::EmptyIndex("IDX".into())));
    }

    #[test]
    fn test_without_rowid_requires_key() {
        let errors = TableBuilder::new("kv")
            .column(Column::text("k"))
            .without_rowid()
            .finish()
            .unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::WithoutRowidRequiresPrimaryKey("kv".into())]
        );
    }

    #[test]
    fn test_without_rowid_key_must_be_not_null() {
        let mut t = table(vec![Column::text("k").primary_key(), Column::text("v")]);
        t.without_rowid = true;
        assert_eq!(
            validate_table(&t),
            vec![ValidationError::NullableWithoutRowidKey("k".into())]
        );
    }
}
