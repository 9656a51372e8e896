//! Flat registry of table definitions.
//!
//! A [`Schema`] maps table names (and optionally Rust types) to their
//! [`TableDefinition`]. Tables are kept in registration order, which is the
//! order in which they are synchronized.

use std::any::TypeId;
use std::collections::HashMap;

use thiserror::Error;

use crate::types::TableDefinition;
use crate::validate::{ValidationError, validate_table};

/// Errors raised while registering table definitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The definition failed validation.
    #[error("invalid table '{table}': {}", join_errors(.errors))]
    InvalidTable {
        /// Table name.
        table: String,
        /// Problems found by [`validate_table`].
        errors: Vec<ValidationError>,
    },
    /// A table with the same name is already registered.
    #[error("duplicate table: {0}")]
    DuplicateTable(String),
    /// A Rust type is already bound to another table.
    #[error("type {type_name} is already mapped to table '{table}'")]
    DuplicateType {
        /// Name of the Rust type.
        type_name: &'static str,
        /// Table it is already mapped to.
        table: String,
    },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Ordered collection of validated table definitions.
///
/// # Examples
///
/// ```
/// use tablesync_core::{Column, Schema, TableBuilder};
///
/// struct User;
///
/// let mut schema = Schema::new();
/// schema
///     .register::<User>(
///         TableBuilder::new("users")
///             .column(Column::integer("id").primary_key())
///             .finish()
///             .unwrap(),
///     )
///     .unwrap();
///
/// assert_eq!(schema.get_for::<User>().unwrap().name, "users");
/// assert!(schema.get("USERS").is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Schema {
    tables: Vec<TableDefinition>,
    by_name: HashMap<String, usize>,
    by_type: HashMap<TypeId, usize>,
}

impl Schema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and registers a table definition.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidTable`] if validation fails, or
    /// [`SchemaError::DuplicateTable`] if the name is already taken.
    pub fn insert(&mut self, table: TableDefinition) -> Result<(), SchemaError> {
        self.insert_indexed(table).map(|_| ())
    }

    /// Registers a table definition and binds it to the Rust type `T`.
    ///
    /// # Errors
    ///
    /// Same as [`insert`](Self::insert), plus [`SchemaError::DuplicateType`]
    /// if `T` is already bound.
    pub fn register<T: 'static>(&mut self, table: TableDefinition) -> Result<(), SchemaError> {
        let type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&type_id) {
            return Err(SchemaError::DuplicateType {
                type_name: std::any::type_name::<T>(),
                table: self.tables[existing].name.clone(),
            });
        }
        let index = self.insert_indexed(table)?;
        self.by_type.insert(type_id, index);
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert).
    ///
    /// # Errors
    ///
    /// Same as [`insert`](Self::insert).
    pub fn with_table(mut self, table: TableDefinition) -> Result<Self, SchemaError> {
        self.insert(table)?;
        Ok(self)
    }

    /// Looks up a table by name (ASCII case-insensitive).
    pub fn get(&self, name: &str) -> Option<&TableDefinition> {
        self.by_name
            .get(&name.to_ascii_lowercase())
            .map(|&index| &self.tables[index])
    }

    /// Looks up the table bound to the Rust type `T`.
    pub fn get_for<T: 'static>(&self) -> Option<&TableDefinition> {
        self.by_type
            .get(&TypeId::of::<T>())
            .map(|&index| &self.tables[index])
    }

    /// Iterates over tables in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TableDefinition> {
        self.tables.iter()
    }

    /// Returns table names in registration order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn insert_indexed(&mut self, table: TableDefinition) -> Result<usize, SchemaError> {
        let errors = validate_table(&table);
        if !errors.is_empty() {
            return Err(SchemaError::InvalidTable {
                table: table.name,
                errors,
            });
        }
        let key = table.name.to_ascii_lowercase();
        if self.by_name.contains_key(&key) {
            return Err(SchemaError::DuplicateTable(table.name));
        }
        let index = self.tables.len();
        self.by_name.insert(key, index);
        self.tables.push(table);
        Ok(index)
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a TableDefinition;
    type IntoIter = std::slice::Iter<'a, TableDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Column, TableBuilder};

    fn table(name: &str) -> TableDefinition {
        TableBuilder::new(name)
            .column(Column::integer("id").primary_key())
            .finish()
            .unwrap()
    }

    #[test]
    fn test_registration_order_is_kept() {
        let schema = Schema::new()
            .with_table(table("b"))
            .unwrap()
            .with_table(table("a"))
            .unwrap();
        assert_eq!(schema.table_names(), vec!["b", "a"]);
        assert_eq!(schema.len(), 2);
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let mut schema = Schema::new();
        schema.insert(table("users")).unwrap();
        assert_eq!(
            schema.insert(table("Users")),
            Err(SchemaError::DuplicateTable("Users".into()))
        );
    }

    #[test]
    fn test_invalid_table_rejected() {
        let mut schema = Schema::new();
        let bad = TableDefinition {
            name: "t".into(),
            columns: vec![],
            indexes: vec![],
            without_rowid: false,
        };
        let err = schema.insert(bad).unwrap_err();
        assert_eq!(err.to_string(), "invalid table 't': table 't' has no columns");
        assert!(schema.is_empty());
    }

    #[test]
    fn test_type_binding() {
        struct A;
        struct B;

        let mut schema = Schema::new();
        schema.register::<A>(table("a")).unwrap();
        schema.insert(table("b")).unwrap();

        assert_eq!(schema.get_for::<A>().unwrap().name, "a");
        assert!(schema.get_for::<B>().is_none());
        assert!(matches!(
            schema.register::<A>(table("c")),
            Err(SchemaError::DuplicateType { .. })
        ));
    }
}
