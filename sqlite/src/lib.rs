//! SQLite driver for schema synchronization.
//!
//! Reconciles the tables of a [`Schema`](tablesync_core::Schema) with a live
//! SQLite database: missing tables are created, missing columns added,
//! undeclared columns dropped, and structurally incompatible tables rebuilt
//! with their rows copied over.
//!
//! # Architecture
//!
//! - **`inspect`**: read-only snapshots of live tables and engine
//!   capabilities
//! - **`schema`**: DDL generation for definitions and plan steps
//! - **`migration`**: statement-by-statement plan execution
//! - **`sync`**: [`Synchronizer`], which inspects, plans and executes per table
//!
//! # Quick start
//!
//! ```no_run
//! use rusqlite::Connection;
//! use tablesync_core::{Column, Schema, TableBuilder};
//! use tablesync_sqlite::Synchronizer;
//!
//! let conn = Connection::open("app.db").unwrap();
//! let mut schema = Schema::new();
//! schema
//!     .insert(
//!         TableBuilder::new("users")
//!             .column(Column::integer("id").primary_key())
//!             .column(Column::text("email").not_null().default_value("''"))
//!             .finish()
//!             .unwrap(),
//!     )
//!     .unwrap();
//!
//! let report = Synchronizer::new(&conn, &schema).sync_schema(true).unwrap();
//! for outcome in &report.tables {
//!     println!("{}: {}", outcome.table, outcome.result);
//! }
//! ```
//!
//! # Atomicity
//!
//! Plans are not wrapped in a transaction. A failing statement leaves the
//! statements before it applied and surfaces as
//! [`SyncError::ExecutionError`]; an interrupted rebuild may leave a
//! `<table>_backup` table behind, and the next rebuild picks a fresh name.

mod error;
mod inspect;
mod migration;
mod schema;
mod sync;

pub use error::{Result, SyncError};
pub use inspect::{
    detect_capabilities, inspect_table, table_columns, table_exists, table_indexes, table_names,
};
pub use migration::{execute_plan, render_plan};
pub use schema::{
    add_column_sql, column_definition_sql, copy_rows_sql, create_index_sql, create_table_sql,
    drop_column_sql, drop_table_sql, quote_identifier, rename_table_sql, step_sql,
};
pub use sync::{SyncReport, Synchronizer, TableOutcome};
