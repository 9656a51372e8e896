//! Table definitions and schema reconciliation planning.
//!
//! This crate holds the driver-agnostic half of schema synchronization:
//!
//! - [`ColumnDescriptor`] / [`TableDefinition`]: declared columns and
//!   tables, built with [`Column`] and [`TableBuilder`].
//! - [`Schema`]: flat registry of table definitions keyed by name or Rust
//!   type.
//! - [`diff_columns`]: compares declared columns with
//!   [`InspectedColumn`]s reported by a live database.
//! - [`decide`] / [`plan_table`]: choose a [`SyncResult`] and the
//!   [`PlanStep`]s that reconcile the live table with its declaration.
//!
//! Validation ([`validate_table`]) rejects malformed definitions before they
//! are registered. Reading the live schema and executing plans is the job
//! of a driver crate such as `tablesync-sqlite`.
//!
//! # Example
//!
//! ```
//! use tablesync_core::*;
//!
//! let mut schema = Schema::new();
//! schema
//!     .insert(
//!         TableBuilder::new("users")
//!             .column(Column::integer("id").primary_key())
//!             .column(Column::text("email").not_null().unique())
//!             .column(Column::text("nickname"))
//!             .finish()
//!             .unwrap(),
//!     )
//!     .unwrap();
//!
//! let users = schema.get("users").unwrap();
//! let plan = plan_table(users, None, Capabilities::default(), true, "users_backup");
//! assert_eq!(plan.result, SyncResult::NewTableCreated);
//! ```

mod builder;
mod diff;
mod plan;
mod registry;
mod types;
mod validate;

pub use builder::{Column, TableBuilder};
pub use diff::{ColumnDiff, ColumnMismatch, MismatchKind, diff_columns};
pub use plan::{
    Action, ColumnFill, Decision, IndexOrigin, LiveIndex, LiveTable, PlanStep, RebuildReason,
    TablePlan, decide, plan_table,
};
pub use registry::{Schema, SchemaError};
pub use types::*;
pub use validate::{ValidationError, validate_table};
