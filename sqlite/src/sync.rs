//! Schema synchronization entry points.
//!
//! [`Synchronizer`] ties the pieces together: it inspects each registered
//! table, plans the reconciliation, and executes the plan. Planning is also
//! exposed on its own so callers can preview changes without touching the
//! database.
//!
//! # Example
//!
//! ```
//! use rusqlite::Connection;
//! use tablesync_core::*;
//! use tablesync_sqlite::Synchronizer;
//!
//! let conn = Connection::open_in_memory().unwrap();
//! let schema = Schema::new()
//!     .with_table(
//!         TableBuilder::new("users")
//!             .column(Column::integer("id").primary_key())
//!             .column(Column::text("email"))
//!             .finish()
//!             .unwrap(),
//!     )
//!     .unwrap();
//!
//! let sync = Synchronizer::new(&conn, &schema);
//! let report = sync.sync_schema(true).unwrap();
//! assert_eq!(report.get("users"), Some(SyncResult::NewTableCreated));
//!
//! let report = sync.sync_schema(true).unwrap();
//! assert_eq!(report.get("users"), Some(SyncResult::AlreadyInSync));
//! ```

use rusqlite::Connection;
use serde::Serialize;
use tablesync_core::{Capabilities, RebuildReason, Schema, SyncResult, TableDefinition, TablePlan};
use tracing::{info, warn};

use crate::error::{Result, SyncError};
use crate::inspect::{detect_capabilities, inspect_table, table_exists};
use crate::migration::{execute_plan, render_plan};

/// Outcome for one table of a [`SyncReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableOutcome {
    pub table: String,
    pub result: SyncResult,
    /// Undeclared columns left in place.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub retained_columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rebuild_reason: Option<RebuildReason>,
}

impl From<TablePlan> for TableOutcome {
    fn from(plan: TablePlan) -> Self {
        Self {
            table: plan.table,
            result: plan.result,
            retained_columns: plan.retained_columns,
            rebuild_reason: plan.rebuild_reason,
        }
    }
}

/// Per-table outcomes of [`Synchronizer::sync_schema`], in registration
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub tables: Vec<TableOutcome>,
}

impl SyncReport {
    /// Returns the outcome for a table (ASCII case-insensitive).
    pub fn get(&self, table: &str) -> Option<SyncResult> {
        self.tables
            .iter()
            .find(|outcome| outcome.table.eq_ignore_ascii_case(table))
            .map(|outcome| outcome.result)
    }

    /// Number of tables whose structure changed.
    pub fn changed(&self) -> usize {
        self.tables
            .iter()
            .filter(|outcome| outcome.result.changes_schema())
            .count()
    }
}

/// Synchronizes the tables of a [`Schema`] with a live SQLite database.
///
/// Borrows the connection; the caller keeps ownership and may run its own
/// statements between calls. Every call inspects the database afresh.
pub struct Synchronizer<'a> {
    conn: &'a Connection,
    schema: &'a Schema,
    capabilities: Capabilities,
}

impl<'a> Synchronizer<'a> {
    /// Creates a synchronizer using the capabilities of the linked SQLite.
    pub fn new(conn: &'a Connection, schema: &'a Schema) -> Self {
        Self {
            conn,
            schema,
            capabilities: detect_capabilities(),
        }
    }

    /// Overrides the detected capabilities.
    ///
    /// Disabling a capability the engine has is always safe; enabling one
    /// it lacks makes the corresponding statements fail.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Synchronizes every registered table in registration order.
    ///
    /// With `preserve_data`, undeclared columns that cannot be dropped in
    /// place are retained instead of triggering a rebuild.
    ///
    /// # Errors
    ///
    /// Stops at the first table that fails; tables before it stay
    /// synchronized.
    pub fn sync_schema(&self, preserve_data: bool) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        for table in self.schema {
            let plan = self.plan_definition(table, preserve_data)?;
            self.apply(table, &plan)?;
            report.tables.push(plan.into());
        }
        info!(
            tables = report.tables.len(),
            changed = report.changed(),
            "schema synchronized"
        );
        Ok(report)
    }

    /// Synchronizes a single registered table.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownTable`] if `name` is not registered.
    pub fn sync_table(&self, name: &str, preserve_data: bool) -> Result<SyncResult> {
        let table = self.definition(name)?;
        let plan = self.plan_definition(table, preserve_data)?;
        self.apply(table, &plan)?;
        Ok(plan.result)
    }

    /// Plans every registered table without executing anything.
    pub fn schema_status(&self, preserve_data: bool) -> Result<Vec<TablePlan>> {
        self.schema
            .iter()
            .map(|table| self.plan_definition(table, preserve_data))
            .collect()
    }

    /// Plans one registered table without executing anything.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownTable`] if `name` is not registered.
    pub fn plan_table(&self, name: &str, preserve_data: bool) -> Result<TablePlan> {
        let table = self.definition(name)?;
        self.plan_definition(table, preserve_data)
    }

    /// Renders a plan into the statements executing it would run.
    pub fn render_plan(&self, plan: &TablePlan) -> Result<Vec<String>> {
        let table = self.definition(&plan.table)?;
        Ok(render_plan(table, plan))
    }

    fn definition(&self, name: &str) -> Result<&'a TableDefinition> {
        self.schema
            .get(name)
            .ok_or_else(|| SyncError::UnknownTable(name.to_string()))
    }

    fn plan_definition(&self, table: &TableDefinition, preserve_data: bool) -> Result<TablePlan> {
        let live = inspect_table(self.conn, &table.name, self.capabilities)?;
        let plan = |backup: &str| {
            tablesync_core::plan_table(
                table,
                live.as_ref(),
                self.capabilities,
                preserve_data,
                backup,
            )
        };

        // The backup name only matters for rebuilds; look it up then.
        let default_backup = format!("{}_backup", table.name);
        let planned = plan(&default_backup);
        if !planned.requires_rebuild() {
            return Ok(planned);
        }
        let backup = self.backup_name(&table.name)?;
        if backup == default_backup {
            Ok(planned)
        } else {
            Ok(plan(&backup))
        }
    }

    fn apply(&self, table: &TableDefinition, plan: &TablePlan) -> Result<()> {
        if let Some(reason) = &plan.rebuild_reason {
            warn!(table = %plan.table, %reason, "rebuilding table");
        }
        execute_plan(self.conn, table, plan)?;
        if plan.retained_columns.is_empty() {
            info!(table = %plan.table, result = %plan.result, "table synchronized");
        } else {
            warn!(
                table = %plan.table,
                result = %plan.result,
                retained = ?plan.retained_columns,
                "table synchronized with undeclared columns retained"
            );
        }
        Ok(())
    }

    /// First unused name of the form `<table>_backup`, `<table>_backup1`, ...
    fn backup_name(&self, table: &str) -> Result<String> {
        let base = format!("{table}_backup");
        let mut candidate = base.clone();
        let mut suffix = 1u32;
        while table_exists(self.conn, &candidate)? {
            candidate = format!("{base}{suffix}");
            suffix += 1;
        }
        Ok(candidate)
    }
}
