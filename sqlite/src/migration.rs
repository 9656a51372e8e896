//! Plan execution.
//!
//! Executes the [`PlanStep`]s of a [`TablePlan`] one statement at a time.
//! No transaction wraps a plan: SQLite DDL auto-commits per statement, so a
//! failure leaves the statements before it applied and is reported as
//! [`SyncError::ExecutionError`] naming the failing statement.
//!
//! Rebuilds run with `PRAGMA foreign_keys` switched off so dropping the
//! original table does not cascade into referencing tables, and with
//! `PRAGMA legacy_alter_table` switched on so renaming the copy back does
//! not fail on views and triggers that name the table. Both settings are
//! restored afterwards, also when a statement fails.
//!
//! # Example
//!
//! ```
//! use rusqlite::Connection;
//! use tablesync_core::*;
//! use tablesync_sqlite::{execute_plan, inspect_table};
//!
//! let conn = Connection::open_in_memory().unwrap();
//! let notes = TableBuilder::new("notes")
//!     .column(Column::integer("id").primary_key())
//!     .column(Column::text("body"))
//!     .finish()
//!     .unwrap();
//!
//! let plan = plan_table(&notes, None, Capabilities::default(), true, "notes_backup");
//! execute_plan(&conn, &notes, &plan).unwrap();
//! assert!(inspect_table(&conn, "notes", Capabilities::default()).unwrap().is_some());
//! ```

use rusqlite::Connection;
use tablesync_core::{TableDefinition, TablePlan};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::schema::step_sql;

/// Renders every step of a plan into the statements it would execute.
///
/// Used for dry runs; [`execute_plan`] runs exactly these statements.
pub fn render_plan(table: &TableDefinition, plan: &TablePlan) -> Vec<String> {
    plan.steps.iter().map(|step| step_sql(table, step)).collect()
}

/// Executes a plan against the connection.
///
/// # Errors
///
/// Returns [`SyncError::ExecutionError`] for the first failing statement,
/// or [`SyncError::DatabaseError`] if the connection settings cannot be
/// read or changed around a rebuild. A failing statement is reported even
/// when restoring the settings fails as well.
pub fn execute_plan(conn: &Connection, table: &TableDefinition, plan: &TablePlan) -> Result<()> {
    if plan.is_noop() {
        return Ok(());
    }

    let statements = render_plan(table, plan);
    if !plan.requires_rebuild() {
        return run_statements(conn, plan, &statements);
    }

    let settings = RebuildSettings::enter(conn)?;
    let outcome = run_statements(conn, plan, &statements);
    let restored = settings.restore(conn);
    rebuild_result(outcome, restored)
}

/// A failed statement takes precedence over a failed restore.
fn rebuild_result(outcome: Result<()>, restored: Result<()>) -> Result<()> {
    outcome?;
    restored
}

/// Connection pragmas switched for the duration of a rebuild.
struct RebuildSettings {
    foreign_keys: bool,
    legacy_alter_table: bool,
}

impl RebuildSettings {
    fn enter(conn: &Connection) -> Result<Self> {
        let settings = Self {
            foreign_keys: pragma_flag(conn, "foreign_keys")?,
            legacy_alter_table: pragma_flag(conn, "legacy_alter_table")?,
        };
        if settings.foreign_keys {
            conn.execute_batch("PRAGMA foreign_keys = OFF")?;
        }
        if !settings.legacy_alter_table {
            if let Err(err) = conn.execute_batch("PRAGMA legacy_alter_table = ON") {
                settings.restore(conn)?;
                return Err(err.into());
            }
        }
        Ok(settings)
    }

    /// Puts back both settings, reporting the first failure.
    fn restore(&self, conn: &Connection) -> Result<()> {
        let legacy = if self.legacy_alter_table {
            Ok(())
        } else {
            conn.execute_batch("PRAGMA legacy_alter_table = OFF")
        };
        let foreign_keys = if self.foreign_keys {
            conn.execute_batch("PRAGMA foreign_keys = ON")
        } else {
            Ok(())
        };
        legacy?;
        foreign_keys?;
        Ok(())
    }
}

fn pragma_flag(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.query_row(&format!("PRAGMA {name}"), [], |row| row.get(0))?)
}

fn run_statements(conn: &Connection, plan: &TablePlan, statements: &[String]) -> Result<()> {
    for sql in statements {
        debug!(table = %plan.table, %sql, "executing");
        conn.execute_batch(sql)
            .map_err(|source| SyncError::ExecutionError {
                table: plan.table.clone(),
                outcome: plan.result,
                sql: sql.clone(),
                source,
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablesync_core::{
        Capabilities, Column, PlanStep, SyncResult, TableBuilder, plan_table,
    };

    use crate::inspect::inspect_table;

    fn parents() -> TableDefinition {
        TableBuilder::new("parents")
            .column(Column::integer("id").primary_key())
            .column(Column::text("name").not_null().default_value("''"))
            .finish()
            .unwrap()
    }

    #[test]
    fn test_render_plan_for_new_table() {
        let table = TableBuilder::new("t")
            .column(Column::integer("id").primary_key())
            .index("idx_t_id", ["id"])
            .finish()
            .unwrap();
        let plan = plan_table(&table, None, Capabilities::default(), false, "t_backup");
        assert_eq!(
            render_plan(&table, &plan),
            vec![
                "CREATE TABLE \"t\" (\"id\" INTEGER PRIMARY KEY)".to_string(),
                "CREATE INDEX IF NOT EXISTS \"idx_t_id\" ON \"t\" (\"id\")".to_string(),
            ]
        );
    }

    #[test]
    fn test_noop_plan_runs_nothing() {
        let conn = Connection::open_in_memory().unwrap();
        let table = parents();
        let plan = TablePlan {
            table: "parents".into(),
            result: SyncResult::AlreadyInSync,
            steps: vec![],
            retained_columns: vec![],
            rebuild_reason: None,
        };
        execute_plan(&conn, &table, &plan).unwrap();
        assert!(inspect_table(&conn, "parents", Capabilities::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_failure_reports_statement_and_outcome() {
        let conn = Connection::open_in_memory().unwrap();
        let table = parents();
        let plan = TablePlan {
            table: "parents".into(),
            result: SyncResult::OldColumnsRemoved,
            steps: vec![PlanStep::DropColumn {
                column: "missing".into(),
            }],
            retained_columns: vec![],
            rebuild_reason: None,
        };

        match execute_plan(&conn, &table, &plan) {
            Err(SyncError::ExecutionError {
                table,
                outcome,
                sql,
                ..
            }) => {
                assert_eq!(table, "parents");
                assert_eq!(outcome, SyncResult::OldColumnsRemoved);
                assert_eq!(sql, "ALTER TABLE \"parents\" DROP COLUMN \"missing\"");
            }
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    #[test]
    fn test_rebuild_keeps_children_and_restores_foreign_keys() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE parents (id INTEGER PRIMARY KEY, name TEXT);
             CREATE TABLE children (
                 id INTEGER PRIMARY KEY,
                 parent_id INTEGER REFERENCES parents (id) ON DELETE CASCADE
             );
             INSERT INTO parents (id, name) VALUES (1, 'a');
             INSERT INTO children (id, parent_id) VALUES (10, 1);",
        )
        .unwrap();

        let table = parents();
        let live = inspect_table(&conn, "parents", Capabilities::default())
            .unwrap()
            .unwrap();
        let plan = plan_table(&table, Some(&live), Capabilities::default(), true, "parents_backup");
        assert!(plan.requires_rebuild());
        execute_plan(&conn, &table, &plan).unwrap();

        let children: i64 = conn
            .query_row("SELECT COUNT(*) FROM children", [], |row| row.get(0))
            .unwrap();
        assert_eq!(children, 1);
        let name: String = conn
            .query_row("SELECT name FROM parents WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "a");
        let foreign_keys: bool = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert!(foreign_keys);
    }

    #[test]
    fn test_rebuild_renames_back_under_a_view() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE parents (id INTEGER PRIMARY KEY, name TEXT);
             CREATE VIEW parent_names AS SELECT id, name FROM parents;
             INSERT INTO parents (id, name) VALUES (1, 'a');",
        )
        .unwrap();

        let table = parents();
        let live = inspect_table(&conn, "parents", Capabilities::default())
            .unwrap()
            .unwrap();
        let plan = plan_table(&table, Some(&live), Capabilities::default(), true, "parents_backup");
        assert!(plan.requires_rebuild());
        execute_plan(&conn, &table, &plan).unwrap();

        let name: String = conn
            .query_row("SELECT name FROM parent_names WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "a");
        let legacy: bool = conn
            .query_row("PRAGMA legacy_alter_table", [], |row| row.get(0))
            .unwrap();
        assert!(!legacy);
    }

    #[test]
    fn test_failed_rebuild_restores_settings() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE parents (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO parents (id, name) VALUES (1, NULL);",
        )
        .unwrap();

        let table = parents();
        let live = inspect_table(&conn, "parents", Capabilities::default())
            .unwrap()
            .unwrap();
        let plan = plan_table(&table, Some(&live), Capabilities::default(), true, "parents_backup");
        assert!(matches!(
            execute_plan(&conn, &table, &plan),
            Err(SyncError::ExecutionError { .. })
        ));

        let foreign_keys: bool = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert!(foreign_keys);
        let legacy: bool = conn
            .query_row("PRAGMA legacy_alter_table", [], |row| row.get(0))
            .unwrap();
        assert!(!legacy);
    }

    #[test]
    fn test_statement_error_wins_over_restore_error() {
        let failed = Err(SyncError::ExecutionError {
            table: "parents".into(),
            outcome: SyncResult::DroppedAndRecreated,
            sql: "DROP TABLE \"parents\"".into(),
            source: rusqlite::Error::QueryReturnedNoRows,
        });
        let restore_failed = Err(SyncError::DatabaseError(rusqlite::Error::InvalidQuery));

        assert!(matches!(
            rebuild_result(failed, restore_failed),
            Err(SyncError::ExecutionError { .. })
        ));
        assert!(matches!(
            rebuild_result(Ok(()), Err(SyncError::DatabaseError(rusqlite::Error::InvalidQuery))),
            Err(SyncError::DatabaseError(_))
        ));
        assert!(rebuild_result(Ok(()), Ok(())).is_ok());
    }
}
