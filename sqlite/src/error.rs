//! Error types for SQLite schema synchronization.
//!
//! Database errors are carried verbatim: the wrapped [`rusqlite::Error`]
//! keeps the engine's result code and message.

use tablesync_core::SyncResult;
use thiserror::Error;

/// Errors that can occur while inspecting or synchronizing a schema.
#[derive(Debug, Error)]
pub enum SyncError {
    /// SQLite failure while inspecting the live schema.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// A DDL statement failed part-way through a plan.
    ///
    /// Statements executed before `sql` remain applied.
    #[error("synchronizing '{table}' ({outcome}) failed at `{sql}`: {source}")]
    ExecutionError {
        /// Table being synchronized.
        table: String,
        /// Outcome the plan was producing.
        outcome: SyncResult,
        /// Statement that failed.
        sql: String,
        /// Engine error.
        #[source]
        source: rusqlite::Error,
    },

    /// No table with this name is registered in the schema.
    #[error("table not registered: {0}")]
    UnknownTable(String),
}

/// Convenience alias for results with [`SyncError`].
pub type Result<T> = std::result::Result<T, SyncError>;
