//! Schema reconciliation decisions and step plans.
//!
//! [`decide`] maps table existence, a [`ColumnDiff`] and the engine
//! [`Capabilities`] to exactly one [`SyncResult`] and an abstract
//! [`Action`]. [`plan_table`] then turns that decision into the ordered
//! [`PlanStep`]s a driver executes.
//!
//! The precedence of the decision table matters: a column mismatch
//! anywhere short-circuits to a rebuild before additions or removals are
//! classified, because patching a structurally incompatible table in place
//! can corrupt data.
//!
//! # Example
//!
//! ```
//! use tablesync_core::*;
//!
//! let users = TableBuilder::new("users")
//!     .column(Column::integer("id").primary_key())
//!     .column(Column::text("email"))
//!     .finish()
//!     .unwrap();
//!
//! let plan = plan_table(&users, None, Capabilities::default(), true, "users_backup");
//! assert_eq!(plan.result, SyncResult::NewTableCreated);
//! assert_eq!(plan.steps, vec![PlanStep::CreateTable { name: "users".into() }]);
//! ```

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::diff::{ColumnDiff, MismatchKind, diff_columns};
use crate::types::{
    Capabilities, ColumnDescriptor, GeneratedKind, IndexDefinition, InspectedColumn, SyncResult,
    TableDefinition,
};

/// Why a table has to be rebuilt instead of altered in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RebuildReason {
    /// A shared-name column differs in not-null, default presence or
    /// primary key rank.
    ColumnMismatch { column: String, kind: MismatchKind },
    /// Undeclared columns exist, DROP COLUMN is unavailable and data
    /// preservation was not requested.
    ExtraColumnsWithoutDropSupport { columns: Vec<String> },
    /// An undeclared column is part of the live primary key.
    ExtraPrimaryKeyColumn { column: String },
    /// An undeclared column is covered by an index.
    ExtraColumnIndexed { column: String },
    /// Columns are dropped while an index with a `WHERE` clause or
    /// expression keys may still reference them.
    ConditionalIndex { index: String },
    /// A stored generated column cannot be added in place.
    StoredGeneratedColumn { column: String },
    /// A NOT NULL column without default cannot be added to populated rows.
    NotNullWithoutDefault { column: String },
    /// A primary key column cannot be added in place.
    PrimaryKeyColumn { column: String },
    /// A UNIQUE column cannot be added in place.
    UniqueColumn { column: String },
    /// A column with a per-row default cannot be added in place.
    NonConstantDefault { column: String },
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ColumnMismatch { column, kind } => {
                let attribute = match kind {
                    MismatchKind::NotNull => "NOT NULL constraint",
                    MismatchKind::DefaultPresence => "default value",
                    MismatchKind::PrimaryKeyRank => "primary key position",
                };
                write!(f, "column '{column}' differs in {attribute}")
            }
            Self::ExtraColumnsWithoutDropSupport { columns } => write!(
                f,
                "undeclared columns [{}] cannot be dropped in place",
                columns.join(", ")
            ),
            Self::ExtraPrimaryKeyColumn { column } => {
                write!(f, "undeclared column '{column}' is part of the primary key")
            }
            Self::ExtraColumnIndexed { column } => {
                write!(f, "undeclared column '{column}' is indexed")
            }
            Self::ConditionalIndex { index } => {
                write!(f, "index '{index}' may reference undeclared columns")
            }
            Self::StoredGeneratedColumn { column } => {
                write!(f, "stored generated column '{column}' cannot be added")
            }
            Self::NotNullWithoutDefault { column } => {
                write!(f, "NOT NULL column '{column}' has no default")
            }
            Self::PrimaryKeyColumn { column } => {
                write!(f, "primary key column '{column}' cannot be added")
            }
            Self::UniqueColumn { column } => {
                write!(f, "UNIQUE column '{column}' cannot be added")
            }
            Self::NonConstantDefault { column } => {
                write!(f, "column '{column}' has a non-constant default")
            }
        }
    }
}

/// Abstract action chosen by [`decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Nothing to do.
    Noop,
    /// Create the table from the declaration.
    CreateTable,
    /// Alter the table in place.
    Alter {
        /// Columns to add, in declared order.
        add_columns: Vec<ColumnDescriptor>,
        /// Undeclared columns to drop.
        drop_columns: Vec<String>,
        /// Undeclared columns left in place.
        retained_columns: Vec<String>,
    },
    /// Copy into a freshly created table and swap it in.
    Rebuild(RebuildReason),
}

/// Outcome and action for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub result: SyncResult,
    pub action: Action,
}

impl Decision {
    fn rebuild(reason: RebuildReason) -> Self {
        Self {
            result: SyncResult::DroppedAndRecreated,
            action: Action::Rebuild(reason),
        }
    }
}

/// Picks the outcome for one table.
///
/// Evaluated in this order:
///
/// 1. missing table: create it;
/// 2. column mismatch: rebuild;
/// 3. undeclared columns: rebuild when they cannot be dropped and data
///    need not be preserved, otherwise drop them in place (or retain them
///    when DROP COLUMN is unavailable);
/// 4. missing columns: add in place unless one of them cannot be added
///    with `ADD COLUMN`, in which case rebuild;
/// 5. otherwise the table is already in sync.
///
/// # Examples
///
/// ```
/// use tablesync_core::*;
///
/// let diff = ColumnDiff {
///     columns_to_add: vec![Column::text("nickname").into_descriptor()],
///     ..ColumnDiff::default()
/// };
/// let decision = decide(true, &diff, Capabilities::default(), false);
/// assert_eq!(decision.result, SyncResult::NewColumnsAdded);
///
/// let diff = ColumnDiff {
///     columns_to_add: vec![Column::text("nickname").not_null().into_descriptor()],
///     ..ColumnDiff::default()
/// };
/// let decision = decide(true, &diff, Capabilities::default(), false);
/// assert_eq!(decision.result, SyncResult::DroppedAndRecreated);
/// ```
pub fn decide(
    exists: bool,
    diff: &ColumnDiff,
    capabilities: Capabilities,
    preserve_data: bool,
) -> Decision {
    if !exists {
        return Decision {
            result: SyncResult::NewTableCreated,
            action: Action::CreateTable,
        };
    }

    if let Some(mismatch) = &diff.mismatch {
        return Decision::rebuild(RebuildReason::ColumnMismatch {
            column: mismatch.column.clone(),
            kind: mismatch.kind,
        });
    }

    let mut drop_columns = Vec::new();
    let mut retained_columns = Vec::new();
    let removed = !diff.extra_columns.is_empty();
    if removed {
        let names: Vec<String> = diff.extra_columns.iter().map(|c| c.name.clone()).collect();
        if !preserve_data && !capabilities.supports_drop_column {
            return Decision::rebuild(RebuildReason::ExtraColumnsWithoutDropSupport {
                columns: names,
            });
        }
        if capabilities.supports_drop_column {
            if let Some(column) = diff.extra_columns.iter().find(|c| c.primary_key_rank > 0) {
                return Decision::rebuild(RebuildReason::ExtraPrimaryKeyColumn {
                    column: column.name.clone(),
                });
            }
            drop_columns = drop_order(&diff.extra_columns);
        } else {
            retained_columns = names;
        }
    }

    let mut add_columns = Vec::new();
    for column in &diff.columns_to_add {
        if let Some(reason) = add_column_blocker(column) {
            return Decision::rebuild(reason);
        }
        add_columns.push(column.clone());
    }

    let result = match (add_columns.is_empty(), removed) {
        (true, false) => {
            return Decision {
                result: SyncResult::AlreadyInSync,
                action: Action::Noop,
            };
        }
        (true, true) => SyncResult::OldColumnsRemoved,
        (false, false) => SyncResult::NewColumnsAdded,
        (false, true) => SyncResult::NewColumnsAddedAndOldColumnsRemoved,
    };

    Decision {
        result,
        action: Action::Alter {
            add_columns,
            drop_columns,
            retained_columns,
        },
    }
}

/// Generated columns go first, newest first, so no drop removes a column
/// that a generated column still being dropped depends on.
fn drop_order(extra_columns: &[InspectedColumn]) -> Vec<String> {
    let mut generated: Vec<&InspectedColumn> =
        extra_columns.iter().filter(|c| c.is_generated()).collect();
    generated.sort_by_key(|c| std::cmp::Reverse(c.cid));
    generated
        .into_iter()
        .chain(extra_columns.iter().filter(|c| !c.is_generated()))
        .map(|c| c.name.clone())
        .collect()
}

/// Returns why `ALTER TABLE ... ADD COLUMN` cannot add this column.
fn add_column_blocker(column: &ColumnDescriptor) -> Option<RebuildReason> {
    let name = column.name.clone();
    if column.generated_kind() == GeneratedKind::Stored {
        Some(RebuildReason::StoredGeneratedColumn { column: name })
    } else if column.not_null && !column.has_default() {
        Some(RebuildReason::NotNullWithoutDefault { column: name })
    } else if column.is_primary_key() {
        Some(RebuildReason::PrimaryKeyColumn { column: name })
    } else if column.unique {
        Some(RebuildReason::UniqueColumn { column: name })
    } else if column.has_default() && !column.has_constant_default() {
        Some(RebuildReason::NonConstantDefault { column: name })
    } else {
        None
    }
}

/// Where an index of the live table comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexOrigin {
    /// `CREATE INDEX` statement.
    Explicit,
    /// UNIQUE constraint.
    Unique,
    /// PRIMARY KEY constraint.
    PrimaryKey,
}

/// Index reported by the live database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveIndex {
    pub name: String,
    /// Named key columns; expression keys are left out.
    pub columns: Vec<String>,
    pub origin: IndexOrigin,
    /// Has a `WHERE` clause.
    pub partial: bool,
    /// Has at least one expression key.
    pub expression: bool,
}

/// Snapshot of a live table, taken at the start of a synchronization call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LiveTable {
    /// Columns in native column order.
    pub columns: Vec<InspectedColumn>,
    pub indexes: Vec<LiveIndex>,
}

impl LiveTable {
    fn has_index(&self, name: &str) -> bool {
        self.indexes
            .iter()
            .any(|index| index.name.eq_ignore_ascii_case(name))
    }

    fn is_indexed(&self, column: &str) -> bool {
        self.indexes.iter().any(|index| {
            index
                .columns
                .iter()
                .any(|c| c.eq_ignore_ascii_case(column))
        })
    }

    /// First index whose references are not fully listed in its columns.
    fn conditional_index(&self) -> Option<&LiveIndex> {
        self.indexes.iter().find(|index| index.partial || index.expression)
    }

    fn has_stored_column(&self, name: &str) -> bool {
        self.columns
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(name) && !c.is_generated())
    }
}

/// Literal used for a NOT NULL column that receives no copied value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnFill {
    pub column: String,
    pub literal: String,
}

/// One DDL step of a [`TablePlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PlanStep {
    /// Create the declared table under `name`.
    CreateTable { name: String },
    AddColumn { column: ColumnDescriptor },
    DropColumn { column: String },
    /// `INSERT INTO to (columns, fills) SELECT columns, literals FROM from`.
    CopyRows {
        from: String,
        to: String,
        columns: Vec<String>,
        fills: Vec<ColumnFill>,
    },
    DropTable { name: String },
    RenameTable { from: String, to: String },
    CreateIndex { index: IndexDefinition },
}

/// Concrete plan for synchronizing one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TablePlan {
    pub table: String,
    /// Outcome reported once the steps have run.
    pub result: SyncResult,
    /// Steps in execution order.
    pub steps: Vec<PlanStep>,
    /// Undeclared columns left in place because they could not be dropped.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub retained_columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rebuild_reason: Option<RebuildReason>,
}

impl TablePlan {
    fn new(table: &TableDefinition, result: SyncResult) -> Self {
        Self {
            table: table.name.clone(),
            result,
            steps: Vec::new(),
            retained_columns: Vec::new(),
            rebuild_reason: None,
        }
    }

    /// Returns `true` if executing the plan issues no statements.
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns `true` if the plan copies the table into a new one.
    pub fn requires_rebuild(&self) -> bool {
        self.rebuild_reason.is_some()
    }
}

/// Builds the step plan for one table.
///
/// `live` is `None` when the table does not exist. `backup_name` is the
/// unused table name that receives the copied rows during a rebuild.
///
/// Declared indexes are created after the table is created or rebuilt,
/// and on existing tables whenever an index of that name is missing;
/// creating a missing index does not change the reported outcome.
pub fn plan_table(
    table: &TableDefinition,
    live: Option<&LiveTable>,
    capabilities: Capabilities,
    preserve_data: bool,
    backup_name: &str,
) -> TablePlan {
    let Some(live) = live else {
        let decision = decide(false, &ColumnDiff::default(), capabilities, preserve_data);
        let mut plan = TablePlan::new(table, decision.result);
        plan.steps.push(PlanStep::CreateTable {
            name: table.name.clone(),
        });
        push_indexes(&mut plan, table.indexes.iter());
        return plan;
    };

    let diff = diff_columns(&table.columns, &live.columns);
    let mut decision = decide(true, &diff, capabilities, preserve_data);
    if let Action::Alter { drop_columns, .. } = &decision.action {
        let conditional = live.conditional_index().filter(|_| !drop_columns.is_empty());
        if let Some(column) = drop_columns.iter().find(|c| live.is_indexed(c)) {
            decision = Decision::rebuild(RebuildReason::ExtraColumnIndexed {
                column: column.clone(),
            });
        } else if let Some(index) = conditional {
            decision = Decision::rebuild(RebuildReason::ConditionalIndex {
                index: index.name.clone(),
            });
        }
    }
    debug!(table = %table.name, result = %decision.result, "decided synchronization outcome");

    let mut plan = TablePlan::new(table, decision.result);
    match decision.action {
        Action::Noop => {
            push_indexes(
                &mut plan,
                table.indexes.iter().filter(|index| !live.has_index(&index.name)),
            );
        }
        Action::CreateTable => {
            plan.steps.push(PlanStep::CreateTable {
                name: table.name.clone(),
            });
            push_indexes(&mut plan, table.indexes.iter());
        }
        Action::Alter {
            add_columns,
            drop_columns,
            retained_columns,
        } => {
            if !retained_columns.is_empty() {
                debug!(
                    table = %table.name,
                    columns = ?retained_columns,
                    "DROP COLUMN unavailable; undeclared columns retained"
                );
            }
            plan.steps.extend(
                add_columns
                    .into_iter()
                    .map(|column| PlanStep::AddColumn { column }),
            );
            plan.steps.extend(
                drop_columns
                    .into_iter()
                    .map(|column| PlanStep::DropColumn { column }),
            );
            plan.retained_columns = retained_columns;
            push_indexes(
                &mut plan,
                table.indexes.iter().filter(|index| !live.has_index(&index.name)),
            );
        }
        Action::Rebuild(reason) => {
            debug!(table = %table.name, %reason, "table requires rebuild");
            plan.steps = rebuild_steps(table, live, backup_name);
            plan.rebuild_reason = Some(reason);
            push_indexes(&mut plan, table.indexes.iter());
        }
    }
    plan
}

/// Create backup, copy surviving rows, drop original, rename backup.
fn rebuild_steps(table: &TableDefinition, live: &LiveTable, backup_name: &str) -> Vec<PlanStep> {
    let mut columns = Vec::new();
    let mut fills = Vec::new();
    for column in table.columns.iter().filter(|c| !c.is_generated()) {
        if live.has_stored_column(&column.name) {
            columns.push(column.name.clone());
        } else if column.not_null && !column.has_default() {
            fills.push(ColumnFill {
                column: column.name.clone(),
                literal: column.affinity().fill_literal().to_string(),
            });
        }
    }

    let mut steps = vec![PlanStep::CreateTable {
        name: backup_name.to_string(),
    }];
    if !columns.is_empty() {
        steps.push(PlanStep::CopyRows {
            from: table.name.clone(),
            to: backup_name.to_string(),
            columns,
            fills,
        });
    }
    steps.push(PlanStep::DropTable {
        name: table.name.clone(),
    });
    steps.push(PlanStep::RenameTable {
        from: backup_name.to_string(),
        to: table.name.clone(),
    });
    steps
}

fn push_indexes<'a>(plan: &mut TablePlan, indexes: impl Iterator<Item = &'a IndexDefinition>) {
    plan.steps.extend(indexes.map(|index| PlanStep::CreateIndex {
        index: index.clone(),
    }));
}
