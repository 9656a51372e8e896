//! Column diff engine.
//!
//! Compares the declared columns of a table against the columns reported
//! by the live database. Columns are matched by name (ASCII
//! case-insensitive, as SQLite resolves identifiers) and compared on three
//! attributes only: not-null, presence of a default, and primary key rank.
//! Declared types and concrete default values are deliberately not part of
//! the comparison.

use serde::{Deserialize, Serialize};

use crate::types::{ColumnDescriptor, HiddenKind, InspectedColumn};

/// Attribute that differed between a declared and a live column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    NotNull,
    DefaultPresence,
    PrimaryKeyRank,
}

/// First shared-name column found to differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMismatch {
    /// Column name as declared.
    pub column: String,
    /// Attribute that differed.
    pub kind: MismatchKind,
}

/// Result of comparing declared columns against live columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDiff {
    /// Declared columns missing from the live table, in declared order.
    pub columns_to_add: Vec<ColumnDescriptor>,
    /// Live columns that are not declared, in live column order.
    pub extra_columns: Vec<InspectedColumn>,
    /// Set when a shared-name column differs; forces a rebuild.
    pub mismatch: Option<ColumnMismatch>,
}

impl ColumnDiff {
    /// Returns `true` if a shared-name column differs.
    pub fn is_mismatch(&self) -> bool {
        self.mismatch.is_some()
    }

    /// Returns `true` if declared and live columns are attribute-equal.
    pub fn is_empty(&self) -> bool {
        self.columns_to_add.is_empty() && self.extra_columns.is_empty() && self.mismatch.is_none()
    }
}

/// Compares declared columns against live columns.
///
/// Walks the declared list once. Matching, attribute-equal pairs are
/// consumed; unmatched declared columns become columns to add. The first
/// attribute difference stops the walk, since a rebuild is required no
/// matter what else differs, and the extra columns are then left empty.
/// Live hidden columns of virtual tables are ignored.
///
/// # Examples
///
/// ```
/// use tablesync_core::*;
///
/// let declared = vec![
///     Column::integer("id").primary_key().into_descriptor(),
///     Column::text("email").into_descriptor(),
/// ];
/// let live = vec![InspectedColumn {
///     cid: 0,
///     name: "id".into(),
///     sql_type: "INTEGER".into(),
///     not_null: false,
///     default_value: None,
///     primary_key_rank: 1,
///     hidden: HiddenKind::Normal,
/// }];
///
/// let diff = diff_columns(&declared, &live);
/// assert!(!diff.is_mismatch());
/// assert_eq!(diff.columns_to_add[0].name, "email");
/// assert!(diff.extra_columns.is_empty());
/// ```
pub fn diff_columns(declared: &[ColumnDescriptor], actual: &[InspectedColumn]) -> ColumnDiff {
    let mut remaining: Vec<&InspectedColumn> = actual
        .iter()
        .filter(|column| column.hidden != HiddenKind::Hidden)
        .collect();
    let mut diff = ColumnDiff::default();

    for column in declared {
        let found = remaining
            .iter()
            .position(|live| live.name.eq_ignore_ascii_case(&column.name));
        match found {
            Some(index) => {
                if let Some(kind) = compare(column, remaining[index]) {
                    diff.mismatch = Some(ColumnMismatch {
                        column: column.name.clone(),
                        kind,
                    });
                    return diff;
                }
                remaining.remove(index);
            }
            None => diff.columns_to_add.push(column.clone()),
        }
    }

    diff.extra_columns = remaining.into_iter().cloned().collect();
    diff
}

fn compare(declared: &ColumnDescriptor, live: &InspectedColumn) -> Option<MismatchKind> {
    if declared.not_null != live.not_null {
        Some(MismatchKind::NotNull)
    } else if declared.has_default() != live.has_default() {
        Some(MismatchKind::DefaultPresence)
    } else if declared.primary_key_rank != live.primary_key_rank {
        Some(MismatchKind::PrimaryKeyRank)
    } else {
        None
    }
}
