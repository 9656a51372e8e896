//! Read-only inspection of the live database schema.
//!
//! Everything here reads from `sqlite_master` and the table-valued pragma
//! functions; nothing is cached. Each synchronization call takes a fresh
//! snapshot so decisions always reflect the current structure.

use rusqlite::{Connection, OptionalExtension};
use tablesync_core::{Capabilities, HiddenKind, IndexOrigin, InspectedColumn, LiveIndex, LiveTable};
use tracing::debug;

use crate::error::Result;

/// Reads the optional features of the linked SQLite library.
///
/// The version is fixed for the lifetime of the process, so callers may
/// read this once and reuse it.
pub fn detect_capabilities() -> Capabilities {
    let version = rusqlite::version_number();
    let capabilities = Capabilities::from_version_number(version);
    debug!(
        version = rusqlite::version(),
        drop_column = capabilities.supports_drop_column,
        generated_columns = capabilities.supports_generated_columns,
        "detected sqlite capabilities"
    );
    capabilities
}

/// Returns `true` if a table with this name exists (ASCII case-insensitive).
///
/// # Errors
///
/// Returns [`SyncError::DatabaseError`](crate::SyncError::DatabaseError) if
/// the catalog query fails.
pub fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Lists user tables, excluding SQLite's internal `sqlite_` tables.
pub fn table_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

/// Lists the columns of a table in native column order.
///
/// Uses `pragma_table_xinfo` when generated columns are supported so that
/// generated columns are included and classified; older engines fall back
/// to `pragma_table_info`. A missing table yields an empty list.
pub fn table_columns(
    conn: &Connection,
    table: &str,
    capabilities: Capabilities,
) -> Result<Vec<InspectedColumn>> {
    let sql = if capabilities.supports_generated_columns {
        "SELECT cid, name, type, \"notnull\", dflt_value, pk, hidden \
         FROM pragma_table_xinfo(?1) ORDER BY cid"
    } else {
        "SELECT cid, name, type, \"notnull\", dflt_value, pk, 0 \
         FROM pragma_table_info(?1) ORDER BY cid"
    };

    let mut stmt = conn.prepare(sql)?;
    let columns = stmt
        .query_map([table], |row| {
            let rank: i64 = row.get(5)?;
            let hidden: i64 = row.get(6)?;
            Ok(InspectedColumn {
                cid: row.get(0)?,
                name: row.get(1)?,
                sql_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                not_null: row.get(3)?,
                default_value: row.get(4)?,
                primary_key_rank: u32::try_from(rank).unwrap_or(0),
                hidden: HiddenKind::from_code(hidden),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

/// Lists the indexes of a table together with their key columns.
///
/// Expression keys have no name: they are left out of `columns` and the
/// index is flagged as `expression`. `partial` marks indexes with a `WHERE`
/// clause.
pub fn table_indexes(conn: &Connection, table: &str) -> Result<Vec<LiveIndex>> {
    let mut stmt =
        conn.prepare("SELECT name, origin, partial FROM pragma_index_list(?1) ORDER BY seq")?;
    let listed = stmt
        .query_map([table], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut info = conn.prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;
    let mut indexes = Vec::with_capacity(listed.len());
    for (name, origin, partial) in listed {
        let keys = info
            .query_map([&name], |row| row.get::<_, Option<String>>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let expression = keys.iter().any(Option::is_none);
        let columns = keys.into_iter().flatten().collect();
        let origin = match origin.as_str() {
            "pk" => IndexOrigin::PrimaryKey,
            "u" => IndexOrigin::Unique,
            _ => IndexOrigin::Explicit,
        };
        indexes.push(LiveIndex {
            name,
            columns,
            origin,
            partial,
            expression,
        });
    }
    Ok(indexes)
}

/// Takes a snapshot of a live table, or `None` if it does not exist.
///
/// # Examples
///
/// ```
/// use rusqlite::Connection;
/// use tablesync_core::Capabilities;
/// use tablesync_sqlite::inspect_table;
///
/// let conn = Connection::open_in_memory().unwrap();
/// conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT NOT NULL)").unwrap();
///
/// let live = inspect_table(&conn, "T", Capabilities::default()).unwrap().unwrap();
/// assert_eq!(live.columns.len(), 2);
/// assert!(live.columns[1].not_null);
/// assert!(inspect_table(&conn, "missing", Capabilities::default()).unwrap().is_none());
/// ```
pub fn inspect_table(
    conn: &Connection,
    table: &str,
    capabilities: Capabilities,
) -> Result<Option<LiveTable>> {
    let stored_name: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    let Some(name) = stored_name else {
        return Ok(None);
    };

    Ok(Some(LiveTable {
        columns: table_columns(conn, &name, capabilities)?,
        indexes: table_indexes(conn, &name)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE items (
                 id INTEGER PRIMARY KEY,
                 sku TEXT NOT NULL UNIQUE,
                 qty INTEGER NOT NULL DEFAULT 0,
                 price REAL,
                 total REAL GENERATED ALWAYS AS (qty * price) VIRTUAL,
                 weight REAL GENERATED ALWAYS AS (qty * 2) STORED
             );
             CREATE INDEX idx_items_price ON items (price);
             CREATE TABLE pairs (a TEXT NOT NULL, b TEXT NOT NULL, PRIMARY KEY (b, a)) WITHOUT ROWID;",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_detect_capabilities_matches_linked_version() {
        let capabilities = detect_capabilities();
        assert_eq!(
            capabilities,
            Capabilities::from_version_number(rusqlite::version_number())
        );
    }

    #[test]
    fn test_table_exists_is_case_insensitive() {
        let conn = conn();
        assert!(table_exists(&conn, "items").unwrap());
        assert!(table_exists(&conn, "ITEMS").unwrap());
        assert!(!table_exists(&conn, "missing").unwrap());
    }

    #[test]
    fn test_table_names_sorted() {
        let conn = conn();
        assert_eq!(table_names(&conn).unwrap(), vec!["items", "pairs"]);
    }

    #[test]
    fn test_columns_report_attributes_and_generated_kinds() {
        let conn = conn();
        let columns = table_columns(&conn, "items", Capabilities::default()).unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "sku", "qty", "price", "total", "weight"]);

        assert_eq!(columns[0].primary_key_rank, 1);
        assert!(columns[1].not_null);
        assert_eq!(columns[2].default_value.as_deref(), Some("0"));
        assert!(!columns[3].has_default());
        assert_eq!(columns[4].hidden, HiddenKind::Virtual);
        assert_eq!(columns[5].hidden, HiddenKind::Stored);
    }

    #[test]
    fn test_plain_table_info_omits_generated_columns() {
        let conn = conn();
        let columns = table_columns(&conn, "items", Capabilities::new(true, false)).unwrap();
        assert_eq!(columns.len(), 4);
        assert!(columns.iter().all(|c| c.hidden == HiddenKind::Normal));
    }

    #[test]
    fn test_composite_key_ranks() {
        let conn = conn();
        let columns = table_columns(&conn, "pairs", Capabilities::default()).unwrap();
        assert_eq!(columns[0].primary_key_rank, 2);
        assert_eq!(columns[1].primary_key_rank, 1);
    }

    #[test]
    fn test_indexes_with_origin() {
        let conn = conn();
        let indexes = table_indexes(&conn, "items").unwrap();

        let explicit = indexes
            .iter()
            .find(|i| i.name == "idx_items_price")
            .unwrap();
        assert_eq!(explicit.origin, IndexOrigin::Explicit);
        assert_eq!(explicit.columns, vec!["price"]);

        let unique = indexes
            .iter()
            .find(|i| i.origin == IndexOrigin::Unique)
            .unwrap();
        assert_eq!(unique.columns, vec!["sku"]);
        assert!(indexes.iter().all(|i| !i.partial));
    }

    #[test]
    fn test_partial_index_flagged() {
        let conn = conn();
        conn.execute_batch("CREATE INDEX idx_items_stocked ON items (sku) WHERE qty > 0")
            .unwrap();
        let indexes = table_indexes(&conn, "items").unwrap();
        let partial = indexes
            .iter()
            .find(|i| i.name == "idx_items_stocked")
            .unwrap();
        assert!(partial.partial);
        assert!(!partial.expression);
        assert_eq!(partial.columns, vec!["sku"]);
    }

    #[test]
    fn test_expression_index_flagged() {
        let conn = conn();
        conn.execute_batch("CREATE INDEX idx_items_lower_sku ON items (lower(sku), qty)")
            .unwrap();
        let indexes = table_indexes(&conn, "items").unwrap();
        let index = indexes
            .iter()
            .find(|i| i.name == "idx_items_lower_sku")
            .unwrap();
        assert!(index.expression);
        assert_eq!(index.columns, vec!["qty"]);
    }

    #[test]
    fn test_missing_table_yields_no_columns() {
        let conn = conn();
        assert!(table_columns(&conn, "missing", Capabilities::default())
            .unwrap()
            .is_empty());
    }
}
