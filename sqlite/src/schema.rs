//! DDL generation from table definitions.
//!
//! Renders [`TableDefinition`]s and [`PlanStep`]s into SQLite statements.
//! Every identifier is double-quoted so declared names never need to be
//! restricted to a safe alphabet.
//!
//! # Primary keys
//!
//! A single-column primary key is rendered inline (`"id" INTEGER PRIMARY
//! KEY`) so an `INTEGER` key stays an alias of the rowid. Composite keys are
//! rendered as a table constraint whose column order follows the declared
//! ranks; SQLite reports the same ranks back through `PRAGMA table_info`.

use tablesync_core::{ColumnDescriptor, ColumnFill, IndexDefinition, PlanStep, TableDefinition};

/// Quotes an identifier, doubling embedded quotes.
///
/// # Examples
///
/// ```
/// use tablesync_sqlite::quote_identifier;
///
/// assert_eq!(quote_identifier("users"), "\"users\"");
/// assert_eq!(quote_identifier("odd\"name"), "\"odd\"\"name\"");
/// ```
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_list<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names
        .into_iter()
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders one column definition.
///
/// `inline_primary_key` controls whether a primary key column carries its
/// own `PRIMARY KEY` clause.
pub fn column_definition_sql(column: &ColumnDescriptor, inline_primary_key: bool) -> String {
    let mut sql = quote_identifier(&column.name);

    let sql_type = column.sql_type.trim();
    if !sql_type.is_empty() {
        sql.push(' ');
        sql.push_str(sql_type);
    }
    if inline_primary_key && column.is_primary_key() {
        sql.push_str(" PRIMARY KEY");
        if column.autoincrement {
            sql.push_str(" AUTOINCREMENT");
        }
    }
    if column.not_null {
        sql.push_str(" NOT NULL");
    }
    if column.unique {
        sql.push_str(" UNIQUE");
    }
    if column.has_default() {
        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default.trim());
        }
    }
    if let Some(generated) = &column.generated {
        sql.push_str(&format!(
            " GENERATED ALWAYS AS ({}) {}",
            generated.expression,
            generated.storage.as_sql()
        ));
    }

    sql
}

/// Generates `CREATE TABLE` for the declared table under `name`.
///
/// `name` differs from the declared name when building the backup table of
/// a rebuild.
///
/// # Examples
///
/// ```
/// use tablesync_core::{Column, TableBuilder};
/// use tablesync_sqlite::create_table_sql;
///
/// let users = TableBuilder::new("users")
///     .column(Column::integer("id").primary_key())
///     .column(Column::text("name").not_null().default_value("''"))
///     .finish()
///     .unwrap();
///
/// assert_eq!(
///     create_table_sql(&users, "users"),
///     "CREATE TABLE \"users\" (\"id\" INTEGER PRIMARY KEY, \"name\" TEXT NOT NULL DEFAULT '')"
/// );
/// ```
pub fn create_table_sql(table: &TableDefinition, name: &str) -> String {
    let key = table.primary_key_columns();
    let inline_key = key.len() == 1;

    let mut parts: Vec<String> = table
        .columns
        .iter()
        .map(|column| column_definition_sql(column, inline_key))
        .collect();
    if key.len() > 1 {
        parts.push(format!(
            "PRIMARY KEY ({})",
            quote_list(key.iter().map(|c| c.name.as_str()))
        ));
    }

    let mut sql = format!("CREATE TABLE {} ({})", quote_identifier(name), parts.join(", "));
    if table.without_rowid {
        sql.push_str(" WITHOUT ROWID");
    }
    sql
}

/// Generates `ALTER TABLE ... ADD COLUMN`.
pub fn add_column_sql(table: &str, column: &ColumnDescriptor) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}",
        quote_identifier(table),
        column_definition_sql(column, false)
    )
}

/// Generates `ALTER TABLE ... DROP COLUMN`.
pub fn drop_column_sql(table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {}",
        quote_identifier(table),
        quote_identifier(column)
    )
}

/// Generates the `INSERT INTO ... SELECT` that copies rows between tables.
///
/// Filled columns receive their literal instead of a copied value.
///
/// # Examples
///
/// ```
/// use tablesync_core::ColumnFill;
/// use tablesync_sqlite::copy_rows_sql;
///
/// let fills = [ColumnFill { column: "age".into(), literal: "0".into() }];
/// assert_eq!(
///     copy_rows_sql("users", "users_backup", &["id".into(), "name".into()], &fills),
///     "INSERT INTO \"users_backup\" (\"id\", \"name\", \"age\") SELECT \"id\", \"name\", 0 FROM \"users\""
/// );
/// ```
pub fn copy_rows_sql(from: &str, to: &str, columns: &[String], fills: &[ColumnFill]) -> String {
    let target = quote_list(
        columns
            .iter()
            .map(String::as_str)
            .chain(fills.iter().map(|f| f.column.as_str())),
    );
    let source = columns
        .iter()
        .map(|c| quote_identifier(c))
        .chain(fills.iter().map(|f| f.literal.clone()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({target}) SELECT {source} FROM {}",
        quote_identifier(to),
        quote_identifier(from)
    )
}

/// Generates `DROP TABLE`.
pub fn drop_table_sql(name: &str) -> String {
    format!("DROP TABLE {}", quote_identifier(name))
}

/// Generates `ALTER TABLE ... RENAME TO`.
pub fn rename_table_sql(from: &str, to: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME TO {}",
        quote_identifier(from),
        quote_identifier(to)
    )
}

/// Generates `CREATE [UNIQUE] INDEX IF NOT EXISTS`.
pub fn create_index_sql(table: &str, index: &IndexDefinition) -> String {
    format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
        if index.unique { "UNIQUE " } else { "" },
        quote_identifier(&index.name),
        quote_identifier(table),
        quote_list(index.columns.iter().map(String::as_str))
    )
}

/// Renders one plan step of `table` into a statement.
pub fn step_sql(table: &TableDefinition, step: &PlanStep) -> String {
    match step {
        PlanStep::CreateTable { name } => create_table_sql(table, name),
        PlanStep::AddColumn { column } => add_column_sql(&table.name, column),
        PlanStep::DropColumn { column } => drop_column_sql(&table.name, column),
        PlanStep::CopyRows {
            from,
            to,
            columns,
            fills,
        } => copy_rows_sql(from, to, columns, fills),
        PlanStep::DropTable { name } => drop_table_sql(name),
        PlanStep::RenameTable { from, to } => rename_table_sql(from, to),
        PlanStep::CreateIndex { index } => create_index_sql(&table.name, index),
    }
}
