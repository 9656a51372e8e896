//! Integration tests for the tablesync-config crate.

use std::fs;

use tablesync_config::{ConfigError, SyncConfig, load_dir};
use tablesync_core::{Capabilities, GeneratedKind};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, contents: &str) {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

#[test]
fn config_with_mixed_includes_builds_schema() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "tables/01-orders.json",
        r#"[{
            "name": "orders",
            "columns": [
                { "name": "id", "sql_type": "INTEGER", "primary_key_rank": 1, "autoincrement": true },
                { "name": "qty", "sql_type": "INTEGER", "not_null": true, "default": "1" },
                { "name": "price", "sql_type": "REAL" },
                { "name": "total", "sql_type": "REAL",
                  "generated": { "expression": "qty * price", "storage": "virtual" } }
            ]
        }]"#,
    );
    write(
        &dir,
        "tables/02-tags.yaml",
        "name: tags\nwithout_rowid: true\ncolumns:\n  - { name: label, sql_type: TEXT, not_null: true, primary_key_rank: 1 }\n",
    );
    write(&dir, "extra.yml", "- name: audit\n  columns:\n    - { name: id, sql_type: INTEGER }\n");
    write(
        &dir,
        "tablesync.yml",
        "preserve_data: true\ncapabilities:\n  generated_columns: false\ninclude:\n  - tables\n  - extra.yml\n",
    );

    let config = SyncConfig::load(dir.path().join("tablesync.yml")).unwrap();
    assert!(config.preserve_data);
    assert_eq!(
        config.apply_capabilities(Capabilities::default()),
        Capabilities::new(true, false)
    );

    let schema = config.schema().unwrap();
    assert_eq!(schema.table_names(), vec!["orders", "tags", "audit"]);
    let orders = schema.get("orders").unwrap();
    assert_eq!(
        orders.column("total").unwrap().generated_kind(),
        GeneratedKind::Virtual
    );
    assert!(schema.get("tags").unwrap().without_rowid);
}

#[test]
fn missing_include_reports_io_error() {
    let dir = TempDir::new().unwrap();
    write(&dir, "tablesync.yml", "include:\n  - nowhere.yaml\n");

    let err = SyncConfig::load(dir.path().join("tablesync.yml")).unwrap_err();
    assert!(matches!(err, ConfigError::IoError(_)));
}

#[test]
fn load_dir_on_missing_directory_fails() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        load_dir(dir.path().join("absent")),
        Err(ConfigError::IoError(_))
    ));
}
