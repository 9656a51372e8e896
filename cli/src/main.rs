use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use tablesync_config::SyncConfig;
use tablesync_core::{Capabilities, LiveTable, Schema, TablePlan};
use tablesync_sqlite::{
    SyncReport, Synchronizer, detect_capabilities, inspect_table, table_names,
};
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;

/// Output format for reports.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Table,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "tablesync")]
#[command(about = "Synchronize SQLite tables with their declarations")]
struct Cli {
    /// Log every inspection and executed statement.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Bring the database in line with the declared tables.
    Sync(SyncArgs),
    /// Show what a sync would do without changing anything.
    Status(StatusArgs),
    /// Show the live columns and indexes of one table.
    Inspect(InspectArgs),
    /// List the tables present in the database.
    Tables(TablesArgs),
    /// Validate the table declarations of a configuration file.
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
struct SyncArgs {
    /// Database file path.
    #[arg(long)]
    db: PathBuf,
    /// Configuration file with table declarations.
    #[arg(long)]
    config: PathBuf,
    /// Retain undeclared columns that cannot be dropped in place.
    #[arg(long)]
    preserve: bool,
    /// Print the planned statements instead of executing them.
    #[arg(long)]
    dry_run: bool,
    /// Output format.
    #[arg(long, default_value = "table")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct StatusArgs {
    /// Database file path.
    #[arg(long)]
    db: PathBuf,
    /// Configuration file with table declarations.
    #[arg(long)]
    config: PathBuf,
    /// Plan as if data preservation was requested.
    #[arg(long)]
    preserve: bool,
    /// Output format.
    #[arg(long, default_value = "table")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct InspectArgs {
    /// Database file path.
    #[arg(long)]
    db: PathBuf,
    /// Table name.
    #[arg(long)]
    table: String,
    /// Output format.
    #[arg(long, default_value = "table")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct TablesArgs {
    /// Database file path.
    #[arg(long)]
    db: PathBuf,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Configuration file with table declarations.
    #[arg(long)]
    config: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: failed to install logger: {err}");
    }

    let result = match cli.command {
        Command::Sync(args) => run_sync(args),
        Command::Status(args) => run_status(args),
        Command::Inspect(args) => run_inspect(args),
        Command::Tables(args) => run_tables(args),
        Command::Validate(args) => run_validate(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// sync / status
// ---------------------------------------------------------------------------

fn run_sync(args: SyncArgs) -> Result<(), String> {
    let (config, schema) = load_config(&args.config)?;
    let conn = open_database(&args.db)?;
    let preserve = args.preserve || config.preserve_data;
    let sync = synchronizer(&conn, &schema, &config);

    if args.dry_run {
        return print_plans(&sync, preserve, args.format);
    }

    let report = sync
        .sync_schema(preserve)
        .map_err(|e| format!("Synchronization failed: {e}"))?;
    print_report(&report, args.format)
}

fn run_status(args: StatusArgs) -> Result<(), String> {
    let (config, schema) = load_config(&args.config)?;
    let conn = open_database(&args.db)?;
    let preserve = args.preserve || config.preserve_data;
    let sync = synchronizer(&conn, &schema, &config);
    print_plans(&sync, preserve, args.format)
}

fn synchronizer<'a>(
    conn: &'a Connection,
    schema: &'a Schema,
    config: &SyncConfig,
) -> Synchronizer<'a> {
    let sync = Synchronizer::new(conn, schema);
    let capabilities = config.apply_capabilities(sync.capabilities());
    debug!(?capabilities, "effective capabilities");
    sync.with_capabilities(capabilities)
}

/// A plan together with the statements it would execute.
#[derive(Serialize)]
struct PlanView<'a> {
    #[serde(flatten)]
    plan: &'a TablePlan,
    statements: Vec<String>,
}

fn print_plans(sync: &Synchronizer<'_>, preserve: bool, format: CliOutputFormat) -> Result<(), String> {
    let plans = sync
        .schema_status(preserve)
        .map_err(|e| format!("Failed to plan synchronization: {e}"))?;
    let mut views = Vec::with_capacity(plans.len());
    for plan in &plans {
        let statements = sync
            .render_plan(plan)
            .map_err(|e| format!("Failed to render plan: {e}"))?;
        views.push(PlanView { plan, statements });
    }

    match format {
        CliOutputFormat::Json => print_json(&views),
        CliOutputFormat::Table => {
            for view in &views {
                println!("{}: {}", view.plan.table, view.plan.result);
                if let Some(reason) = &view.plan.rebuild_reason {
                    println!("  reason: {reason}");
                }
                if !view.plan.retained_columns.is_empty() {
                    println!("  retained: {}", view.plan.retained_columns.join(", "));
                }
                for sql in &view.statements {
                    println!("  {sql};");
                }
            }
            let pending = views.iter().filter(|v| !v.plan.is_noop()).count();
            println!("{pending} of {} table(s) need changes.", views.len());
            Ok(())
        }
    }
}

fn print_report(report: &SyncReport, format: CliOutputFormat) -> Result<(), String> {
    match format {
        CliOutputFormat::Json => print_json(report),
        CliOutputFormat::Table => {
            let width = report
                .tables
                .iter()
                .map(|t| t.table.len())
                .max()
                .unwrap_or(0);
            for outcome in &report.tables {
                println!("{:<width$}  {}", outcome.table, outcome.result);
                if let Some(reason) = &outcome.rebuild_reason {
                    println!("{:<width$}    reason: {reason}", "");
                }
                if !outcome.retained_columns.is_empty() {
                    println!(
                        "{:<width$}    retained: {}",
                        "",
                        outcome.retained_columns.join(", ")
                    );
                }
            }
            println!(
                "Synchronized {} table(s), {} changed.",
                report.tables.len(),
                report.changed()
            );
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// inspect / tables / validate
// ---------------------------------------------------------------------------

fn run_inspect(args: InspectArgs) -> Result<(), String> {
    let conn = open_existing_database(&args.db)?;
    let capabilities = detect_capabilities();
    let live = inspect_table(&conn, &args.table, capabilities)
        .map_err(|e| format!("Failed to inspect '{}': {e}", args.table))?
        .ok_or_else(|| format!("Table '{}' not found", args.table))?;

    match args.format {
        CliOutputFormat::Json => print_json(&live),
        CliOutputFormat::Table => {
            print_live_table(&args.table, &live, capabilities);
            Ok(())
        }
    }
}

fn print_live_table(name: &str, live: &LiveTable, capabilities: Capabilities) {
    println!("Table: {name}");
    println!(
        "  {:<4} {:<20} {:<12} {:<8} {:<8} {:<12} {}",
        "cid", "name", "type", "notnull", "pk", "default", "generated"
    );
    for column in &live.columns {
        let generated = if capabilities.supports_generated_columns {
            format!("{:?}", column.generated_kind()).to_lowercase()
        } else {
            "-".to_string()
        };
        println!(
            "  {:<4} {:<20} {:<12} {:<8} {:<8} {:<12} {}",
            column.cid,
            column.name,
            column.sql_type,
            if column.not_null { "yes" } else { "no" },
            column.primary_key_rank,
            column.default_value.as_deref().unwrap_or("-"),
            generated
        );
    }
    if !live.indexes.is_empty() {
        println!("Indexes:");
        for index in &live.indexes {
            println!(
                "  {} ({}) [{:?}]",
                index.name,
                index.columns.join(", "),
                index.origin
            );
        }
    }
}

fn run_tables(args: TablesArgs) -> Result<(), String> {
    let conn = open_existing_database(&args.db)?;
    let names = table_names(&conn).map_err(|e| format!("Failed to list tables: {e}"))?;
    for name in &names {
        println!("{name}");
    }
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), String> {
    let (_, schema) = load_config(&args.config)?;
    println!(
        "Validated {} table declaration(s) in '{}'.",
        schema.len(),
        args.config.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<(SyncConfig, Schema), String> {
    let config = SyncConfig::load(path)
        .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))?;
    let schema = config
        .schema()
        .map_err(|e| format!("Invalid config '{}': {e}", path.display()))?;
    Ok((config, schema))
}

fn open_database(path: &Path) -> Result<Connection, String> {
    Connection::open(path).map_err(|e| format!("Failed to open database '{}': {e}", path.display()))
}

/// Opens an existing database read-only.
fn open_existing_database(path: &Path) -> Result<Connection, String> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| format!("Failed to open database '{}': {e}", path.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let raw = serde_json::to_string_pretty(value)
        .map_err(|e| format!("JSON serialization failed: {e}"))?;
    println!("{raw}");
    Ok(())
}
