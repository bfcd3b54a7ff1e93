//! keel-migrate CLI
//!
//! Command-line tool for generating SQL migrations from schema files.

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use keel_core::{DialectKind, Differ, SchemaSnapshot};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use keel_migrate::config::{DEFAULT_MIGRATIONS_DIR, DEFAULT_SCHEMA};
use keel_migrate::prelude::*;

/// Schema-diff migrations for SQL databases.
#[derive(Parser)]
#[command(name = "keel-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Schema file describing the target state.
    #[arg(short, long, global = true, env = "KEEL_SCHEMA", default_value = DEFAULT_SCHEMA)]
    schema: PathBuf,

    /// Migrations directory.
    #[arg(
        short,
        long,
        global = true,
        env = "KEEL_MIGRATIONS_DIR",
        default_value = DEFAULT_MIGRATIONS_DIR
    )]
    migrations_dir: PathBuf,

    /// Target dialect (postgresql, sqlite, mysql). Defaults to the
    /// schema's datasource provider.
    #[arg(short, long, global = true, env = "KEEL_DIALECT")]
    dialect: Option<DialectKind>,

    /// Accept drops and adds that look like renames.
    #[arg(long, global = true)]
    allow_drop_add: bool,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the schema file.
    Validate,

    /// Print the SQL turning one schema into another.
    Diff {
        /// Starting schema file, or `empty`.
        #[arg(long, default_value = "empty")]
        from: String,

        /// Target schema file (the configured schema if not specified).
        #[arg(long)]
        to: Option<PathBuf>,
    },

    /// Write a migration for the changes since the latest migration.
    Create {
        /// Migration name.
        #[arg(short, long)]
        name: String,

        /// Print the migration without writing files.
        #[arg(long)]
        dry_run: bool,
    },

    /// Compare the latest migration with the schema file.
    Status,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = MigrateConfig {
        schema: cli.schema,
        migrations_dir: cli.migrations_dir,
        dialect: cli.dialect,
        allow_drop_add: cli.allow_drop_add,
    };

    match cli.command {
        Commands::Validate => {
            let schema = read_schema(&config.schema)?;
            let provider = schema
                .provider
                .map_or_else(|| "none".to_string(), |p| p.to_string());
            info!(
                "Schema {} is valid: {} tables, provider {provider}",
                config.schema.display(),
                schema.tables.len()
            );
        }

        Commands::Diff { from, to } => {
            let after = read_schema(to.as_ref().unwrap_or(&config.schema))?;
            let before = if from == "empty" {
                SchemaSnapshot::new("empty")
            } else {
                read_schema(Path::new(&from))?
            };
            let dialect = config.resolve_dialect(&after)?;
            let diff = Differ::new(config.diff_options(dialect)).diff(&before, &after)?;
            for warning in &diff.warnings {
                warn!("{warning}");
            }
            if diff.is_empty() {
                info!("No changes detected.");
            } else {
                print!("{}", render(dialect, &diff.changes)?);
            }
        }

        Commands::Create { name, dry_run } => {
            let schema = read_schema(&config.schema)?;
            let dialect = config.resolve_dialect(&schema)?;
            let history = MigrationHistory::new(&config.migrations_dir);
            let writer = MigrationWriter::new(dialect, config.diff_options(dialect));

            let plan = writer.plan(&history.latest_snapshot()?, &schema)?;
            if plan.is_empty() {
                info!("No changes detected.");
            } else if dry_run {
                info!("Dry run mode - the migration will be printed but not written.");
                println!("-- Migration: {}\n", sanitize_name(&name));
                print!("{}", plan.sql);
            } else {
                let path = writer.write(history.dir(), &name, Utc::now().naive_utc(), &plan)?;
                info!("Created migration: {}", path.display());
            }
        }

        Commands::Status => {
            let schema = read_schema(&config.schema)?;
            let dialect = config.resolve_dialect(&schema)?;
            let history = MigrationHistory::new(&config.migrations_dir);
            let status = history.status(&schema, &Differ::new(config.diff_options(dialect)))?;

            if status.migrations.is_empty() {
                info!("No migrations have been created yet.");
            } else {
                println!("\nMigrations:");
                println!("{:-<60}", "");
                for migration in &status.migrations {
                    println!(
                        " {} ({}) {}",
                        migration.id,
                        migration.created_at.format("%Y-%m-%d %H:%M:%S"),
                        migration.sql_path().display()
                    );
                }
                println!();
            }

            if status.is_up_to_date() {
                info!("Schema is up to date.");
            } else {
                info!(
                    "Schema has {} change(s) not covered by a migration. Run `create` to add one.",
                    status.pending.changes.len()
                );
                for change in status.destructive_changes() {
                    warn!(
                        kind = change.kind(),
                        table = change.table(),
                        "Pending change loses data"
                    );
                }
            }
        }
    }

    Ok(())
}
