//! Database management command - migrate and stats.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::app::App;
use crate::storage::db::SCHEMA_VERSION;

/// Arguments for the db command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    mimir db migrate                Create or upgrade the schema\n    \
    mimir db stats                  Show row counts and file size")]
pub struct Args {
    /// Database subcommand to run
    #[command(subcommand)]
    pub command: DbCommand,
}

/// Database management subcommands.
#[derive(clap::Subcommand)]
pub enum DbCommand {
    /// Create any missing tables, triggers, and indexes
    #[command(
        long_about = "Applies the schema to the configured database. Safe to run\n\
        repeatedly: existing tables and rows are left untouched."
    )]
    Migrate,

    /// Show database statistics
    Stats,
}

/// Executes the db command.
pub fn run(args: Args, app: &App) -> Result<()> {
    match args.command {
        DbCommand::Migrate => run_migrate(app),
        DbCommand::Stats => run_stats(app),
    }
}

fn run_migrate(app: &App) -> Result<()> {
    app.store().migrate().context("Migration failed")?;
    let version = app.store().schema_version()?;

    println!(
        "{} Schema is at version {}",
        "Done.".green().bold(),
        version.to_string().cyan()
    );
    Ok(())
}

fn run_stats(app: &App) -> Result<()> {
    let store = app.store();
    let counts = store.counts()?;
    let version = store.schema_version()?;
    let file_size = std::fs::metadata(store.path()).map(|m| m.len()).ok();

    println!("{}", "Database Statistics".bold());
    println!();
    println!("  {}      {}", "Path:".dimmed(), store.path().display());
    println!("  {}    {} (current {})", "Schema:".dimmed(), version, SCHEMA_VERSION);
    println!("  {}  {}", "Projects:".dimmed(), counts.projects);
    println!("  {}  {}", "Sessions:".dimmed(), counts.sessions);
    println!("  {} {}", "Worktrees:".dimmed(), counts.worktrees);
    if let Some(bytes) = file_size {
        println!("  {}      {}", "Size:".dimmed(), format_size(bytes));
    }

    Ok(())
}

/// Formats a file size in bytes as a human-readable string.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} bytes")
    }
}
