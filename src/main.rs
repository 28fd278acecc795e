use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mimir::app::App;
use mimir::cli::commands;
use mimir::config::{Config, LoggingConfig};

/// The main CLI command line interface.
#[derive(Parser)]
#[command(name = "mimir")]
#[command(version)]
#[command(about = "Project and session store for the Mimir agent gateway")]
#[command(long_about = "Mimir tracks the projects it serves and the agent sessions running\n\
    in them. State lives in an encrypted SQLite database, unlocked with the\n\
    key from database.encryption_key or the MIMIR_DB_KEY environment variable.")]
#[command(after_help = "EXAMPLES:\n    \
    mimir status                               Show database status\n    \
    mimir projects add ~/src/api               Register a project\n    \
    mimir sessions create -p api -a coder      Start tracking a session\n    \
    mimir sessions status 1a2b3c4d active      Move a session forward\n    \
    mimir config show                          Show effective configuration\n\n\
    For more information about a command, run 'mimir <command> --help'.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Show database status and recent sessions
    Status,

    /// Register and manage projects
    #[command(long_about = "Registers project directories with Mimir. Each project has a\n\
        unique name, a path, and the port of its agent service.")]
    Projects(commands::projects::Args),

    /// Create and manage agent sessions
    #[command(long_about = "Creates sessions for a project and moves them through their\n\
        lifecycle: created, active, then completed, error, or cancelled.")]
    Sessions(commands::sessions::Args),

    /// View and validate configuration
    #[command(long_about = "Shows the effective configuration after environment overrides.\n\
        Configuration is read from ~/.mimir/config.yaml or MIMIR_CONFIG.")]
    Config(commands::config::Args),

    /// Database maintenance
    Db(commands::db::Args),

    /// Generate shell completion scripts
    Completions(commands::completions::Args),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions(args) = cli.command {
        commands::completions::generate_completions(&mut Cli::command(), args.shell);
        return Ok(());
    }

    let config = Config::load()?;
    let _guard = init_logging(cli.verbose, &config.logging)?;

    match cli.command {
        Commands::Config(args) => commands::config::run(args, &config),
        Commands::Completions(_) => Ok(()),
        command => {
            let app = App::new(config)?;
            let result = match command {
                Commands::Status => commands::status::run(&app),
                Commands::Projects(args) => commands::projects::run(args, &app),
                Commands::Sessions(args) => commands::sessions::run(args, &app),
                Commands::Db(args) => commands::db::run(args, &app),
                Commands::Config(_) | Commands::Completions(_) => Ok(()),
            };
            app.shutdown()?;
            result
        }
    }
}

/// Installs the global subscriber. Keep the returned guard alive so the
/// file writer flushes on exit.
fn init_logging(verbose: bool, logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = if verbose {
        "mimir=debug".to_string()
    } else {
        logging
            .level
            .clone()
            .unwrap_or_else(|| "mimir=info".to_string())
    };

    let (file_layer, guard) = match logging.file.as_deref() {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file_appender = tracing_appender::rolling::never(
                path.parent().unwrap_or(Path::new(".")),
                path.file_name().unwrap_or_default(),
            );
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}
