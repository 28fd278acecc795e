//! Config command - show and validate configuration.

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use crate::cli::OutputFormat;
use crate::config::{Config, CONFIG_ENV, DB_KEY_ENV};

/// Arguments for the config command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    mimir config show               Show the effective configuration\n    \
    mimir config show --format json Print it as JSON (secrets redacted)\n    \
    mimir config validate           Check the config file for errors")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Validate the configuration
    Validate,
}

pub fn run(args: Args, config: &Config) -> Result<()> {
    match args.command {
        Some(ConfigCommand::Show { format }) => show_config(config, format),
        None => show_config(config, OutputFormat::Text),
        Some(ConfigCommand::Validate) => validate_config(config),
    }
}

fn show_config(config: &Config, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!("{}", "Mimir Configuration".bold());
    println!();
    println!("  {}    {}", "Config file:".dimmed(), Config::config_path()?.display());
    println!();

    println!("{}", "Server:".bold());
    println!("  {}   {}", "HTTP port:".dimmed(), config.server.http_port);
    println!("  {}     {}", "WS port:".dimmed(), config.server.ws_port);
    println!();

    println!("{}", "Database:".bold());
    println!("  {}        {}", "Path:".dimmed(), config.database.path);
    let key_state = if config.database.encryption_key.is_some() {
        "set".green()
    } else {
        format!("not set (export {DB_KEY_ENV})").yellow()
    };
    println!("  {}         {}", "Key:".dimmed(), key_state);
    println!("  {} {} ms", "Busy timeout:".dimmed(), config.database.busy_timeout_ms);
    println!("  {} {} ms", "Lock timeout:".dimmed(), config.database.lock_timeout_ms);
    println!();

    println!("{}", "Agent:".bold());
    println!("  {} {}", "Default model:".dimmed(), config.opencode.default_model);

    if !config.projects.is_empty() {
        println!();
        println!("{}", "Declared projects:".bold());
        for project in &config.projects {
            println!(
                "  {}  {}  (port {})",
                project.name.cyan(),
                project.path.dimmed(),
                project.opencode_port
            );
        }
    }

    if !config.cron.is_empty() {
        println!();
        println!("{}", "Cron jobs:".bold());
        for job in &config.cron {
            println!(
                "  {}  {}  {} -> {}",
                job.name.cyan(),
                job.schedule.yellow(),
                job.action,
                job.project
            );
        }
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    println!("{} Configuration is valid", "OK".green().bold());
    if config.database.encryption_key.is_none() {
        println!(
            "{}",
            format!("Warning: no encryption key; set database.encryption_key or {DB_KEY_ENV}")
                .yellow()
        );
    }
    if std::env::var_os(CONFIG_ENV).is_some() {
        println!("{}", format!("Using {CONFIG_ENV}").dimmed());
    }
    Ok(())
}
