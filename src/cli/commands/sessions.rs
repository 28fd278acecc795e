//! Sessions command - create, inspect, and move sessions through their lifecycle.
//!
//! Sessions are addressed by an id prefix, as shown in `mimir sessions list`.
//! Status changes go through the lifecycle rules, so a completed session
//! cannot be reopened from the command line.

use std::io::{self, Write};

use anyhow::{anyhow, bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use uuid::Uuid;

use crate::app::App;
use crate::cli::commands::projects::find_project;
use crate::cli::format::{format_timestamp, short_id, truncate_to_width};
use crate::cli::OutputFormat;
use crate::storage::{Session, SessionStatus, Worktree};

/// Arguments for the sessions command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    mimir sessions                                 List all sessions\n    \
    mimir sessions list --project api              Sessions for one project\n    \
    mimir sessions create --project api --agent coder\n    \
    mimir sessions create --project api --agent coder --worktree ../api-fix --branch fix/login\n    \
    mimir sessions show 1a2b3c4d                   Show a session and its worktrees\n    \
    mimir sessions status 1a2b3c4d active          Start a session\n    \
    mimir sessions delete 1a2b3c4d --force         Delete without confirmation")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<SessionsCommand>,
}

#[derive(Subcommand)]
pub enum SessionsCommand {
    /// List sessions, newest first
    List {
        /// Only sessions belonging to this project
        #[arg(short, long, value_name = "NAME")]
        project: Option<String>,

        /// Only sessions in this status
        #[arg(short, long)]
        status: Option<SessionStatus>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Create a session in the `created` state
    Create {
        /// Project the session belongs to
        #[arg(short, long, value_name = "NAME")]
        project: String,

        /// Agent that drives the session (e.g., coder, reviewer)
        #[arg(short, long, value_name = "TYPE")]
        agent: String,

        /// Worktree checked out for the session
        #[arg(short, long, value_name = "PATH")]
        worktree: Option<String>,

        /// Branch the session works on
        #[arg(short, long)]
        branch: Option<String>,

        /// JSON metadata stored with the session
        #[arg(short, long, value_name = "JSON")]
        metadata: Option<String>,
    },

    /// Show a session and its worktrees
    Show {
        #[arg(value_name = "SESSION")]
        session: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Move a session to a new status
    #[command(long_about = "Moves a session to a new status. Allowed moves:\n  \
        created -> active, error, cancelled\n  \
        active  -> completed, error, cancelled\n\
        completed, error, and cancelled are final.")]
    Status {
        #[arg(value_name = "SESSION")]
        session: String,

        #[arg(value_name = "STATUS")]
        status: SessionStatus,
    },

    /// Permanently delete a session and its worktree records
    Delete {
        #[arg(value_name = "SESSION")]
        session: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

pub fn run(args: Args, app: &App) -> Result<()> {
    match args.command {
        Some(SessionsCommand::List {
            project,
            status,
            format,
        }) => list_sessions(app, project.as_deref(), status, format),
        None => list_sessions(app, None, None, OutputFormat::Text),
        Some(SessionsCommand::Create {
            project,
            agent,
            worktree,
            branch,
            metadata,
        }) => create_session(app, &project, agent, worktree, branch, metadata),
        Some(SessionsCommand::Show { session, format }) => show_session(app, &session, format),
        Some(SessionsCommand::Status { session, status }) => set_status(app, &session, status),
        Some(SessionsCommand::Delete { session, force }) => delete_session(app, &session, force),
    }
}

fn list_sessions(
    app: &App,
    project: Option<&str>,
    status: Option<SessionStatus>,
    format: OutputFormat,
) -> Result<()> {
    let mut sessions = match project {
        Some(name) => {
            let project = find_project(app, name)?;
            app.sessions().list_by_project(&project.id)?
        }
        None => app.sessions().list()?,
    };
    if let Some(status) = status {
        sessions.retain(|s| s.status == status);
    }

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("{}", "No sessions found.".dimmed());
        println!();
        println!("Use 'mimir sessions create --project <name> --agent <type>' to start one.");
        return Ok(());
    }

    const AGENT_WIDTH: usize = 12;
    const BRANCH_WIDTH: usize = 24;

    println!(
        "{}",
        format!(
            "{:<8}  {:<16}  {:<10}  {:<AGENT_WIDTH$}  {}",
            "ID", "CREATED", "STATUS", "AGENT", "BRANCH"
        )
        .bold()
    );
    for session in &sessions {
        let branch = session.branch_name.as_deref().unwrap_or("-");
        println!(
            "{:<8}  {:<16}  {:<10}  {:<AGENT_WIDTH$}  {}",
            short_id(&session.id).cyan(),
            format_timestamp(&session.created_at).dimmed(),
            colored_status(session.status),
            truncate_to_width(&session.agent_type, AGENT_WIDTH),
            truncate_to_width(branch, BRANCH_WIDTH).yellow()
        );
    }

    Ok(())
}

fn create_session(
    app: &App,
    project: &str,
    agent: String,
    worktree: Option<String>,
    branch: Option<String>,
    metadata: Option<String>,
) -> Result<()> {
    let project = find_project(app, project)?;

    if let Some(ref metadata) = metadata {
        serde_json::from_str::<serde_json::Value>(metadata)
            .context("--metadata must be valid JSON")?;
    }

    let mut session = Session::new(project.id, agent);
    session.worktree_path = worktree;
    session.branch_name = branch;
    session.metadata = metadata;

    app.sessions()
        .create(&mut session)
        .context("Failed to create session")?;

    if let Some(ref path) = session.worktree_path {
        let branch = session.branch_name.clone().unwrap_or_default();
        let mut worktree = Worktree::new(session.id, path.clone(), branch);
        if let Err(e) = app.worktrees().create(&mut worktree) {
            app.sessions()
                .delete(&session.id)
                .context("Failed to record worktree, and the new session could not be removed")?;
            return Err(e).context("Failed to record worktree; the session was not created");
        }
    }

    println!(
        "{} session {} for {}",
        "Created".green(),
        session.id.to_string().cyan(),
        project.name.bold()
    );
    Ok(())
}

fn show_session(app: &App, prefix: &str, format: OutputFormat) -> Result<()> {
    let session = resolve_session(app, prefix)?;
    let project = app.projects().get(&session.project_id)?;
    let worktrees = app.worktrees().list_by_session(&session.id, true)?;

    if format == OutputFormat::Json {
        let value = serde_json::json!({
            "session": session,
            "project": project,
            "worktrees": worktrees,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let project_name = project
        .map(|p| p.name)
        .unwrap_or_else(|| format!("{} (removed)", short_id(&session.project_id)));

    println!("{} {}", "Session".bold(), session.id.to_string().cyan());
    println!("  {}  {}", "Project:".dimmed(), project_name);
    println!("  {}    {}", "Agent:".dimmed(), session.agent_type);
    println!("  {}   {}", "Status:".dimmed(), colored_status(session.status));
    if let Some(ref branch) = session.branch_name {
        println!("  {}   {}", "Branch:".dimmed(), branch.yellow());
    }
    if let Some(ref path) = session.worktree_path {
        println!("  {} {}", "Worktree:".dimmed(), path);
    }
    println!("  {}  {}", "Created:".dimmed(), format_timestamp(&session.created_at));
    println!("  {}  {}", "Updated:".dimmed(), format_timestamp(&session.updated_at));
    if let Some(ref metadata) = session.metadata {
        println!("  {} {}", "Metadata:".dimmed(), metadata);
    }

    let next = session.status.successors();
    if !next.is_empty() {
        let names: Vec<&str> = next.iter().map(|s| s.as_str()).collect();
        println!("  {}     {}", "Next:".dimmed(), names.join(", ").dimmed());
    }

    if !worktrees.is_empty() {
        println!();
        println!("{}", "Worktrees:".bold());
        for worktree in &worktrees {
            let state = if worktree.deleted_at.is_some() {
                worktree.status.dimmed()
            } else {
                worktree.status.green()
            };
            println!(
                "  {}  {:<8}  {}  {}",
                short_id(&worktree.id).cyan(),
                state,
                worktree.branch_name.yellow(),
                worktree.path
            );
        }
    }

    Ok(())
}

fn set_status(app: &App, prefix: &str, status: SessionStatus) -> Result<()> {
    let session = resolve_session(app, prefix)?;
    let previous = session.status;

    let updated = app.lifecycle().transition(&session.id, status)?;

    println!(
        "{} {} {} -> {}",
        "Session".bold(),
        short_id(&updated.id).cyan(),
        colored_status(previous),
        colored_status(updated.status)
    );
    Ok(())
}

fn delete_session(app: &App, prefix: &str, force: bool) -> Result<()> {
    let session = resolve_session(app, prefix)?;
    let session_short = short_id(&session.id);
    let worktrees = app.worktrees().list_by_session(&session.id, true)?;

    println!();
    println!("{} {}", "Session".bold(), session.id.to_string().cyan());
    println!("  {}   {}", "Agent:".dimmed(), session.agent_type);
    println!("  {}  {}", "Status:".dimmed(), colored_status(session.status));
    println!();
    println!(
        "{}",
        format!(
            "This will permanently delete the session and {} worktree record(s).",
            worktrees.len()
        )
        .yellow()
    );

    if !force {
        print!("Delete session {}? [y/N] ", session_short.cyan());
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("{}", "Cancelled".dimmed());
            return Ok(());
        }
    }

    app.sessions().delete(&session.id)?;

    println!("{} session {}", "Deleted".green(), session_short.cyan());
    Ok(())
}

/// Find the single session whose id starts with `prefix`.
pub fn resolve_session(app: &App, prefix: &str) -> Result<Session> {
    if let Ok(id) = Uuid::parse_str(prefix) {
        return match app.sessions().get(&id)? {
            Some(session) => Ok(session),
            None => bail!("No session with id {}", id),
        };
    }

    let needle = prefix.to_ascii_lowercase();
    let all_sessions = app.sessions().list()?;
    let mut matching: Vec<_> = all_sessions
        .into_iter()
        .filter(|s| s.id.to_string().starts_with(&needle))
        .collect();

    if matching.len() > 1 {
        println!("{}", "Multiple sessions match that prefix:".yellow());
        for s in &matching {
            println!(
                "  {} - {}",
                short_id(&s.id).cyan(),
                format_timestamp(&s.created_at)
            );
        }
        bail!(
            "Multiple sessions match '{}'. Please use a more specific prefix from the list above.",
            prefix
        );
    }

    matching.pop().ok_or_else(|| {
        anyhow!(
            "No session found matching '{}'. \
             Run 'mimir sessions list' to see available sessions.",
            prefix
        )
    })
}

fn colored_status(status: SessionStatus) -> colored::ColoredString {
    match status {
        SessionStatus::Created => status.as_str().normal(),
        SessionStatus::Active => status.as_str().green(),
        SessionStatus::Completed => status.as_str().blue(),
        SessionStatus::Error => status.as_str().red(),
        SessionStatus::Cancelled => status.as_str().dimmed(),
    }
}
