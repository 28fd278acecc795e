//! Status command - show the database and recent session activity.

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;

use crate::app::App;
use crate::cli::format::short_id;
use crate::storage::SessionStatus;

const RECENT_LIMIT: usize = 5;

/// Executes the status command.
pub fn run(app: &App) -> Result<()> {
    println!("{}", "Mimir".bold().cyan());
    println!("{}", "Agent session gateway".dimmed());
    println!();

    let store = app.store();
    let counts = store.counts()?;

    println!("{}", "Database:".bold());
    println!("  Path:      {}", store.path().display());
    println!("  Projects:  {}", counts.projects);
    println!("  Sessions:  {}", counts.sessions);
    println!("  Worktrees: {}", counts.worktrees);

    if counts.projects == 0 {
        println!();
        println!(
            "{}",
            "Hint: Run 'mimir projects add <path>' to register a project".yellow()
        );
        // Sessions outlive their project, so there may still be some to show.
        if counts.sessions == 0 {
            return Ok(());
        }
    }

    let sessions = app.sessions().list()?;
    let active = sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Active)
        .count();
    println!("  Active:    {}", active.to_string().green());

    if sessions.is_empty() {
        return Ok(());
    }

    let projects = app.projects();
    println!();
    println!("{}", "Recent sessions:".bold());
    for session in sessions.iter().take(RECENT_LIMIT) {
        let project = projects
            .get(&session.project_id)?
            .map(|p| p.name)
            .unwrap_or_else(|| "(removed)".to_string());

        println!(
            "  {}  {:12}  {:10}  {:12}  {}",
            short_id(&session.id).cyan(),
            format_ago(session.created_at).dimmed(),
            session.status.to_string().yellow(),
            session.agent_type,
            project
        );
    }

    Ok(())
}

fn format_ago(time: chrono::DateTime<Utc>) -> String {
    let hours = Utc::now().signed_duration_since(time).num_hours();
    match hours {
        h if h < 1 => "just now".to_string(),
        1 => "1 hour ago".to_string(),
        h if h < 24 => format!("{h} hours ago"),
        h if h < 48 => "1 day ago".to_string(),
        h => format!("{} days ago", h / 24),
    }
}
