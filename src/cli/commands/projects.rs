//! Projects command - register and manage projects.
//!
//! Projects are keyed by a unique name. Registering a path derives the
//! name from the directory and guesses the project type from marker files.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::app::App;
use crate::cli::format::{format_timestamp, short_id, truncate_to_width};
use crate::cli::OutputFormat;
use crate::storage::{Project, ProjectType};

/// Default agent-service port for new projects.
pub const DEFAULT_AGENT_PORT: u16 = 4096;

/// Arguments for the projects command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    mimir projects list                     List registered projects\n    \
    mimir projects add .                    Register the current directory\n    \
    mimir projects add ~/src/api --port 4100 --type rust\n    \
    mimir projects show api                 Show one project and its sessions\n    \
    mimir projects remove api               Unregister a project")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<ProjectsCommand>,
}

#[derive(Subcommand)]
pub enum ProjectsCommand {
    /// List registered projects
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Register a new project
    Add {
        /// Project directory
        #[arg(value_name = "PATH")]
        path: String,

        /// Project name (defaults to the directory name)
        #[arg(short, long)]
        name: Option<String>,

        /// Agent-service port for this project
        #[arg(short, long, default_value_t = DEFAULT_AGENT_PORT)]
        port: u16,

        /// Project type: go, python, typescript, rust, unknown (detected if omitted)
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        project_type: Option<ProjectType>,
    },

    /// Show a project and its sessions
    Show {
        #[arg(value_name = "NAME")]
        name: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Change a project's name, path, port, or type
    Update {
        #[arg(value_name = "NAME")]
        name: String,

        #[arg(long, value_name = "NAME")]
        rename: Option<String>,

        #[arg(long, value_name = "PATH")]
        path: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,

        #[arg(short = 't', long = "type", value_name = "TYPE")]
        project_type: Option<ProjectType>,
    },

    /// Unregister a project (its sessions are kept)
    Remove {
        #[arg(value_name = "NAME")]
        name: String,
    },
}

pub fn run(args: Args, app: &App) -> Result<()> {
    match args.command {
        Some(ProjectsCommand::List { format }) => list_projects(app, format),
        None => list_projects(app, OutputFormat::Text),
        Some(ProjectsCommand::Add {
            path,
            name,
            port,
            project_type,
        }) => add_project(app, &path, name, port, project_type),
        Some(ProjectsCommand::Show { name, format }) => show_project(app, &name, format),
        Some(ProjectsCommand::Update {
            name,
            rename,
            path,
            port,
            project_type,
        }) => update_project(app, &name, rename, path, port, project_type),
        Some(ProjectsCommand::Remove { name }) => remove_project(app, &name),
    }
}

fn list_projects(app: &App, format: OutputFormat) -> Result<()> {
    let projects = app.projects().list()?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&projects)?);
        return Ok(());
    }

    if projects.is_empty() {
        println!("{}", "No projects registered.".dimmed());
        println!();
        println!("Use 'mimir projects add <path>' to register a project.");
        return Ok(());
    }

    const NAME_WIDTH: usize = 20;
    const TYPE_WIDTH: usize = 10;

    println!(
        "{}",
        format!(
            "{:<8}  {:<NAME_WIDTH$}  {:<TYPE_WIDTH$}  {:>5}  {}",
            "ID", "NAME", "TYPE", "PORT", "PATH"
        )
        .bold()
    );
    for project in &projects {
        let kind = project
            .project_type
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8}  {:<NAME_WIDTH$}  {:<TYPE_WIDTH$}  {:>5}  {}",
            short_id(&project.id).cyan(),
            truncate_to_width(&project.name, NAME_WIDTH),
            kind.yellow(),
            project.agent_port,
            project.path.dimmed()
        );
    }

    Ok(())
}

fn add_project(
    app: &App,
    path: &str,
    name: Option<String>,
    port: u16,
    project_type: Option<ProjectType>,
) -> Result<()> {
    let path = resolve_project_path(path)?;
    let name = match name {
        Some(name) => name,
        None => default_project_name(&path)?,
    };

    if app.projects().get_by_name(&name)?.is_some() {
        bail!(
            "A project named '{}' is already registered. Use --name to pick another.",
            name
        );
    }

    let mut project = Project::new(name, path.to_string_lossy(), port);
    project.project_type = project_type.or_else(|| Some(detect_project_type(&path)));

    app.projects()
        .create(&mut project)
        .context("Failed to register project")?;

    println!(
        "{} project {} ({})",
        "Registered".green(),
        project.name.bold(),
        short_id(&project.id).cyan()
    );
    println!("  {}  {}", "Path:".dimmed(), project.path);
    println!("  {}  {}", "Port:".dimmed(), project.agent_port);
    if let Some(kind) = project.project_type {
        println!("  {}  {}", "Type:".dimmed(), kind);
    }

    Ok(())
}

fn show_project(app: &App, name: &str, format: OutputFormat) -> Result<()> {
    let project = find_project(app, name)?;
    let sessions = app.sessions().list_by_project(&project.id)?;

    if format == OutputFormat::Json {
        let value = serde_json::json!({
            "project": project,
            "sessions": sessions,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{} {}", "Project".bold(), project.name.cyan());
    println!("  {}       {}", "ID:".dimmed(), project.id);
    println!("  {}     {}", "Path:".dimmed(), project.path);
    println!("  {}     {}", "Port:".dimmed(), project.agent_port);
    println!(
        "  {}     {}",
        "Type:".dimmed(),
        project
            .project_type
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("  {}  {}", "Created:".dimmed(), format_timestamp(&project.created_at));
    println!("  {}  {}", "Updated:".dimmed(), format_timestamp(&project.updated_at));
    println!();

    if sessions.is_empty() {
        println!("{}", "No sessions for this project.".dimmed());
    } else {
        println!("{}", format!("Sessions ({}):", sessions.len()).bold());
        for session in &sessions {
            println!(
                "  {}  {:<10}  {:<12}  {}",
                short_id(&session.id).cyan(),
                session.status.to_string().yellow(),
                session.agent_type,
                format_timestamp(&session.created_at).dimmed()
            );
        }
    }

    Ok(())
}

fn update_project(
    app: &App,
    name: &str,
    rename: Option<String>,
    path: Option<String>,
    port: Option<u16>,
    project_type: Option<ProjectType>,
) -> Result<()> {
    let mut project = find_project(app, name)?;

    if let Some(rename) = rename {
        project.name = rename;
    }
    if let Some(path) = path {
        project.path = resolve_project_path(&path)?.to_string_lossy().to_string();
    }
    if let Some(port) = port {
        project.agent_port = port;
    }
    if project_type.is_some() {
        project.project_type = project_type;
    }

    app.projects()
        .update(&project)
        .context("Failed to update project")?;

    println!("{} project {}", "Updated".green(), project.name.bold());
    Ok(())
}

fn remove_project(app: &App, name: &str) -> Result<()> {
    let project = find_project(app, name)?;
    let session_count = app.sessions().list_by_project(&project.id)?.len();

    app.projects().delete(&project.id)?;

    println!("{} project {}", "Removed".green(), project.name.bold());
    if session_count > 0 {
        println!(
            "{}",
            format!("{session_count} session(s) still reference this project and were kept.")
                .dimmed()
        );
    }
    Ok(())
}

/// Look up a project by name, failing with a hint when absent.
pub fn find_project(app: &App, name: &str) -> Result<Project> {
    match app.projects().get_by_name(name)? {
        Some(project) => Ok(project),
        None => bail!(
            "No project named '{}'. Run 'mimir projects list' to see registered projects.",
            name
        ),
    }
}

/// Resolve a user-supplied project path to an absolute path.
fn resolve_project_path(path: &str) -> Result<PathBuf> {
    let expanded = crate::storage::db::expand_home(Path::new(path))?;
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()?.join(expanded)
    };
    // Keep the path as typed when it does not exist yet
    Ok(absolute.canonicalize().unwrap_or(absolute))
}

fn default_project_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .with_context(|| format!("Cannot derive a project name from {}", path.display()))
}

/// Guess the project type from well-known marker files.
pub fn detect_project_type(path: &Path) -> ProjectType {
    const MARKERS: &[(&str, ProjectType)] = &[
        ("Cargo.toml", ProjectType::Rust),
        ("go.mod", ProjectType::Go),
        ("tsconfig.json", ProjectType::TypeScript),
        ("package.json", ProjectType::TypeScript),
        ("pyproject.toml", ProjectType::Python),
        ("setup.py", ProjectType::Python),
        ("requirements.txt", ProjectType::Python),
    ];

    MARKERS
        .iter()
        .find(|(marker, _)| path.join(marker).exists())
        .map(|(_, kind)| *kind)
        .unwrap_or(ProjectType::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_detect_project_type() {
        let dir = tempdir().unwrap();
        assert_eq!(detect_project_type(dir.path()), ProjectType::Unknown);

        std::fs::write(dir.path().join("go.mod"), "module demo\n").unwrap();
        assert_eq!(detect_project_type(dir.path()), ProjectType::Go);

        std::fs::write(dir.path().join("Cargo.toml"), "[package]\n").unwrap();
        assert_eq!(detect_project_type(dir.path()), ProjectType::Rust);
    }

    #[test]
    fn test_default_project_name() {
        assert_eq!(
            default_project_name(Path::new("/home/user/src/api")).unwrap(),
            "api"
        );
        assert!(default_project_name(Path::new("/")).is_err());
    }

    #[test]
    fn test_resolve_project_path_makes_absolute() {
        let resolved = resolve_project_path("some/relative/dir").unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("some/relative/dir"));
    }
}
