//! Core data models for Mimir
//!
//! Records are plain values: the store is the only identity, and every
//! read materializes a fresh copy.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A registered project that agent sessions run against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier. A nil id is replaced on create.
    pub id: Uuid,

    /// Human-readable name, unique across all projects
    pub name: String,

    /// Filesystem path of the project checkout
    pub path: String,

    /// Port of the agent service bound to this project
    pub agent_port: u16,

    /// Detected project language, if known
    pub project_type: Option<ProjectType>,

    /// When the project was registered. The epoch means "unset".
    pub created_at: DateTime<Utc>,

    /// When the project was last written
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Builds an unsaved project; id and timestamps are assigned on create.
    pub fn new(name: impl Into<String>, path: impl Into<String>, agent_port: u16) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            agent_port,
            ..Self::default()
        }
    }
}

/// The language tag of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Go,
    Python,
    TypeScript,
    Rust,
    Unknown,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::Go => "go",
            ProjectType::Python => "python",
            ProjectType::TypeScript => "typescript",
            ProjectType::Rust => "rust",
            ProjectType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectType {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // "golang" is the tag older databases were written with
            "go" | "golang" => Ok(ProjectType::Go),
            "python" => Ok(ProjectType::Python),
            "typescript" => Ok(ProjectType::TypeScript),
            "rust" => Ok(ProjectType::Rust),
            "unknown" => Ok(ProjectType::Unknown),
            other => Err(ParseTagError {
                kind: "project type",
                value: other.to_string(),
            }),
        }
    }
}

/// An agent session running inside a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier. A nil id is replaced on create.
    pub id: Uuid,

    /// Owning project
    pub project_id: Uuid,

    /// Which agent drives the session (e.g., "coder", "reviewer")
    pub agent_type: String,

    /// Worktree checked out for this session, if any
    pub worktree_path: Option<String>,

    /// Branch the session works on, if any
    pub branch_name: Option<String>,

    /// Current lifecycle state
    pub status: SessionStatus,

    /// Opaque caller-defined blob, stored verbatim
    pub metadata: Option<String>,

    /// When the session was created. The epoch means "unset".
    pub created_at: DateTime<Utc>,

    /// When the session was last written
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Builds an unsaved session in the `created` state.
    pub fn new(project_id: Uuid, agent_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::nil(),
            project_id,
            agent_type: agent_type.into(),
            worktree_path: None,
            branch_name: None,
            status: SessionStatus::Created,
            metadata: None,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
        }
    }
}

/// The lifecycle state of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Registered but not yet running. The only initial state.
    #[default]
    Created,
    /// An agent is working on it.
    Active,
    /// Finished successfully.
    Completed,
    /// Stopped on a failure.
    Error,
    /// Stopped by the user.
    Cancelled,
}

impl SessionStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [SessionStatus; 5] = [
        SessionStatus::Created,
        SessionStatus::Active,
        SessionStatus::Completed,
        SessionStatus::Error,
        SessionStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Created => "created",
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Error => "error",
            SessionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SessionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseTagError {
                kind: "session status",
                value: s.to_string(),
            })
    }
}

/// A git worktree checked out for a session.
///
/// Worktrees are removed by the store when their session is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worktree {
    pub id: Uuid,
    pub session_id: Uuid,
    pub path: String,
    pub branch_name: String,
    /// Free-form state label; the schema defaults it to "active"
    pub status: String,
    pub created_at: DateTime<Utc>,
    /// Soft-delete marker
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Worktree {
    pub fn new(session_id: Uuid, path: impl Into<String>, branch_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::nil(),
            session_id,
            path: path.into(),
            branch_name: branch_name.into(),
            status: WORKTREE_ACTIVE.to_string(),
            created_at: DateTime::<Utc>::default(),
            deleted_at: None,
        }
    }
}

/// Worktree status for live checkouts.
pub const WORKTREE_ACTIVE: &str = "active";

/// Worktree status once soft-deleted.
pub const WORKTREE_DELETED: &str = "deleted";

/// A stored tag that is not part of its closed value set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind}: '{value}'")]
pub struct ParseTagError {
    kind: &'static str,
    value: String,
}

impl ToSql for ProjectType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ProjectType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for SessionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SessionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_status_round_trips_through_strings() {
        for status in SessionStatus::ALL {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_session_status_rejects_unknown_values() {
        let err = "paused".parse::<SessionStatus>().unwrap_err();
        assert!(err.to_string().contains("paused"));
        assert!(err.to_string().contains("session status"));
    }

    #[test]
    fn test_project_type_accepts_legacy_golang_tag() {
        assert_eq!("golang".parse::<ProjectType>().unwrap(), ProjectType::Go);
        assert_eq!(ProjectType::Go.to_string(), "go");
    }

    #[test]
    fn test_new_session_starts_created() {
        let session = Session::new(Uuid::new_v4(), "coder");
        assert_eq!(session.status, SessionStatus::Created);
        assert!(session.id.is_nil());
        assert_eq!(session.created_at, DateTime::<Utc>::default());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&SessionStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }
}
