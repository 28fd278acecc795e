//! Session repository

use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use super::db::{creation_stamp, now, timestamp_column, uuid_column, Store};
use super::error::{StoreError, StoreResult};
use super::models::{Session, SessionStatus};

const SESSION_COLUMNS: &str = "id, project_id, agent_type, worktree_path, branch_name, status, metadata, created_at, updated_at";

/// CRUD and status updates over sessions. Borrows the store; never closes it.
#[derive(Debug, Clone, Copy)]
pub struct SessionRepository<'a> {
    store: &'a Store,
}

impl<'a> SessionRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Insert a new session.
    ///
    /// Id and timestamps are defaulted like projects; the status is stored as
    /// given. A `project_id` naming no project fails with
    /// [`StoreError::Constraint`].
    pub fn create(&self, session: &mut Session) -> StoreResult<()> {
        if session.agent_type.trim().is_empty() {
            return Err(StoreError::Invalid("agent type must not be empty".to_string()));
        }

        let stamp = now();
        if session.id.is_nil() {
            session.id = Uuid::new_v4();
        }
        session.created_at = creation_stamp(session.created_at, stamp);
        session.updated_at = stamp;

        self.store.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO sessions (id, project_id, agent_type, worktree_path, branch_name, status, metadata, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    session.id.to_string(),
                    session.project_id.to_string(),
                    session.agent_type,
                    session.worktree_path,
                    session.branch_name,
                    session.status,
                    session.metadata,
                    session.created_at.timestamp(),
                    session.updated_at.timestamp(),
                ],
            )
        })?;

        debug!(id = %session.id, project_id = %session.project_id, "Created session");
        Ok(())
    }

    /// Get a session by ID
    pub fn get(&self, id: &Uuid) -> StoreResult<Option<Session>> {
        self.store.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                params![id.to_string()],
                Self::row_to_session,
            )
            .optional()
        })
    }

    /// List all sessions, newest first
    pub fn list(&self) -> StoreResult<Vec<Session>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map([], Self::row_to_session)?;
            rows.collect()
        })
    }

    /// List the sessions of one project, newest first
    pub fn list_by_project(&self, project_id: &Uuid) -> StoreResult<Vec<Session>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE project_id = ?1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(params![project_id.to_string()], Self::row_to_session)?;
            rows.collect()
        })
    }

    /// Set the status and stamp `updated_at`; nothing else changes.
    ///
    /// No transition rules are applied here. Use
    /// [`SessionLifecycle`](super::lifecycle::SessionLifecycle) for that.
    /// Returns the number of rows changed.
    pub fn update_status(&self, id: &Uuid, status: SessionStatus) -> StoreResult<usize> {
        let changed = self.store.with_conn(|conn| {
            conn.execute(
                "UPDATE sessions SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status, now().timestamp(), id.to_string()],
            )
        })?;

        debug!(%id, %status, changed, "Updated session status");
        Ok(changed)
    }

    /// Delete a session. The store drops its worktrees.
    ///
    /// Returns the number of sessions removed.
    pub fn delete(&self, id: &Uuid) -> StoreResult<usize> {
        let removed = self.store.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", params![id.to_string()])
        })?;

        debug!(%id, removed, "Deleted session");
        Ok(removed)
    }

    fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
        Ok(Session {
            id: uuid_column(row, 0)?,
            project_id: uuid_column(row, 1)?,
            agent_type: row.get(2)?,
            worktree_path: row.get(3)?,
            branch_name: row.get(4)?,
            status: row.get(5)?,
            metadata: row.get(6)?,
            created_at: timestamp_column(row, 7)?,
            updated_at: timestamp_column(row, 8)?,
        })
    }
}
