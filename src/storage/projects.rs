//! Project repository

use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use super::db::{creation_stamp, now, timestamp_column, uuid_column, Store};
use super::error::{StoreError, StoreResult};
use super::models::Project;

const PROJECT_COLUMNS: &str =
    "id, name, path, opencode_port, project_type, created_at, updated_at";

/// CRUD over projects. Borrows the store; never closes it.
#[derive(Debug, Clone, Copy)]
pub struct ProjectRepository<'a> {
    store: &'a Store,
}

impl<'a> ProjectRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Insert a new project.
    ///
    /// Fills in a fresh id when it is nil and `created_at` when it is unset,
    /// and always stamps `updated_at`. A duplicate name fails with
    /// [`StoreError::Constraint`] and leaves nothing behind.
    pub fn create(&self, project: &mut Project) -> StoreResult<()> {
        validate(project)?;

        let stamp = now();
        if project.id.is_nil() {
            project.id = Uuid::new_v4();
        }
        project.created_at = creation_stamp(project.created_at, stamp);
        project.updated_at = stamp;

        self.store.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO projects (id, name, path, opencode_port, project_type, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    project.id.to_string(),
                    project.name,
                    project.path,
                    project.agent_port,
                    project.project_type,
                    project.created_at.timestamp(),
                    project.updated_at.timestamp(),
                ],
            )
        })?;

        debug!(id = %project.id, name = %project.name, "Created project");
        Ok(())
    }

    /// Get a project by ID
    pub fn get(&self, id: &Uuid) -> StoreResult<Option<Project>> {
        self.store.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
                params![id.to_string()],
                Self::row_to_project,
            )
            .optional()
        })
    }

    /// Get a project by its unique name
    pub fn get_by_name(&self, name: &str) -> StoreResult<Option<Project>> {
        self.store.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE name = ?1"),
                params![name],
                Self::row_to_project,
            )
            .optional()
        })
    }

    /// List all projects, newest first
    pub fn list(&self) -> StoreResult<Vec<Project>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map([], Self::row_to_project)?;
            rows.collect()
        })
    }

    /// Overwrite name, path, port, and type, keyed by id.
    ///
    /// Returns the number of rows changed; zero means no such project.
    pub fn update(&self, project: &Project) -> StoreResult<usize> {
        validate(project)?;

        let changed = self.store.with_conn(|conn| {
            conn.execute(
                r#"
                UPDATE projects
                SET name = ?1, path = ?2, opencode_port = ?3, project_type = ?4, updated_at = ?5
                WHERE id = ?6
                "#,
                params![
                    project.name,
                    project.path,
                    project.agent_port,
                    project.project_type,
                    now().timestamp(),
                    project.id.to_string(),
                ],
            )
        })?;

        debug!(id = %project.id, changed, "Updated project");
        Ok(changed)
    }

    /// Delete a project. Its sessions are left in place.
    ///
    /// Returns the number of rows removed; zero means no such project.
    pub fn delete(&self, id: &Uuid) -> StoreResult<usize> {
        let removed = self.store.with_conn(|conn| {
            conn.execute("DELETE FROM projects WHERE id = ?1", params![id.to_string()])
        })?;

        debug!(%id, removed, "Deleted project");
        Ok(removed)
    }

    fn row_to_project(row: &Row<'_>) -> rusqlite::Result<Project> {
        Ok(Project {
            id: uuid_column(row, 0)?,
            name: row.get(1)?,
            path: row.get(2)?,
            agent_port: row.get(3)?,
            project_type: row.get(4)?,
            created_at: timestamp_column(row, 5)?,
            updated_at: timestamp_column(row, 6)?,
        })
    }
}

fn validate(project: &Project) -> StoreResult<()> {
    if project.name.trim().is_empty() {
        return Err(StoreError::Invalid("project name must not be empty".to_string()));
    }
    if project.path.is_empty() {
        return Err(StoreError::Invalid("project path must not be empty".to_string()));
    }
    Ok(())
}
