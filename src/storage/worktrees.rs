//! Worktree repository

use rusqlite::{params, Row};
use tracing::debug;
use uuid::Uuid;

use super::db::{creation_stamp, now, optional_timestamp_column, timestamp_column, uuid_column, Store};
use super::error::{StoreError, StoreResult};
use super::models::{Worktree, WORKTREE_DELETED};

const WORKTREE_COLUMNS: &str = "id, session_id, path, branch_name, status, created_at, deleted_at";

/// Access to session worktrees. Borrows the store; never closes it.
///
/// Deleting a session removes its worktrees through the schema's cascade,
/// so there is no hard delete here.
#[derive(Debug, Clone, Copy)]
pub struct WorktreeRepository<'a> {
    store: &'a Store,
}

impl<'a> WorktreeRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Insert a worktree for an existing session.
    pub fn create(&self, worktree: &mut Worktree) -> StoreResult<()> {
        if worktree.path.trim().is_empty() {
            return Err(StoreError::Invalid("worktree path must not be empty".to_string()));
        }
        if worktree.id.is_nil() {
            worktree.id = Uuid::new_v4();
        }
        worktree.created_at = creation_stamp(worktree.created_at, now());

        self.store.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO worktrees (id, session_id, path, branch_name, status, created_at, deleted_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    worktree.id.to_string(),
                    worktree.session_id.to_string(),
                    worktree.path,
                    worktree.branch_name,
                    worktree.status,
                    worktree.created_at.timestamp(),
                    worktree.deleted_at.map(|t| t.timestamp()),
                ],
            )
        })?;

        debug!(id = %worktree.id, session_id = %worktree.session_id, "Created worktree");
        Ok(())
    }

    /// Worktrees of a session, newest first.
    pub fn list_by_session(&self, session_id: &Uuid, include_deleted: bool) -> StoreResult<Vec<Worktree>> {
        let filter = if include_deleted {
            ""
        } else {
            "AND deleted_at IS NULL"
        };
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WORKTREE_COLUMNS} FROM worktrees WHERE session_id = ?1 {filter} ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(params![session_id.to_string()], Self::row_to_worktree)?;
            rows.collect()
        })
    }

    /// Soft-delete a worktree. Returns the number of rows changed.
    pub fn mark_deleted(&self, id: &Uuid) -> StoreResult<usize> {
        let changed = self.store.with_conn(|conn| {
            conn.execute(
                "UPDATE worktrees SET status = ?1, deleted_at = ?2 WHERE id = ?3 AND deleted_at IS NULL",
                params![WORKTREE_DELETED, now().timestamp(), id.to_string()],
            )
        })?;

        debug!(%id, changed, "Marked worktree deleted");
        Ok(changed)
    }

    fn row_to_worktree(row: &Row<'_>) -> rusqlite::Result<Worktree> {
        Ok(Worktree {
            id: uuid_column(row, 0)?,
            session_id: uuid_column(row, 1)?,
            path: row.get(2)?,
            branch_name: row.get(3)?,
            status: row.get(4)?,
            created_at: timestamp_column(row, 5)?,
            deleted_at: optional_timestamp_column(row, 6)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::error::StoreError;
    use crate::storage::models::{Project, Session, WORKTREE_ACTIVE};
    use crate::storage::projects::ProjectRepository;
    use crate::storage::sessions::SessionRepository;

    fn create_test_store() -> Store {
        let store = Store::open_in_memory("test-key").expect("Failed to open test store");
        store.migrate().expect("Failed to migrate");
        store
    }

    fn create_test_session(store: &Store) -> Session {
        let mut project = Project::new("demo", "/tmp/demo", 4096);
        ProjectRepository::new(store).create(&mut project).unwrap();
        let mut session = Session::new(project.id, "coder");
        SessionRepository::new(store).create(&mut session).unwrap();
        session
    }

    #[test]
    fn test_create_and_list_worktrees() {
        let store = create_test_store();
        let session = create_test_session(&store);
        let repo = WorktreeRepository::new(&store);

        let mut worktree = Worktree::new(session.id, "/tmp/demo-wt", "feature/x");
        repo.create(&mut worktree).expect("Failed to create worktree");

        let listed = repo.list_by_session(&session.id, false).unwrap();
        assert_eq!(listed, vec![worktree]);
        assert_eq!(listed[0].status, WORKTREE_ACTIVE);
    }

    #[test]
    fn test_worktree_requires_session() {
        let store = create_test_store();
        let repo = WorktreeRepository::new(&store);

        let mut worktree = Worktree::new(Uuid::new_v4(), "/tmp/orphan", "main");
        let err = repo.create(&mut worktree).unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)), "got {err:?}");
    }

    #[test]
    fn test_empty_path_is_rejected() {
        let store = create_test_store();
        let session = create_test_session(&store);
        let repo = WorktreeRepository::new(&store);

        let mut worktree = Worktree::new(session.id, "  ", "main");
        let err = repo.create(&mut worktree).unwrap_err();

        assert!(matches!(err, StoreError::Invalid(_)), "got {err:?}");
        assert!(repo.list_by_session(&session.id, true).unwrap().is_empty());
    }

    #[test]
    fn test_mark_deleted_hides_worktree() {
        let store = create_test_store();
        let session = create_test_session(&store);
        let repo = WorktreeRepository::new(&store);

        let mut worktree = Worktree::new(session.id, "/tmp/demo-wt", "feature/x");
        repo.create(&mut worktree).unwrap();

        assert_eq!(repo.mark_deleted(&worktree.id).unwrap(), 1);
        assert_eq!(repo.mark_deleted(&worktree.id).unwrap(), 0, "Already deleted");

        assert!(repo.list_by_session(&session.id, false).unwrap().is_empty());
        let all = repo.list_by_session(&session.id, true).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, WORKTREE_DELETED);
        assert!(all[0].deleted_at.is_some());
    }
}
