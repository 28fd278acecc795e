//! Encrypted SQLite store for Mimir

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use std::path::{Path, PathBuf};
use parking_lot::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::{StoreError, StoreResult};

/// Schema version written to `PRAGMA user_version` after migrating.
pub const SCHEMA_VERSION: i64 = 1;

/// Default database location, before `~` expansion.
pub const DEFAULT_DB_PATH: &str = "~/.mimir/mimir.db";

/// Timeouts applied to a store connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// How long SQLite waits on a file lock held by another connection
    pub busy_timeout: Duration,
    /// How long a caller waits for the in-process connection lock
    pub lock_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(5000),
            lock_timeout: Duration::from_millis(5000),
        }
    }
}

/// Row counts for each table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreCounts {
    pub projects: i64,
    pub sessions: i64,
    pub worktrees: i64,
}

/// Expand a leading `~` to the current user's home directory.
pub fn expand_home(path: &Path) -> StoreResult<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = dirs::home_dir().ok_or_else(|| {
                StoreError::connection(path, "Could not find home directory")
            })?;
            Ok(if rest.as_os_str().is_empty() {
                home
            } else {
                home.join(rest)
            })
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}

/// The encrypted database connection.
///
/// All access goes through [`Store::with_conn`], which hands the connection
/// to one caller at a time. Share a store across threads with `Arc<Store>`;
/// repositories borrow it and never close it.
pub struct Store {
    conn: Mutex<Connection>,
    path: PathBuf,
    options: StoreOptions,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Open or create the database with default timeouts.
    pub fn open(path: impl AsRef<Path>, key: &str) -> StoreResult<Self> {
        Self::open_with(path, key, StoreOptions::default())
    }

    /// Open or create the database.
    ///
    /// The key is applied before any other statement, then checked by
    /// reading the schema; a wrong key fails here rather than on first use.
    pub fn open_with(path: impl AsRef<Path>, key: &str, options: StoreOptions) -> StoreResult<Self> {
        let path = expand_home(path.as_ref())?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::connection(&path, e))?;
            }
        }

        let conn = Connection::open(&path).map_err(|e| StoreError::connection(&path, e))?;
        let store = Self::configure(conn, path, key, options)?;
        info!(path = %store.path.display(), "Opened database");
        Ok(store)
    }

    /// Open a private in-memory database (for tests).
    pub fn open_in_memory(key: &str) -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::connection(":memory:", e))?;
        Self::configure(conn, PathBuf::from(":memory:"), key, StoreOptions::default())
    }

    fn configure(
        conn: Connection,
        path: PathBuf,
        key: &str,
        options: StoreOptions,
    ) -> StoreResult<Self> {
        if key.is_empty() {
            return Err(StoreError::connection(path, "Encryption key must not be empty"));
        }

        let setup = || -> rusqlite::Result<()> {
            conn.pragma_update(None, "key", key)?;
            conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
                row.get::<_, i64>(0)
            })?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            conn.busy_timeout(options.busy_timeout)?;
            Ok(())
        };
        setup().map_err(|e| StoreError::connection(&path, e))?;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
            options,
        })
    }

    /// Create tables and indexes if they are missing.
    ///
    /// Safe to run on every startup; existing rows are never touched.
    pub fn migrate(&self) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                agent_type TEXT NOT NULL,
                worktree_path TEXT,
                branch_name TEXT,
                status TEXT NOT NULL DEFAULT 'created',
                metadata TEXT,
                created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
                updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            );

            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                path TEXT NOT NULL CHECK (path <> ''),
                opencode_port INTEGER NOT NULL,
                project_type TEXT,
                created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
                updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            );

            CREATE TABLE IF NOT EXISTS worktrees (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                path TEXT NOT NULL,
                branch_name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
                deleted_at INTEGER,
                FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
            );

            -- Sessions must name an existing project, but deleting the project
            -- leaves them in place, so this is a write-time check, not a foreign key.
            CREATE TRIGGER IF NOT EXISTS sessions_project_exists_insert
            BEFORE INSERT ON sessions
            WHEN NOT EXISTS (SELECT 1 FROM projects WHERE id = NEW.project_id)
            BEGIN
                SELECT RAISE(ABORT, 'FOREIGN KEY constraint failed: unknown project');
            END;

            CREATE TRIGGER IF NOT EXISTS sessions_project_exists_update
            BEFORE UPDATE OF project_id ON sessions
            WHEN NOT EXISTS (SELECT 1 FROM projects WHERE id = NEW.project_id)
            BEGIN
                SELECT RAISE(ABORT, 'FOREIGN KEY constraint failed: unknown project');
            END;

            CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);
            CREATE INDEX IF NOT EXISTS idx_worktrees_session ON worktrees(session_id);
            "#,
        )
        .map_err(StoreError::Schema)?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(StoreError::Schema)?;

        info!(version = SCHEMA_VERSION, "Database schema is up to date");
        Ok(())
    }

    /// The schema version recorded in the database (0 before migrating).
    pub fn schema_version(&self) -> StoreResult<i64> {
        self.with_conn(|conn| conn.pragma_query_value(None, "user_version", |row| row.get(0)))
    }

    /// Run `f` with exclusive use of the connection.
    ///
    /// Waits at most `lock_timeout` for other callers to finish, then fails
    /// with [`StoreError::Busy`]. Engine errors are classified into
    /// [`StoreError`] variants.
    pub fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.lock()?;
        f(&conn).map_err(StoreError::from)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .try_lock_for(self.options.lock_timeout)
            .ok_or_else(|| {
                debug!(timeout = ?self.options.lock_timeout, "Connection lock timed out");
                StoreError::Busy
            })
    }

    /// Path of the database file (`:memory:` for in-memory stores).
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Count rows in every table.
    pub fn counts(&self) -> StoreResult<StoreCounts> {
        self.with_conn(|conn| {
            let count = |table: &str| -> rusqlite::Result<i64> {
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            };
            Ok(StoreCounts {
                projects: count("projects")?,
                sessions: count("sessions")?,
                worktrees: count("worktrees")?,
            })
        })
    }

    /// Close the connection. The store cannot be used afterwards.
    pub fn close(self) -> StoreResult<()> {
        let conn = self.conn.into_inner();
        conn.close()
            .map_err(|(_, e)| StoreError::connection(&self.path, e))?;
        info!(path = %self.path.display(), "Closed database");
        Ok(())
    }
}

// ==================== Row helpers ====================

pub(crate) fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let secs: i64 = row.get(idx)?;
    DateTime::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs))
}

pub(crate) fn optional_timestamp_column(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(idx)? {
        Some(secs) => DateTime::from_timestamp(secs, 0)
            .map(Some)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs)),
        None => Ok(None),
    }
}

/// Drop sub-second precision, which the schema does not store.
pub(crate) fn truncate_to_secs(time: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or(time)
}

/// The `created_at` to store: `stamp` when unset (the epoch), otherwise
/// the caller's value at second precision.
pub(crate) fn creation_stamp(created_at: DateTime<Utc>, stamp: DateTime<Utc>) -> DateTime<Utc> {
    if created_at == DateTime::<Utc>::default() {
        stamp
    } else {
        truncate_to_secs(created_at)
    }
}

/// Current time at the precision the schema stores.
pub(crate) fn now() -> DateTime<Utc> {
    truncate_to_secs(Utc::now())
}
