//! Storage layer for Mimir
//!
//! One encrypted SQLite [`Store`] owns the connection. The repositories
//! borrow it and each call runs as a single autocommit statement.

pub mod db;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod projects;
pub mod sessions;
pub mod worktrees;

pub use db::{Store, StoreCounts, StoreOptions};
pub use error::{StoreError, StoreResult};
pub use lifecycle::SessionLifecycle;
pub use models::*;
pub use projects::ProjectRepository;
pub use sessions::SessionRepository;
pub use worktrees::WorktreeRepository;
