//! Application context.
//!
//! [`App`] is built once at startup from a loaded [`Config`] and passed to
//! whatever needs storage. It owns the shared store; repositories are
//! handed out as short-lived borrows.

use anyhow::{bail, Context, Result};
use std::sync::Arc;

use crate::config::{Config, DB_KEY_ENV};
use crate::storage::{
    ProjectRepository, SessionLifecycle, SessionRepository, Store, WorktreeRepository,
};

/// Shared dependencies for the CLI and any embedding process.
#[derive(Debug, Clone)]
pub struct App {
    config: Arc<Config>,
    store: Arc<Store>,
}

impl App {
    /// Open and migrate the configured database.
    pub fn new(config: Config) -> Result<Self> {
        let key = match config.database.encryption_key.as_ref() {
            Some(key) => key.expose().to_string(),
            None => bail!(
                "No database encryption key configured.\n\n\
                Set database.encryption_key in the config file or export {DB_KEY_ENV}."
            ),
        };

        let store = Store::open_with(
            &config.database.path,
            &key,
            config.database.store_options(),
        )
        .context("Failed to open the Mimir database")?;
        store.migrate().context("Failed to migrate the Mimir database")?;

        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(store),
        })
    }

    /// Build from an already opened store (used by tests and embedders).
    pub fn with_store(config: Config, store: Store) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn projects(&self) -> ProjectRepository<'_> {
        ProjectRepository::new(&self.store)
    }

    pub fn sessions(&self) -> SessionRepository<'_> {
        SessionRepository::new(&self.store)
    }

    pub fn worktrees(&self) -> WorktreeRepository<'_> {
        WorktreeRepository::new(&self.store)
    }

    pub fn lifecycle(&self) -> SessionLifecycle<'_> {
        SessionLifecycle::new(&self.store)
    }

    /// Close the database if this is the last handle to it.
    pub fn shutdown(self) -> Result<()> {
        match Arc::try_unwrap(self.store) {
            Ok(store) => store.close().context("Failed to close the Mimir database"),
            Err(_) => {
                tracing::debug!("Store still shared; leaving it open");
                Ok(())
            }
        }
    }
}
