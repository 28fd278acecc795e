//! Mimir - persistence for an agent session gateway
//!
//! Mimir keeps track of registered projects and the agent sessions that run
//! inside them, in an encrypted SQLite database. The [`storage`] module owns
//! the schema and repositories; [`app::App`] wires a loaded [`config::Config`]
//! to an open store for the CLI or any embedding process.

pub mod app;
pub mod cli;
pub mod config;
pub mod storage;
