//! CLI commands for Mimir.
//!
//! Each submodule implements a single CLI command with its argument
//! parsing and execution logic.

/// Shell completion scripts.
pub mod completions;

/// Configuration viewing and validation.
pub mod config;

/// Database maintenance.
pub mod db;

/// Register and manage projects.
pub mod projects;

/// Create, inspect, and move sessions through their lifecycle.
pub mod sessions;

/// Show gateway status and recent sessions.
pub mod status;
