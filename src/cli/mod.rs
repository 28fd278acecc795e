//! Command-line interface for Mimir.
//!
//! Provides the CLI commands for managing registered projects and agent
//! sessions in the Mimir database.

/// Individual CLI command implementations.
pub mod commands;

/// Output formatting helpers.
pub mod format;

pub use format::OutputFormat;
