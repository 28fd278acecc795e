//! Output formatting utilities for CLI commands.
//!
//! Provides a unified `OutputFormat` enum and small helpers shared by the
//! listing commands.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use uuid::Uuid;

/// Output format options for CLI commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output (default).
    #[default]
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// First eight characters of an id, as shown in tables.
pub fn short_id(id: &Uuid) -> String {
    id.to_string()[..8].to_string()
}

pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}

/// Truncates a string to fit within a maximum width.
///
/// If the string is longer than `max_width`, it is truncated and "..." is
/// appended, so the result is at most `max_width` characters.
pub fn truncate_to_width(s: &str, max_width: usize) -> String {
    let len = s.chars().count();
    if len <= max_width {
        s.to_string()
    } else if max_width <= 3 {
        ".".repeat(max_width)
    } else {
        format!("{}...", s.chars().take(max_width - 3).collect::<String>())
    }
}
