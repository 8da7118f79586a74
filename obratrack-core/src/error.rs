//! Error types for obratrack-core

use thiserror::Error;

/// Main error type for the obratrack-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error (store unavailable, bad query, corrupt row)
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Level (obra, building, floor, task) not found
    #[error("level not found: {0}")]
    LevelNotFound(i64),

    /// Imported levels whose parent is neither imported nor stored
    #[error("levels with unresolvable parent: {}", format_ids(.0))]
    UnresolvedParents(Vec<i64>),

    /// Malformed report date input
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// Report generation exceeded its time budget
    #[error("report generation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl Error {
    /// Whether the caller, not the server, is at fault.
    ///
    /// HTTP layers map these to 4xx responses.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::LevelNotFound(_) | Error::InvalidDate(_) | Error::UnresolvedParents(_)
        )
    }
}

fn format_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for obratrack-core
pub type Result<T> = std::result::Result<T, Error>;
