//! Error types for docgraph.
//!
//! Library crates use [`DocGraphError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all docgraph operations.
#[derive(Debug, thiserror::Error)]
pub enum DocGraphError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Bundle or payload parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Graph store error (connection, query, or transaction).
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad document id, unknown kind, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A unit of work ran past its time budget.
    #[error("timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocGraphError>;

impl DocGraphError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a storage error from any displayable message.
    pub fn storage(msg: impl std::fmt::Display) -> Self {
        Self::Storage(msg.to_string())
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a timeout error for a budget of `after`.
    pub fn timeout(after: std::time::Duration) -> Self {
        Self::Timeout {
            after_ms: after.as_millis() as u64,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
