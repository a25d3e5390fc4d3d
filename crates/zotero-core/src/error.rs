//! Error types for the Zotero search library.
//!
//! Errors are grouped into a small taxonomy (see [`ErrorKind`]) so callers can
//! tell a missing SQLite capability apart from bad input, a transient store
//! failure, or a failed teardown of a transient search structure.

use std::path::PathBuf;
use thiserror::Error;

use crate::cancel::{CancelReason, CancelledError};
use crate::index::IndexState;

/// Main error type for the Zotero search library.
#[derive(Debug, Error)]
pub enum ZoteroError {
    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("SQLite capability missing: {message}")]
    Capability { message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Database file not found: {0}")]
    DatabaseNotFound(PathBuf),

    // Input errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Unknown {kind} name: {name}")]
    UnknownName { kind: &'static str, name: String },

    // Transient index lifecycle errors
    #[error("Ephemeral index {index} cannot {operation} while {state:?}")]
    InvalidState {
        index: String,
        operation: &'static str,
        state: IndexState,
    },

    #[error("Failed to drop ephemeral index {index}: {source}")]
    CleanupFailed {
        index: String,
        #[source]
        source: Box<ZoteroError>,
    },

    #[error("{primary} (cleanup also failed: {cleanup})")]
    WithCleanupFailure {
        #[source]
        primary: Box<ZoteroError>,
        cleanup: Box<ZoteroError>,
    },

    #[error("Search cancelled: {0}")]
    Cancelled(CancelReason),

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for Zotero search operations.
pub type Result<T> = std::result::Result<T, ZoteroError>;

/// Coarse classification of a [`ZoteroError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The store lacks FTS5 or temporary table support. Not retryable.
    Capability,
    /// Rejected before any statement was issued.
    InvalidInput,
    /// Failure reported by the store while a statement ran.
    Transient,
    /// A transient search structure could not be removed.
    Cleanup,
    /// The caller's token fired.
    Cancelled,
    /// Misuse of an internal API, or anything else.
    Internal,
}

impl From<std::io::Error> for ZoteroError {
    fn from(err: std::io::Error) -> Self {
        ZoteroError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ZoteroError {
    fn from(err: serde_json::Error) -> Self {
        ZoteroError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for ZoteroError {
    fn from(err: rusqlite::Error) -> Self {
        if sqlite_code(&err) == Some(rusqlite::ErrorCode::OperationInterrupted) {
            return ZoteroError::Cancelled(CancelReason::Interrupted);
        }
        ZoteroError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<CancelledError> for ZoteroError {
    fn from(err: CancelledError) -> Self {
        ZoteroError::Cancelled(err.reason)
    }
}

fn sqlite_code(err: &rusqlite::Error) -> Option<rusqlite::ErrorCode> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => Some(e.code),
        _ => None,
    }
}

impl ZoteroError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ZoteroError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ZoteroError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Error for a connection mutex poisoned by a panicking caller.
    pub(crate) fn lock_poisoned() -> Self {
        ZoteroError::Database {
            message: "Failed to acquire connection lock".to_string(),
            source: None,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ZoteroError::Capability { .. } => ErrorKind::Capability,
            ZoteroError::Validation { .. } | ZoteroError::UnknownName { .. } => {
                ErrorKind::InvalidInput
            }
            ZoteroError::Database { .. } | ZoteroError::Io { .. } => ErrorKind::Transient,
            ZoteroError::CleanupFailed { .. } => ErrorKind::Cleanup,
            ZoteroError::Cancelled(_) => ErrorKind::Cancelled,
            ZoteroError::WithCleanupFailure { primary, .. } => primary.kind(),
            ZoteroError::DatabaseNotFound(_)
            | ZoteroError::Config { .. }
            | ZoteroError::Json { .. }
            | ZoteroError::InvalidState { .. } => ErrorKind::Internal,
        }
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ZoteroError::Database {
                source: Some(err), ..
            } => matches!(
                sqlite_code(err),
                Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
            ),
            _ => false,
        }
    }

    /// Check if this error means the connection can no longer be trusted.
    ///
    /// A cleanup-only failure is tolerated unless this holds.
    pub fn is_session_fatal(&self) -> bool {
        match self {
            ZoteroError::Database { source: None, .. } => true,
            ZoteroError::Database {
                source: Some(err), ..
            } => matches!(
                sqlite_code(err),
                Some(
                    rusqlite::ErrorCode::DatabaseCorrupt
                        | rusqlite::ErrorCode::NotADatabase
                        | rusqlite::ErrorCode::SystemIoFailure
                        | rusqlite::ErrorCode::OutOfMemory
                )
            ),
            ZoteroError::CleanupFailed { source, .. } => source.is_session_fatal(),
            ZoteroError::WithCleanupFailure { primary, cleanup } => {
                primary.is_session_fatal() || cleanup.is_session_fatal()
            }
            _ => false,
        }
    }

    /// Attach a cleanup failure to a primary failure without hiding it.
    pub(crate) fn with_cleanup(self, cleanup: ZoteroError) -> Self {
        ZoteroError::WithCleanupFailure {
            primary: Box::new(self),
            cleanup: Box::new(cleanup),
        }
    }
}
