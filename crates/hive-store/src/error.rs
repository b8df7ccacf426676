//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during replica storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Item record could not be encoded or decoded.
    #[error("record error: {0}")]
    Record(#[from] hive_core::CoreError),

    /// Item not found.
    #[error("item not found: {0}")]
    NotFound(String),

    /// A lock guarding replica state was poisoned.
    #[error("lock poisoned: {0}")]
    Poisoned(String),

    /// A blocking storage task failed to complete.
    #[error("blocking task failed: {0}")]
    Blocking(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
