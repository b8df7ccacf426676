//! Error types for hive core.

use thiserror::Error;

/// Errors raised while encoding or decoding item records.
///
/// Version conflicts are not errors; see [`crate::MergeDecision`].
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
