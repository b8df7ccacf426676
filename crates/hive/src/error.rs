//! Error types for the Hub.

use hive_core::{HiveId, ItemGuid};
use hive_store::StoreError;
use hive_sync::SyncError;
use thiserror::Error;

/// Errors that can occur during Hub operations.
#[derive(Debug, Error)]
pub enum HubError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// No replica is registered for the hive.
    #[error("unknown hive: {0}")]
    UnknownHive(HiveId),

    /// Item not found in the hive.
    #[error("item not found: {0}")]
    ItemNotFound(ItemGuid),

    /// An item with this guid is already posted.
    #[error("item already exists: {0}")]
    ItemExists(ItemGuid),
}

/// Result type for Hub operations.
pub type Result<T> = std::result::Result<T, HubError>;
