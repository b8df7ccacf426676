//! Error types for the sync module.

use thiserror::Error;

use crate::messages::SessionId;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Protocol version mismatch with peer.
    #[error("protocol version mismatch: local={local}, peer={peer}")]
    VersionMismatch { local: u8, peer: u8 },

    /// Packet could not be encoded, decoded or routed.
    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    /// Transport-level error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Replica operation failed.
    #[error("store error: {0}")]
    StoreError(#[from] hive_store::StoreError),

    /// Packet names a session that is not active.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// A session step was invoked out of order.
    #[error("session step out of order: {0}")]
    OutOfOrder(&'static str),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
