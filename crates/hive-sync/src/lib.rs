//! # Hive Sync
//!
//! Sync protocol for converging the replicas of a hive.
//!
//! ## Overview
//!
//! The sync module implements anti-entropy between two replicas across a
//! store-and-forward relay overlay. Replicas are summarized by a digest
//! (sorted `guid:fingerprint` keys and a root hash); sessions compare roots
//! first and only exchange keys and items when they differ.
//!
//! ## Key Properties
//!
//! - **Cheap when equal**: matching roots end a session with no item fetch
//! - **Idempotent**: re-merging an item already held changes nothing
//! - **Path-routed**: replies and pushed items follow the explicit return
//!   path of the request, never a broadcast
//! - **Tolerant**: unknown hives and sessions, oversized packets and
//!   unreadable items are dropped, not raised
//!
//! ## Packet Flow
//!
//! ```text
//! Initiator A                              Responder B
//!   |-------- SyncRequest(root, keys) ------->|
//!   |<------- Item (x delta) -----------------|
//!   |<------- SyncResponse(root, keys, guids)-|
//!   |-------- Item (x counter-delta) -------->|
//! ```
//!
//! With [`ProbeMode::RootOnly`] the first request carries no keys; the
//! responder answers with its keys, the initiator pushes its counter-delta
//! and re-sends the request with the full digest.

pub mod convergence;
pub mod error;
pub mod messages;
pub mod protocol;
pub mod queue;
pub mod transport;

pub use convergence::{compare_digests, verify_convergence, ConvergenceResult};
pub use error::{Result, SyncError};
pub use messages::{
    limits, FeedRef, HivePayload, MemberRef, NodeId, Packet, PacketKind, SessionId, SyncEnvelope,
    PROTOCOL_VERSION,
};
pub use protocol::{
    compare_root, diff_digest, push_delta, respond, InitiatorSession, InitiatorState, ProbeMode,
    PushReport, ResponderReport, SessionState, SyncConfig, SyncSession,
};
pub use queue::{PacketQueue, PacketSender};
pub use transport::{
    memory::Delivery, memory::MemoryNetwork, memory::MemoryTransport, return_path, Transport,
};
