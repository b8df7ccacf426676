//! # Hive
//!
//! The unified API for hive content sync: shared collections of posts
//! replicated between peers over a store-and-forward relay overlay.
//!
//! ## Overview
//!
//! - **Items**: Posts with sync metadata (version, editor, bounded history)
//! - **Replicas**: One peer's copy of a hive, in memory or SQLite
//! - **Digests**: Sorted `guid:fingerprint` keys folded into a hash tree
//! - **Sessions**: Root comparison, delta push and counter-push between peers
//!
//! ## Key Concepts
//!
//! - **Fingerprint**: Hash of an item's version metadata. Changes whenever
//!   the item gets a new version.
//! - **Tombstone**: A deleted item. Content is cleared but the guid stays so
//!   deletions replicate.
//! - **Conflict**: Two copies that advanced independently from a common
//!   version. One wins, the retained copy is flagged.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hive::{Hub, HubConfig};
//! use hive::core::{now_millis, ContentItem, HiveId, ItemGuid};
//! use hive::store::SqliteReplica;
//! use hive::sync::{MemoryNetwork, NodeId, PacketQueue};
//!
//! async fn example() {
//!     let network = MemoryNetwork::new();
//!     let (inbox, queue) = PacketQueue::new();
//!     let transport = network.connect(NodeId::random(), inbox).await;
//!
//!     let mut hub = Hub::new(transport, queue, HubConfig::default());
//!     let hive = hub.add_replica(SqliteReplica::open("hive.db", HiveId::new()).unwrap());
//!
//!     let post = ContentItem::new(ItemGuid::new(), "hello", "alice", now_millis());
//!     hub.post_item(&hive, post).await.unwrap();
//!
//!     // Reconcile with a peer two hops away, then handle its answer.
//!     // hub.start_session(&hive, vec![relay, peer]).await.unwrap();
//!     hub.tick().await;
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `hive::core` - Items, digests and the hash tree
//! - `hive::store` - Replica storage, memory and SQLite
//! - `hive::sync` - Sync protocol, packets and transport

pub mod error;
pub mod events;
pub mod hub;

// Re-export component crates
pub use hive_core as core;
pub use hive_store as store;
pub use hive_sync as sync;

// Re-export main types for convenience
pub use error::{HubError, Result};
pub use events::{HiveEvent, SessionRole};
pub use hub::{Hub, HubConfig, TickReport};

// Re-export commonly used types
pub use hive_core::{Blake3Hash, ContentItem, Digest, HiveId, ItemGuid};
pub use hive_store::{MemoryReplica, MergeOutcome, Replica, ReplicaExt, SqliteReplica};
pub use hive_sync::{HivePayload, NodeId, ProbeMode, SessionId, SyncConfig};
