//! # Hive Store
//!
//! Storage abstraction for hive replicas. Provides a trait-based interface
//! for item persistence with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! Each [`Replica`] holds one peer's copy of one hive. The sync engine only
//! talks to the trait; [`ReplicaExt`] layers digesting and merging on top
//! of the raw storage operations.
//!
//! ## Key Types
//!
//! - [`Replica`] - The async trait for item storage
//! - [`ReplicaExt`] - Digest, merge and tombstone operations
//! - [`SqliteReplica`] - SQLite-based persistent storage
//! - [`MemoryReplica`] - In-memory storage for tests
//! - [`MergeOutcome`] - Result of merging an incoming item
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hive_core::{now_millis, ContentItem, HiveId, ItemGuid};
//! use hive_store::{Replica, ReplicaExt, SqliteReplica};
//!
//! async fn example() -> hive_store::Result<()> {
//!     let replica = SqliteReplica::open("hive.db", HiveId::new())?;
//!
//!     let post = ContentItem::new(ItemGuid::new(), "hello", "alice", now_millis());
//!     replica.put_item(&post).await?;
//!
//!     let digest = replica.build_digest().await?;
//!     println!("root {}", digest.root_hash);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryReplica;
pub use sqlite::SqliteReplica;
pub use traits::{MergeOutcome, Replica, ReplicaExt};
