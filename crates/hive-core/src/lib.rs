//! # Hive Core
//!
//! Pure primitives for hive replication: hash trees, content digests, and
//! per-item version metadata.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over replicated items.
//!
//! ## Key Types
//!
//! - [`ContentItem`] - One replicated post, with its [`SyncMetadata`]
//! - [`Digest`] - Sorted `guid:fingerprint` keys plus a single root hash
//! - [`TreeNode`] - Leaf or internal node of the hash tree
//! - [`ItemRecord`] - Wire form of an item
//!
//! ## Digests
//!
//! A replica's digest is order-independent: items are keyed by guid and
//! version fingerprint, the keys sorted ordinally, then hashed bottom-up.
//! Missing or corrupt fingerprints are replaced by the anchor,
//! `blake3("")`. See [`digest`] and [`tree`].

pub mod canonical;
pub mod crypto;
pub mod digest;
pub mod error;
pub mod item;
pub mod record;
pub mod tree;
pub mod types;

pub use canonical::{canonical_version_bytes, version_fingerprint};
pub use crypto::{Blake3Hash, ANCHOR_HEX};
pub use digest::{build_digest, digest_key, parse_digest_key, Digest, KEY_SEPARATOR};
pub use error::{CoreError, Result};
pub use item::{ContentItem, HistoryEntry, MergeDecision, SyncMetadata, MAX_HISTORY};
pub use record::{ItemRecord, SyncRecord};
pub use tree::{build_tree, leaf_hash, root_hash, TreeNode};
pub use types::{now_millis, HiveId, ItemGuid};
