//! Replica trait: the abstract interface for one peer's copy of a hive.
//!
//! The sync engine is storage-agnostic. Implementations include SQLite
//! (persistent) and in-memory (for tests).

use async_trait::async_trait;
use hive_core::{build_digest, ContentItem, Digest, HiveId, ItemGuid};

use crate::error::{Result, StoreError};

/// Result of merging an incoming item into a replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The incoming item was newer and replaced (or created) the local copy.
    Applied,
    /// The local copy was at least as new; nothing changed.
    Stale,
    /// Lineages diverged. The retained copy is flagged as conflicted.
    Conflict {
        /// Whether the incoming item was the one retained.
        applied: bool,
    },
}

impl MergeOutcome {
    /// Check if the incoming item was stored.
    pub fn is_applied(&self) -> bool {
        matches!(self, MergeOutcome::Applied | MergeOutcome::Conflict { applied: true })
    }

    /// Check if a conflict was detected.
    pub fn is_conflict(&self) -> bool {
        matches!(self, MergeOutcome::Conflict { .. })
    }
}

/// The Replica trait: async interface for item persistence.
///
/// # Design Notes
///
/// - **Items are never erased**: deletion is a tombstone written with
///   [`Replica::put_item`].
/// - **Corruption is contained**: a stored item that cannot be decoded is
///   skipped by listing and reported as absent by lookups; it never fails
///   the whole replica.
/// - **Single writer**: implementations guard their state with a lock so a
///   replica shared across tasks still serializes mutation and digesting.
#[async_trait]
pub trait Replica: Send + Sync {
    /// The hive this replica belongs to.
    fn hive_id(&self) -> HiveId;

    /// Insert or replace an item.
    async fn put_item(&self, item: &ContentItem) -> Result<()>;

    /// Get an item by guid.
    async fn get_item(&self, guid: &ItemGuid) -> Result<Option<ContentItem>>;

    /// All readable items, tombstones included.
    async fn list_items(&self) -> Result<Vec<ContentItem>>;

    /// Number of stored items, tombstones included.
    async fn item_count(&self) -> Result<usize>;

    /// Serialized record of an item, or `None` if it can no longer be found
    /// or read.
    async fn fetch_item_record(&self, guid: &ItemGuid) -> Result<Option<Vec<u8>>>;
}

/// Extension trait for the replication operations built on [`Replica`].
pub trait ReplicaExt: Replica {
    /// Compute the content digest of the replica. Side-effect free.
    fn build_digest(&self) -> impl std::future::Future<Output = Result<Digest>> + Send;

    /// Merge an incoming item, storing it only if it is newer.
    fn merge_item(
        &self,
        incoming: ContentItem,
    ) -> impl std::future::Future<Output = Result<MergeOutcome>> + Send;

    /// Decode a serialized record and merge it.
    fn merge_item_record(
        &self,
        record: &[u8],
    ) -> impl std::future::Future<Output = Result<MergeOutcome>> + Send;

    /// Turn an existing item into a tombstone made by `by`.
    fn tombstone_item(
        &self,
        guid: &ItemGuid,
        by: &str,
        now: i64,
    ) -> impl std::future::Future<Output = Result<ContentItem>> + Send;
}

impl<R: Replica + ?Sized> ReplicaExt for R {
    async fn build_digest(&self) -> Result<Digest> {
        let items = self.list_items().await?;
        Ok(build_digest(&items))
    }

    async fn merge_item(&self, incoming: ContentItem) -> Result<MergeOutcome> {
        let local = self.get_item(&incoming.guid).await?;
        let decision = incoming.merge_decision(local.as_ref());

        if decision.apply {
            let mut incoming = incoming;
            // A corrupt fingerprint from the wire is not carried forward.
            incoming.refresh_fingerprint();
            if decision.conflict {
                incoming.mark_conflict();
            }
            self.put_item(&incoming).await?;
            tracing::debug!(guid = %incoming.guid, version = incoming.version(), "applied incoming item");
        } else if decision.conflict {
            if let Some(mut local) = local {
                if !local.sync.as_ref().is_some_and(|s| s.conflict) {
                    local.mark_conflict();
                    self.put_item(&local).await?;
                }
            }
        }

        Ok(match (decision.apply, decision.conflict) {
            (applied, true) => MergeOutcome::Conflict { applied },
            (true, false) => MergeOutcome::Applied,
            (false, false) => MergeOutcome::Stale,
        })
    }

    async fn merge_item_record(&self, record: &[u8]) -> Result<MergeOutcome> {
        let incoming = ContentItem::from_record_bytes(record)?;
        self.merge_item(incoming).await
    }

    async fn tombstone_item(&self, guid: &ItemGuid, by: &str, now: i64) -> Result<ContentItem> {
        let mut item = self
            .get_item(guid)
            .await?
            .ok_or_else(|| StoreError::NotFound(guid.to_string()))?;
        item.set_deleted(by, now);
        self.put_item(&item).await?;
        Ok(item)
    }
}
