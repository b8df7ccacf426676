//! In-memory implementation of the Replica trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use hive_core::{ContentItem, HiveId, ItemGuid};

use crate::error::{Result, StoreError};
use crate::traits::Replica;

/// In-memory replica.
///
/// All data is lost when the replica is dropped. Thread-safe via RwLock.
pub struct MemoryReplica {
    hive_id: HiveId,
    items: RwLock<BTreeMap<ItemGuid, ContentItem>>,
    /// Number of `fetch_item_record` calls served.
    fetches: AtomicUsize,
}

impl MemoryReplica {
    /// Create a new empty replica of the given hive.
    pub fn new(hive_id: HiveId) -> Self {
        Self {
            hive_id,
            items: RwLock::new(BTreeMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Create a replica pre-populated with items.
    pub fn with_items(hive_id: HiveId, items: impl IntoIterator<Item = ContentItem>) -> Self {
        let replica = Self::new(hive_id);
        if let Ok(mut map) = replica.items.write() {
            map.extend(items.into_iter().map(|item| (item.guid, item)));
        }
        replica
    }

    /// How many item records have been fetched from this replica.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<ItemGuid, ContentItem>>> {
        self.items
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<ItemGuid, ContentItem>>> {
        self.items
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

#[async_trait]
impl Replica for MemoryReplica {
    fn hive_id(&self) -> HiveId {
        self.hive_id
    }

    async fn put_item(&self, item: &ContentItem) -> Result<()> {
        self.write()?.insert(item.guid, item.clone());
        Ok(())
    }

    async fn get_item(&self, guid: &ItemGuid) -> Result<Option<ContentItem>> {
        Ok(self.read()?.get(guid).cloned())
    }

    async fn list_items(&self) -> Result<Vec<ContentItem>> {
        Ok(self.read()?.values().cloned().collect())
    }

    async fn item_count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    async fn fetch_item_record(&self, guid: &ItemGuid) -> Result<Option<Vec<u8>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let item = self.read()?.get(guid).cloned();
        match item {
            Some(item) => match item.to_record_bytes() {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) => {
                    tracing::warn!(%guid, error = %e, "skipping unencodable item");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }
}
