//! SQLite implementation of the Replica trait.
//!
//! This is the persistent backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via `tokio::task::spawn_blocking`. Items are stored as
//! CBOR records; a row that no longer decodes is logged and skipped rather
//! than failing the replica.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use hive_core::{now_millis, ContentItem, HiveId, ItemGuid};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::Replica;

/// SQLite-backed replica of one hive.
///
/// Several replicas (one per hive) may share a database file; rows are
/// keyed by hive id.
pub struct SqliteReplica {
    hive_id: HiveId,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteReplica {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file (and its parent directory) and runs migrations if
    /// needed.
    pub fn open(path: impl AsRef<Path>, hive_id: HiveId) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            hive_id,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory(hive_id: HiveId) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            hive_id,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection, &[u8; 16]) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        let hive = *self.hive_id.as_bytes();

        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&conn, &hive)
        })
        .await
        .map_err(|e| StoreError::Blocking(e.to_string()))?
    }
}

fn decode_row(guid: &str, record: &[u8]) -> Option<ContentItem> {
    match ContentItem::from_record_bytes(record) {
        Ok(item) => Some(item),
        Err(e) => {
            tracing::warn!(guid, error = %e, "skipping unreadable item record");
            None
        }
    }
}

#[async_trait]
impl Replica for SqliteReplica {
    fn hive_id(&self) -> HiveId {
        self.hive_id
    }

    async fn put_item(&self, item: &ContentItem) -> Result<()> {
        let guid = item.guid.to_string();
        let record = item.to_record_bytes()?;
        let version = item.version() as i64;
        let deleted = item.is_deleted();

        self.blocking(move |conn, hive| {
            conn.execute(
                "INSERT INTO items (hive_id, guid, record, version, deleted, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(hive_id, guid) DO UPDATE SET
                    record = excluded.record,
                    version = excluded.version,
                    deleted = excluded.deleted,
                    updated_at = excluded.updated_at",
                params![hive.as_slice(), guid, record, version, deleted, now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_item(&self, guid: &ItemGuid) -> Result<Option<ContentItem>> {
        let guid = guid.to_string();

        self.blocking(move |conn, hive| {
            let record: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT record FROM items WHERE hive_id = ?1 AND guid = ?2",
                    params![hive.as_slice(), guid],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(record.and_then(|r| decode_row(&guid, &r)))
        })
        .await
    }

    async fn list_items(&self) -> Result<Vec<ContentItem>> {
        self.blocking(|conn, hive| {
            let mut stmt =
                conn.prepare("SELECT guid, record FROM items WHERE hive_id = ?1 ORDER BY guid")?;
            let rows = stmt.query_map(params![hive.as_slice()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?;

            let mut items = Vec::new();
            for row in rows {
                let (guid, record) = row?;
                if let Some(item) = decode_row(&guid, &record) {
                    items.push(item);
                }
            }
            Ok(items)
        })
        .await
    }

    async fn item_count(&self) -> Result<usize> {
        self.blocking(|conn, hive| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM items WHERE hive_id = ?1",
                params![hive.as_slice()],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }

    async fn fetch_item_record(&self, guid: &ItemGuid) -> Result<Option<Vec<u8>>> {
        let guid = guid.to_string();

        self.blocking(move |conn, hive| {
            let record: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT record FROM items WHERE hive_id = ?1 AND guid = ?2",
                    params![hive.as_slice(), guid],
                    |row| row.get(0),
                )
                .optional()?;
            // Only hand out records that will decode on the other side.
            Ok(record.filter(|r| decode_row(&guid, r).is_some()))
        })
        .await
    }
}
