//! Wire record for one replicated item.
//!
//! A record is a CBOR map with text field names. The guid travels as text so
//! that a corrupt record is reported as [`CoreError::MalformedRecord`] instead
//! of failing deep inside serde. Content fields are optional and empty on a
//! tombstone.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::item::{ContentItem, HistoryEntry, SyncMetadata, MAX_HISTORY};

/// Serialized form of a [`ContentItem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub guid: String,
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub sync: Option<SyncRecord>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub posted: i64,
    #[serde(default)]
    pub modified: i64,
    #[serde(default)]
    pub expires: Option<i64>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub priority: i32,
}

/// The sync block of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub version: u64,
    pub modified: i64,
    pub by: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub conflict: bool,
}

impl ItemRecord {
    /// Encode to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| CoreError::EncodingError(e.to_string()))?;
        Ok(buf)
    }

    /// Decode from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
    }
}

impl From<&ContentItem> for ItemRecord {
    fn from(item: &ContentItem) -> Self {
        Self {
            guid: item.guid.to_string(),
            fingerprint: item.fingerprint.clone(),
            sync: item.sync.as_ref().map(|s| SyncRecord {
                version: s.version,
                modified: s.modified,
                by: s.by.clone(),
                history: s.history.iter().cloned().collect(),
                deleted: s.deleted,
                conflict: s.conflict,
            }),
            title: item.title.clone(),
            link: item.link.clone(),
            tags: item.tags.clone(),
            summary: item.summary.clone(),
            posted: item.posted,
            modified: item.modified,
            expires: item.expires,
            position: item.position.clone(),
            priority: item.priority,
        }
    }
}

impl TryFrom<ItemRecord> for ContentItem {
    type Error = CoreError;

    fn try_from(record: ItemRecord) -> Result<Self> {
        let guid = record
            .guid
            .parse()
            .map_err(|_| CoreError::MalformedRecord(format!("invalid guid: {:?}", record.guid)))?;

        let sync = match record.sync {
            Some(s) => {
                if s.version == 0 {
                    return Err(CoreError::MalformedRecord("version must start at 1".into()));
                }
                let mut history = s.history;
                history.truncate(MAX_HISTORY);
                Some(SyncMetadata {
                    version: s.version,
                    modified: s.modified,
                    by: s.by,
                    history: history.into(),
                    conflict: s.conflict,
                    deleted: s.deleted,
                })
            }
            None => None,
        };

        Ok(ContentItem {
            guid,
            fingerprint: record.fingerprint,
            title: record.title,
            link: record.link,
            tags: record.tags,
            summary: record.summary,
            position: record.position,
            priority: record.priority,
            posted: record.posted,
            modified: record.modified,
            expires: record.expires,
            sync,
        })
    }
}

impl ContentItem {
    /// Serialize to record bytes.
    pub fn to_record_bytes(&self) -> Result<Vec<u8>> {
        ItemRecord::from(self).to_bytes()
    }

    /// Parse from record bytes.
    pub fn from_record_bytes(bytes: &[u8]) -> Result<Self> {
        ItemRecord::from_bytes(bytes)?.try_into()
    }
}
