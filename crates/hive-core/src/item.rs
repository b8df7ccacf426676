//! Content items and their version metadata.
//!
//! A [`ContentItem`] is one replicated post. Its [`SyncMetadata`] tracks the
//! version lineage used to decide, when two replicas disagree, which copy
//! should win. Items are never erased: deletion leaves a tombstone that
//! keeps the guid and bumps the version so the deletion itself replicates.

use std::cmp::Ordering;
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::canonical::version_fingerprint;
use crate::crypto::Blake3Hash;
use crate::types::ItemGuid;

/// Maximum number of prior versions remembered per item.
pub const MAX_HISTORY: usize = 10;

/// One prior version: when it was made and by whom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub when: i64,
    pub by: String,
}

/// Version record attached 1:1 to a content item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncMetadata {
    /// Monotonic version number, starting at 1.
    pub version: u64,
    /// Time of the last version bump (Unix ms).
    pub modified: i64,
    /// Identity of the last editor.
    pub by: String,
    /// Prior versions, most recent first, at most [`MAX_HISTORY`] long.
    pub history: VecDeque<HistoryEntry>,
    /// Set when a merge found independently advanced lineages.
    pub conflict: bool,
    /// Tombstone flag.
    pub deleted: bool,
}

impl SyncMetadata {
    /// Metadata for a freshly created item.
    pub fn new(by: impl Into<String>, now: i64) -> Self {
        Self {
            version: 1,
            modified: now,
            by: by.into(),
            history: VecDeque::new(),
            conflict: false,
            deleted: false,
        }
    }

    /// Bump the version, pushing the previous `(modified, by)` onto history.
    pub fn add_version(&mut self, by: &str, now: i64) {
        self.history.push_front(HistoryEntry {
            when: self.modified,
            by: std::mem::replace(&mut self.by, by.to_string()),
        });
        self.history.truncate(MAX_HISTORY);
        self.version += 1;
        self.modified = now;
    }

    /// Whether this record takes precedence over `rival`.
    ///
    /// Higher version wins. Equal versions fall back to the later `modified`,
    /// then to the lexicographically smaller `by`. Identical metadata is
    /// never a winner.
    pub fn is_winner(&self, rival: &SyncMetadata) -> bool {
        match self.version.cmp(&rival.version) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => match self.modified.cmp(&rival.modified) {
                Ordering::Greater => true,
                Ordering::Less => false,
                Ordering::Equal => self.by < rival.by,
            },
        }
    }

    /// Whether the two records advanced independently of each other.
    ///
    /// The higher version must carry the lower version's `(modified, by)` in
    /// its history; equal versions must agree exactly. Evicted history is
    /// treated as shared ancestry.
    pub fn is_conflict(&self, rival: &SyncMetadata) -> bool {
        match self.version.cmp(&rival.version) {
            Ordering::Equal => self.modified != rival.modified || self.by != rival.by,
            Ordering::Greater => !self.descends_from(rival),
            Ordering::Less => !rival.descends_from(self),
        }
    }

    /// History entry recorded for `version`, if still retained.
    pub fn entry_for_version(&self, version: u64) -> Option<&HistoryEntry> {
        if version >= self.version {
            return None;
        }
        let index = (self.version - version - 1) as usize;
        self.history.get(index)
    }

    fn descends_from(&self, older: &SyncMetadata) -> bool {
        match self.entry_for_version(older.version) {
            Some(entry) => entry.when == older.modified && entry.by == older.by,
            None => true,
        }
    }
}

/// Outcome of comparing an incoming item against the local copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeDecision {
    /// Replace the local copy with the incoming one.
    pub apply: bool,
    /// Lineages diverged; whichever copy is kept gets flagged.
    pub conflict: bool,
}

/// One replicated unit (a post).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub guid: ItemGuid,
    /// Hex fingerprint of the version state as carried on the wire.
    pub fingerprint: Option<String>,
    pub title: String,
    pub link: Option<String>,
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub position: Option<String>,
    pub priority: i32,
    pub posted: i64,
    pub modified: i64,
    pub expires: Option<i64>,
    pub sync: Option<SyncMetadata>,
}

impl ContentItem {
    /// Create a new item at version 1.
    pub fn new(guid: ItemGuid, title: impl Into<String>, by: impl Into<String>, now: i64) -> Self {
        let mut item = Self {
            guid,
            fingerprint: None,
            title: title.into(),
            link: None,
            tags: Vec::new(),
            summary: None,
            position: None,
            priority: 0,
            posted: now,
            modified: now,
            expires: None,
            sync: Some(SyncMetadata::new(by, now)),
        };
        item.refresh_fingerprint();
        item
    }

    /// Set the link.
    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Set the tags.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the summary.
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Set the position.
    pub fn position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }

    /// Set the priority.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the expiry time.
    pub fn expires(mut self, expires: i64) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Record a new version made by `by` at `now`.
    ///
    /// An item without sync metadata starts its lineage at version 1.
    pub fn add_version(&mut self, by: &str, now: i64) {
        match self.sync.as_mut() {
            Some(sync) => sync.add_version(by, now),
            None => self.sync = Some(SyncMetadata::new(by, now)),
        }
        self.modified = now;
        self.refresh_fingerprint();
    }

    /// Turn this item into a tombstone.
    ///
    /// Optional content is cleared, the version is bumped and the item is
    /// flagged deleted. The guid and title are retained.
    pub fn set_deleted(&mut self, by: &str, now: i64) {
        self.link = None;
        self.tags.clear();
        self.summary = None;
        self.position = None;
        self.add_version(by, now);
        if let Some(sync) = self.sync.as_mut() {
            sync.deleted = true;
        }
    }

    /// Check if this item is a tombstone.
    pub fn is_deleted(&self) -> bool {
        self.sync.as_ref().is_some_and(|s| s.deleted)
    }

    /// Current version, or 0 without sync metadata.
    pub fn version(&self) -> u64 {
        self.sync.as_ref().map_or(0, |s| s.version)
    }

    /// Recompute the fingerprint from the current sync metadata.
    pub fn refresh_fingerprint(&mut self) {
        self.fingerprint = self.compute_fingerprint().map(|h| h.to_hex());
    }

    /// Fingerprint derived from `(guid, version, modified, by)`.
    pub fn compute_fingerprint(&self) -> Option<Blake3Hash> {
        self.sync
            .as_ref()
            .map(|s| version_fingerprint(&self.guid, s.version, s.modified, &s.by))
    }

    /// The stored fingerprint, if present and decodable.
    pub fn fingerprint_hash(&self) -> Option<Blake3Hash> {
        self.fingerprint
            .as_deref()
            .and_then(|f| Blake3Hash::from_hex(f).ok())
    }

    /// Fingerprint used in digests: the stored value or the anchor.
    pub fn digest_fingerprint(&self) -> Blake3Hash {
        self.fingerprint_hash().unwrap_or_else(Blake3Hash::anchor)
    }

    /// Whether this item should replace `rival`.
    ///
    /// No rival means this item is authoritative. When both carry sync
    /// metadata an unambiguous precedence decides; anything else falls back
    /// to the later `modified` timestamp. Equal timestamps are settled by
    /// [`SyncMetadata::is_winner`], or by the smaller fingerprint when either
    /// side lacks metadata, so two distinct copies never both lose.
    pub fn is_newer(&self, rival: Option<&ContentItem>) -> bool {
        let Some(rival) = rival else {
            return true;
        };

        let metadata = (self.sync.as_ref(), rival.sync.as_ref());
        if let (Some(ours), Some(theirs)) = metadata {
            if ours.is_winner(theirs) && !ours.is_conflict(theirs) {
                return true;
            }
            if !theirs.is_winner(ours) && !theirs.is_conflict(ours) {
                return false;
            }
        }

        match self.modified.cmp(&rival.modified) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => match metadata {
                (Some(ours), Some(theirs)) => ours.is_winner(theirs),
                _ => self.digest_fingerprint() < rival.digest_fingerprint(),
            },
        }
    }

    /// Decide how this incoming item merges against the local copy.
    pub fn merge_decision(&self, local: Option<&ContentItem>) -> MergeDecision {
        let conflict = match (self.sync.as_ref(), local.and_then(|l| l.sync.as_ref())) {
            (Some(ours), Some(theirs)) => ours.is_conflict(theirs),
            _ => false,
        };
        MergeDecision {
            apply: self.is_newer(local),
            conflict,
        }
    }

    /// Flag the item as conflicted. Does not change its version.
    pub fn mark_conflict(&mut self) {
        if let Some(sync) = self.sync.as_mut() {
            sync.conflict = true;
        }
    }
}
