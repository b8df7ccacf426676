//! Content digest: a canonical summary of a replica's whole state.
//!
//! Each item contributes one key, `guid:fingerprint`. Keys are sorted with
//! ordinal byte comparison before being fed to the hash tree, so two
//! replicas holding the same `(guid, fingerprint)` multiset always agree on
//! the root regardless of insertion order.

use serde::{Deserialize, Serialize};

use crate::crypto::Blake3Hash;
use crate::item::ContentItem;
use crate::tree::{root_hash, TreeNode};
use crate::types::ItemGuid;

/// Separator between guid and fingerprint in a digest key.
pub const KEY_SEPARATOR: char = ':';

/// Sorted digest keys plus the root hash over them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    /// `guid:fingerprint` strings in ordinal order.
    pub keys: Vec<String>,
    /// Root of the hash tree built over `keys`.
    pub root_hash: Blake3Hash,
}

impl Digest {
    /// The digest of a replica with no items.
    pub fn empty() -> Self {
        Self {
            keys: Vec::new(),
            root_hash: Blake3Hash::anchor(),
        }
    }

    /// Number of items summarized.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if the digest summarizes no items.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Guids named by this digest, in key order. Unparseable keys are skipped.
    pub fn guids(&self) -> Vec<ItemGuid> {
        self.keys
            .iter()
            .filter_map(|k| parse_digest_key(k))
            .map(|(guid, _)| guid)
            .collect()
    }
}

/// Format the digest key of one item.
pub fn digest_key(guid: &ItemGuid, fingerprint: &Blake3Hash) -> String {
    format!("{}{}{}", guid, KEY_SEPARATOR, fingerprint.to_hex())
}

/// Split a digest key back into its guid and fingerprint.
pub fn parse_digest_key(key: &str) -> Option<(ItemGuid, Blake3Hash)> {
    let (guid, fingerprint) = key.split_once(KEY_SEPARATOR)?;
    let guid = guid.parse().ok()?;
    let fingerprint = Blake3Hash::from_hex(fingerprint).ok()?;
    Some((guid, fingerprint))
}

/// Build the digest of a set of items.
///
/// Items with a missing or undecodable fingerprint contribute the anchor in
/// its place. Never fails and never mutates the items.
pub fn build_digest<'a, I>(items: I) -> Digest
where
    I: IntoIterator<Item = &'a ContentItem>,
{
    let mut pairs: Vec<(String, TreeNode)> = items
        .into_iter()
        .map(|item| {
            let key = digest_key(&item.guid, &item.digest_fingerprint());
            let leaf = TreeNode::leaf(key.as_bytes());
            (key, leaf)
        })
        .collect();

    // String ordering is byte-wise, independent of locale.
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let (keys, nodes): (Vec<String>, Vec<TreeNode>) = pairs.into_iter().unzip();
    Digest {
        root_hash: root_hash(nodes),
        keys,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: u8) -> Vec<ContentItem> {
        (0..n)
            .map(|i| {
                ContentItem::new(
                    ItemGuid::from_bytes([i; 16]),
                    format!("post {}", i),
                    "alice",
                    1000 + i as i64,
                )
            })
            .collect()
    }

    #[test]
    fn test_empty_replica_anchor() {
        let digest = build_digest(&Vec::<ContentItem>::new());
        assert!(digest.is_empty());
        assert_eq!(digest.root_hash, Blake3Hash::anchor());
        assert_eq!(digest, Digest::empty());
    }

    #[test]
    fn test_order_independence() {
        let forward = items(7);
        let mut reversed = forward.clone();
        reversed.reverse();
        assert_eq!(build_digest(&forward), build_digest(&reversed));
    }

    #[test]
    fn test_keys_are_sorted() {
        let mut list = items(5);
        list.reverse();
        let digest = build_digest(&list);
        let mut sorted = digest.keys.clone();
        sorted.sort();
        assert_eq!(digest.keys, sorted);
        assert_eq!(digest.len(), 5);
    }

    #[test]
    fn test_sensitivity() {
        let base = items(4);
        let root = build_digest(&base).root_hash;

        let mut edited = base.clone();
        edited[2].add_version("bob", 5000);
        assert_ne!(build_digest(&edited).root_hash, root);

        let mut removed = base.clone();
        removed.pop();
        assert_ne!(build_digest(&removed).root_hash, root);

        let mut added = base.clone();
        added.extend(items(5).pop());
        assert_ne!(build_digest(&added).root_hash, root);
    }

    #[test]
    fn test_content_edit_without_version_bump_is_invisible() {
        let base = items(3);
        let mut edited = base.clone();
        edited[0].title = "changed".into();
        assert_eq!(build_digest(&base).root_hash, build_digest(&edited).root_hash);
    }

    #[test]
    fn test_corrupt_fingerprint_tolerated() {
        let mut list = items(3);
        list[1].fingerprint = Some("garbage".into());
        let digest = build_digest(&list);
        let expected = digest_key(&list[1].guid, &Blake3Hash::anchor());
        assert!(digest.keys.contains(&expected));
    }

    #[test]
    fn test_key_roundtrip() {
        let guid = ItemGuid::from_bytes([7; 16]);
        let fp = Blake3Hash::hash(b"fp");
        let key = digest_key(&guid, &fp);
        assert_eq!(parse_digest_key(&key), Some((guid, fp)));
        assert_eq!(parse_digest_key("no-separator"), None);
        assert_eq!(parse_digest_key("bad:guid"), None);
    }

    #[test]
    fn test_guids() {
        let list = items(3);
        let digest = build_digest(&list);
        let mut expected: Vec<ItemGuid> = list.iter().map(|i| i.guid).collect();
        expected.sort_by_key(|g| g.to_string());
        assert_eq!(digest.guids(), expected);
    }
}
