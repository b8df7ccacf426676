//! Proptest generators for property-based testing.

use proptest::prelude::*;

use hive_core::{Blake3Hash, ContentItem, ItemGuid};

/// Generate a random ItemGuid.
pub fn item_guid() -> impl Strategy<Value = ItemGuid> {
    any::<[u8; 16]>().prop_map(ItemGuid::from_bytes)
}

/// Generate a random Blake3Hash.
pub fn blake3_hash() -> impl Strategy<Value = Blake3Hash> {
    any::<[u8; 32]>().prop_map(Blake3Hash)
}

/// Generate an editor identity.
pub fn editor() -> impl Strategy<Value = String> {
    "[a-z]{1,8}".prop_map(String::from)
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=1_900_000_000_000i64
}

/// Generate arbitrary leaf payloads for the hash tree.
pub fn leaves(max: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..=max)
}

/// Parameters for generating an item.
#[derive(Debug, Clone)]
pub struct ItemParams {
    pub guid: [u8; 16],
    pub title: String,
    pub author: String,
    pub posted: i64,
    /// Later versions, as `(editor, millis after the previous one)`.
    pub edits: Vec<(String, i64)>,
    pub deleted: bool,
}

impl Arbitrary for ItemParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            any::<[u8; 16]>(),
            "[a-zA-Z0-9 ]{0,40}",
            editor(),
            timestamp(),
            prop::collection::vec((editor(), 1i64..=86_400_000), 0..14),
            any::<bool>(),
        )
            .prop_map(|(guid, title, author, posted, edits, deleted)| ItemParams {
                guid,
                title,
                author,
                posted,
                edits,
                deleted,
            })
            .boxed()
    }
}

/// Build an item from parameters.
pub fn item_from_params(params: &ItemParams) -> ContentItem {
    let mut item = ContentItem::new(
        ItemGuid::from_bytes(params.guid),
        params.title.as_str(),
        params.author.as_str(),
        params.posted,
    );

    let mut now = params.posted;
    for (by, delay) in &params.edits {
        now += delay;
        item.add_version(by, now);
    }
    if params.deleted {
        item.set_deleted(&params.author, now + 1);
    }
    item
}

/// Generate a set of items with distinct guids.
pub fn item_set(max: usize) -> impl Strategy<Value = Vec<ContentItem>> {
    prop::collection::btree_map(any::<[u8; 16]>(), any::<ItemParams>(), 0..=max).prop_map(|m| {
        m.into_iter()
            .map(|(guid, params)| item_from_params(&ItemParams { guid, ..params }))
            .collect()
    })
}
