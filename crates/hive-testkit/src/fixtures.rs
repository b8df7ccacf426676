//! Test fixtures and helpers.
//!
//! Common setup code for integration tests. Fixtures use a private clock
//! that advances on every edit, so edits made by different fixtures never
//! share a `modified` timestamp unless asked to.

use hive_core::{ContentItem, HiveId, ItemGuid};
use hive_store::MemoryReplica;
use rand::Rng;

/// A test fixture for one editor of one hive.
pub struct HiveFixture {
    pub hive_id: HiveId,
    pub editor: String,
    clock: i64,
    next_guid: u128,
}

impl HiveFixture {
    /// Create a fixture for a fresh hive.
    pub fn new(editor: &str) -> Self {
        Self::with_hive(HiveId::new(), editor)
    }

    /// Create a fixture editing an existing hive.
    pub fn with_hive(hive_id: HiveId, editor: &str) -> Self {
        Self {
            hive_id,
            editor: editor.to_string(),
            clock: 1_000,
            next_guid: 1,
        }
    }

    /// Start the clock at `now`. Useful to order edits of two fixtures.
    pub fn starting_at(mut self, now: i64) -> Self {
        self.clock = now;
        self
    }

    /// Advance the clock and return the new time.
    pub fn tick_clock(&mut self) -> i64 {
        self.clock += 1_000;
        self.clock
    }

    /// A deterministic guid; the n-th guid handed out by any fixture is the same.
    pub fn guid(&mut self) -> ItemGuid {
        let guid = ItemGuid::from_bytes(self.next_guid.to_be_bytes());
        self.next_guid += 1;
        guid
    }

    /// Create a new post.
    pub fn post(&mut self, title: &str) -> ContentItem {
        let guid = self.guid();
        let now = self.tick_clock();
        ContentItem::new(guid, title, self.editor.as_str(), now)
            .link(format!("https://example.org/{}", guid))
    }

    /// Create `count` posts.
    pub fn posts(&mut self, count: usize) -> Vec<ContentItem> {
        (0..count).map(|i| self.post(&format!("post {}", i))).collect()
    }

    /// A copy of `item` with one more version by this fixture's editor.
    pub fn edit(&mut self, item: &ContentItem) -> ContentItem {
        let mut edited = item.clone();
        edited.title = format!("{} ({})", item.title, self.editor);
        let now = self.tick_clock();
        edited.add_version(&self.editor, now);
        edited
    }

    /// A tombstone of `item` made by this fixture's editor.
    pub fn delete(&mut self, item: &ContentItem) -> ContentItem {
        let mut tombstone = item.clone();
        let now = self.tick_clock();
        tombstone.set_deleted(&self.editor, now);
        tombstone
    }

    /// A memory replica of this hive holding `items`.
    pub fn replica(&self, items: impl IntoIterator<Item = ContentItem>) -> MemoryReplica {
        MemoryReplica::with_items(self.hive_id, items)
    }
}

/// Two item sets sharing `shared` items, each with its own extras.
pub fn diverged_sets(
    fixture: &mut HiveFixture,
    shared: usize,
    only_a: usize,
    only_b: usize,
) -> (Vec<ContentItem>, Vec<ContentItem>) {
    let common = fixture.posts(shared);
    let mut a = common.clone();
    a.extend(fixture.posts(only_a));
    let mut b = common;
    b.extend(fixture.posts(only_b));
    (a, b)
}

/// `count` items with random guids, editors and version counts.
pub fn random_items<R: Rng>(rng: &mut R, count: usize) -> Vec<ContentItem> {
    const EDITORS: [&str; 4] = ["alice", "bob", "carol", "dave"];

    (0..count)
        .map(|_| {
            let now = rng.gen_range(1_000..1_000_000_000i64);
            let editor = EDITORS[rng.gen_range(0..EDITORS.len())];
            let mut item = ContentItem::new(ItemGuid::from_bytes(rng.gen()), "random", editor, now);
            for step in 0..rng.gen_range(0..4i64) {
                let by = EDITORS[rng.gen_range(0..EDITORS.len())];
                item.add_version(by, now + (step + 1) * 1_000);
            }
            item
        })
        .collect()
}
