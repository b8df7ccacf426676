//! End-to-end sync between hubs over the memory relay network.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use hive::core::{now_millis, ContentItem, HiveId, ItemGuid};
use hive::store::{MemoryReplica, SqliteReplica};
use hive::sync::{
    FeedRef, HivePayload, MemberRef, MemoryNetwork, MemoryTransport, NodeId, Packet, PacketKind,
    PacketQueue, ProbeMode, SessionId, SyncConfig, SyncEnvelope, Transport,
};
use hive::{
    Blake3Hash, HiveEvent, Hub, HubConfig, HubError, Replica, ReplicaExt, SessionRole, TickReport,
};
use proptest::prelude::*;
use tokio::sync::broadcast;

const A: NodeId = NodeId::from_bytes([0xAA; 32]);
const B: NodeId = NodeId::from_bytes([0xBB; 32]);
const R: NodeId = NodeId::from_bytes([0x01; 32]);

type TestHub<S> = Hub<S, MemoryTransport>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn post(byte: u8, now: i64) -> ContentItem {
    ContentItem::new(ItemGuid::from_bytes([byte; 16]), format!("post {}", byte), "alice", now)
        .link(format!("https://example.org/{}", byte))
}

async fn hub<S: Replica>(
    network: &Arc<MemoryNetwork>,
    node: NodeId,
    editor: &str,
    sync: SyncConfig,
    replica: S,
) -> TestHub<S> {
    let (inbox, queue) = PacketQueue::new();
    let transport = network.connect(node, inbox).await;
    let config = HubConfig {
        sync,
        editor: editor.to_string(),
        tick_interval: Duration::from_millis(10),
        ..HubConfig::default()
    };
    let mut hub = Hub::new(transport, queue, config);
    hub.add_replica(replica);
    hub
}

/// Two memory hubs, A and B, joined through relay R.
async fn pair(
    hive: HiveId,
    a_items: Vec<ContentItem>,
    b_items: Vec<ContentItem>,
    sync: SyncConfig,
) -> (Arc<MemoryNetwork>, TestHub<MemoryReplica>, TestHub<MemoryReplica>) {
    let network = MemoryNetwork::new();
    network.add_relay(R).await;
    let a = hub(&network, A, "alice", sync.clone(), MemoryReplica::with_items(hive, a_items)).await;
    let b = hub(&network, B, "bob", sync, MemoryReplica::with_items(hive, b_items)).await;
    (network, a, b)
}

/// Tick both hubs until neither has anything left to handle.
async fn pump<S: Replica>(a: &mut TestHub<S>, b: &mut TestHub<S>) {
    for _ in 0..16 {
        let ra = a.tick().await;
        let rb = b.tick().await;
        if ra == TickReport::default() && rb == TickReport::default() {
            return;
        }
    }
    panic!("hubs did not go quiet");
}

async fn roots_match<S: Replica>(a: &TestHub<S>, b: &TestHub<S>, hive: &HiveId) -> Result<bool> {
    let ra = a.replica(hive).expect("replica").build_digest().await?;
    let rb = b.replica(hive).expect("replica").build_digest().await?;
    Ok(ra.root_hash == rb.root_hash)
}

fn drain(events: &mut broadcast::Receiver<HiveEvent>) -> Vec<HiveEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test]
async fn test_deletion_replicates_through_relay() -> Result<()> {
    init_tracing();
    let hive = HiveId::new();
    let (x, y) = (post(1, 1000), post(2, 1000));
    let (network, mut a, mut b) =
        pair(hive, vec![x.clone(), y.clone()], vec![x.clone(), y], SyncConfig::default()).await;
    let mut a_events = a.subscribe();

    let tomb = b.remove_item(&hive, &x.guid).await?;
    assert_eq!(tomb.sync.as_ref().map(|s| s.by.as_str()), Some("bob"));
    assert!(!roots_match(&a, &b, &hive).await?);

    a.start_session(&hive, vec![R, B]).await?;
    pump(&mut a, &mut b).await;

    // B pushed exactly the tombstone back through the relay.
    let pushed: Vec<_> = network
        .deliveries()
        .into_iter()
        .filter(|d| d.from == B && d.kind == "item")
        .collect();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].path, vec![R, A]);

    let local = a.replica(&hive).expect("replica").get_item(&x.guid).await?;
    assert!(local.expect("tombstone").is_deleted());
    assert!(roots_match(&a, &b, &hive).await?);
    assert_eq!(a.active_sessions(), 0);

    let events = drain(&mut a_events);
    assert!(events.contains(&HiveEvent::ItemApplied { hive_id: hive, guid: x.guid, version: 2 }));
    assert!(events.iter().any(|e| matches!(
        e,
        HiveEvent::SessionCompleted { role: SessionRole::Initiator, received: 1, pushed: 0, .. }
    )));

    // A second session finds nothing to do.
    network.clear_deliveries();
    let fetches = (
        a.replica(&hive).expect("replica").fetch_count(),
        b.replica(&hive).expect("replica").fetch_count(),
    );
    a.start_session(&hive, vec![R, B]).await?;
    pump(&mut a, &mut b).await;

    let kinds: Vec<_> = network.deliveries().iter().map(|d| d.kind).collect();
    assert_eq!(kinds, vec!["sync_request", "sync_response"]);
    assert_eq!(
        fetches,
        (
            a.replica(&hive).expect("replica").fetch_count(),
            b.replica(&hive).expect("replica").fetch_count(),
        )
    );
    Ok(())
}

#[tokio::test]
async fn test_matching_roots_fetch_nothing() -> Result<()> {
    let hive = HiveId::new();
    let items: Vec<_> = (1..=20).map(|i| post(i, 1000 + i as i64)).collect();
    let (_network, mut a, mut b) =
        pair(hive, items.clone(), items, SyncConfig::default()).await;

    a.start_session(&hive, vec![B]).await?;
    pump(&mut a, &mut b).await;

    assert_eq!(a.replica(&hive).expect("replica").fetch_count(), 0);
    assert_eq!(b.replica(&hive).expect("replica").fetch_count(), 0);
    assert_eq!(a.active_sessions(), 0);
    Ok(())
}

#[tokio::test]
async fn test_bidirectional_exchange() -> Result<()> {
    let hive = HiveId::new();
    let shared = post(1, 1000);
    let (_network, mut a, mut b) = pair(
        hive,
        vec![shared.clone(), post(2, 1000)],
        vec![shared, post(3, 1000)],
        SyncConfig::default(),
    )
    .await;
    let mut a_events = a.subscribe();

    a.start_session(&hive, vec![R, B]).await?;
    pump(&mut a, &mut b).await;

    assert!(roots_match(&a, &b, &hive).await?);
    assert_eq!(a.replica(&hive).expect("replica").item_count().await?, 3);
    assert!(drain(&mut a_events).iter().any(|e| matches!(
        e,
        HiveEvent::SessionCompleted { role: SessionRole::Initiator, pushed: 1, received: 1, .. }
    )));
    Ok(())
}

#[tokio::test]
async fn test_one_way_leaves_initiator_extras() -> Result<()> {
    let hive = HiveId::new();
    let sync = SyncConfig {
        bidirectional: false,
        ..SyncConfig::default()
    };
    let (_network, mut a, mut b) =
        pair(hive, vec![post(1, 1000), post(2, 1000)], vec![post(1, 1000)], sync).await;

    a.start_session(&hive, vec![B]).await?;
    pump(&mut a, &mut b).await;

    assert_eq!(b.replica(&hive).expect("replica").item_count().await?, 1);
    assert!(!roots_match(&a, &b, &hive).await?);

    // B asking A brings it up to date.
    b.start_session(&hive, vec![A]).await?;
    pump(&mut a, &mut b).await;
    assert!(roots_match(&a, &b, &hive).await?);
    Ok(())
}

#[tokio::test]
async fn test_root_only_probe_converges() -> Result<()> {
    let hive = HiveId::new();
    let sync = SyncConfig {
        probe: ProbeMode::RootOnly,
        ..SyncConfig::default()
    };
    let (network, mut a, mut b) = pair(
        hive,
        vec![post(1, 1000), post(2, 1000)],
        vec![post(1, 1000), post(3, 1000)],
        sync,
    )
    .await;

    a.start_session(&hive, vec![R, B]).await?;
    pump(&mut a, &mut b).await;

    assert!(roots_match(&a, &b, &hive).await?);
    let requests = network
        .deliveries()
        .iter()
        .filter(|d| d.kind == "sync_request")
        .count();
    assert_eq!(requests, 2);
    Ok(())
}

#[tokio::test]
async fn test_unknown_hive_dropped() -> Result<()> {
    let (_network, mut a, mut b) =
        pair(HiveId::new(), vec![post(1, 1000)], vec![], SyncConfig::default()).await;
    let other = a.add_replica(MemoryReplica::with_items(HiveId::new(), [post(9, 1000)]));

    a.start_session(&other, vec![B]).await?;
    let report = b.tick().await;

    assert_eq!(report, TickReport { processed: 0, dropped: 1, failed: 0 });
    assert_eq!(a.tick().await, TickReport::default());
    assert_eq!(a.active_sessions(), 1);
    Ok(())
}

#[tokio::test]
async fn test_unknown_session_response_dropped() -> Result<()> {
    let hive = HiveId::new();
    let (_network, mut a, b) = pair(hive, vec![], vec![post(1, 1000)], SyncConfig::default()).await;

    let stray = Packet::new(
        hive,
        PacketKind::SyncResponse(SyncEnvelope {
            session_id: SessionId::new(),
            request_root_hash: Blake3Hash::anchor(),
            request_digest_keys: Some(Vec::new()),
            response_item_guids: Some(Vec::new()),
            return_path: vec![B],
        }),
    );
    b.transport().send_along_path(stray, &[A]).await?;

    assert_eq!(a.tick().await.dropped, 1);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_edits_flag_conflict() -> Result<()> {
    let hive = HiveId::new();
    let base = post(1, 1000);
    let mut ours = base.clone();
    ours.add_version("alice", 2000);
    let mut theirs = base.clone();
    theirs.title = "edited by bob".into();
    theirs.add_version("bob", 3000);

    let (_network, mut a, mut b) =
        pair(hive, vec![ours], vec![theirs], SyncConfig::default()).await;
    let mut a_events = a.subscribe();

    a.start_session(&hive, vec![B]).await?;
    pump(&mut a, &mut b).await;

    let kept = a
        .replica(&hive)
        .expect("replica")
        .get_item(&base.guid)
        .await?
        .expect("item");
    assert_eq!(kept.title, "edited by bob");
    assert!(kept.sync.as_ref().is_some_and(|s| s.conflict));
    assert!(roots_match(&a, &b, &hive).await?);
    assert!(drain(&mut a_events).contains(&HiveEvent::ConflictDetected {
        hive_id: hive,
        guid: base.guid,
        applied: true,
    }));
    Ok(())
}

#[tokio::test]
async fn test_same_time_edits_converge() -> Result<()> {
    init_tracing();
    let hive = HiveId::new();
    let base = post(1, 1000);
    let mut ours = base.clone();
    ours.title = "edited by alice".into();
    ours.add_version("alice", 2000);
    let mut theirs = base.clone();
    theirs.title = "edited by bob".into();
    theirs.add_version("bob", 2000);

    let (network, mut a, mut b) =
        pair(hive, vec![ours], vec![theirs], SyncConfig::default()).await;

    a.start_session(&hive, vec![R, B]).await?;
    pump(&mut a, &mut b).await;

    assert!(roots_match(&a, &b, &hive).await?);
    for replica in [a.replica(&hive), b.replica(&hive)] {
        let kept = replica.expect("replica").get_item(&base.guid).await?.expect("item");
        assert_eq!(kept.title, "edited by alice");
        assert!(kept.sync.as_ref().is_some_and(|s| s.conflict));
    }

    // Once settled, a second session exchanges no items.
    network.clear_deliveries();
    a.start_session(&hive, vec![R, B]).await?;
    pump(&mut a, &mut b).await;

    let kinds: Vec<_> = network.deliveries().iter().map(|d| d.kind).collect();
    assert_eq!(kinds, vec!["sync_request", "sync_response"]);
    Ok(())
}

#[tokio::test]
async fn test_feed_and_member_announcements() -> Result<()> {
    let hive = HiveId::new();
    let (_network, a, mut b) = pair(hive, vec![], vec![], SyncConfig::default()).await;
    let mut b_events = b.subscribe();

    let feed = FeedRef {
        url: "https://example.org/rss".into(),
        title: "example".into(),
    };
    let member = MemberRef {
        name: "alice".into(),
        node_id: A,
    };
    a.announce(&hive, HivePayload::Feed(feed.clone()), &[R, B]).await?;
    a.announce(&hive, HivePayload::Member(member.clone()), &[R, B]).await?;
    assert_eq!(b.tick().await.processed, 2);

    assert_eq!(
        drain(&mut b_events),
        vec![
            HiveEvent::FeedAnnounced { hive_id: hive, feed },
            HiveEvent::MemberAnnounced { hive_id: hive, member },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_announced_post_is_merged() -> Result<()> {
    let hive = HiveId::new();
    let (_network, a, mut b) = pair(hive, vec![], vec![], SyncConfig::default()).await;
    let item = post(7, 1000);

    a.announce(&hive, HivePayload::Post((&item).into()), &[B]).await?;
    b.tick().await;

    let stored = b.replica(&hive).expect("replica").get_item(&item.guid).await?;
    assert_eq!(stored, Some(item));
    Ok(())
}

#[tokio::test]
async fn test_sqlite_hubs_converge() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let hive = HiveId::new();
    let network = MemoryNetwork::new();
    let sync = SyncConfig::default();

    let mut a = hub(&network, A, "alice", sync.clone(), SqliteReplica::open(dir.path().join("a.db"), hive)?).await;
    let mut b = hub(&network, B, "bob", sync, SqliteReplica::open(dir.path().join("b.db"), hive)?).await;

    a.post_item(&hive, post(1, 1000)).await?;
    a.post_item(&hive, post(2, 1000)).await?;
    b.post_item(&hive, post(3, 1000)).await?;
    b.update_item(&hive, &ItemGuid::from_bytes([3; 16]), |i| i.priority = 5).await?;

    a.start_session(&hive, vec![B]).await?;
    pump(&mut a, &mut b).await;

    assert!(roots_match(&a, &b, &hive).await?);
    let remote = b.replica(&hive).expect("replica").build_digest().await?;
    assert!(a.verify(&hive, &remote.root_hash, &remote.keys).await?.is_converged());
    let copied = a
        .replica(&hive)
        .expect("replica")
        .get_item(&ItemGuid::from_bytes([3; 16]))
        .await?
        .expect("item");
    assert_eq!(copied.priority, 5);
    assert_eq!(copied.version(), 2);
    Ok(())
}

#[tokio::test]
async fn test_run_loops_converge() -> Result<()> {
    let hive = HiveId::new();
    let (_network, mut a, mut b) = pair(
        hive,
        vec![post(1, 1000)],
        vec![post(2, 1000), post(3, 1000)],
        SyncConfig::default(),
    )
    .await;

    a.start_session(&hive, vec![R, B]).await?;
    tokio::join!(
        a.run(tokio::time::sleep(Duration::from_millis(200))),
        b.run(tokio::time::sleep(Duration::from_millis(200))),
    );

    assert!(roots_match(&a, &b, &hive).await?);
    assert_eq!(a.active_sessions(), 0);
    Ok(())
}

#[tokio::test]
async fn test_local_edit_api() -> Result<()> {
    let hive = HiveId::new();
    let (_network, mut a, _b) = pair(hive, vec![], vec![], SyncConfig::default()).await;
    let item = ContentItem::new(ItemGuid::new(), "draft", "alice", now_millis());
    let guid = item.guid;

    a.post_item(&hive, item).await?;
    assert!(a.post_item(&hive, post(1, 1000)).await.is_ok());
    let edited = a.update_item(&hive, &guid, |i| i.summary = Some("final".into())).await?;
    assert_eq!(edited.version(), 2);

    let missing = ItemGuid::new();
    assert!(matches!(
        a.update_item(&hive, &missing, |_| {}).await,
        Err(HubError::ItemNotFound(g)) if g == missing
    ));
    assert!(matches!(
        a.remove_item(&HiveId::new(), &guid).await,
        Err(HubError::UnknownHive(_))
    ));
    Ok(())
}

fn split_strategy() -> impl Strategy<Value = Vec<(u8, u8)>> {
    // (guid byte, owner) where owner 0 = A only, 1 = B only, 2 = both.
    proptest::collection::btree_map(1u8..=200, 0u8..3, 0..24)
        .prop_map(|m| m.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_any_split_converges(split in split_strategy()) {
        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        let converged = runtime.block_on(async {
            let hive = HiveId::new();
            let mut a_items = Vec::new();
            let mut b_items = Vec::new();
            for (byte, owner) in &split {
                let item = post(*byte, 1000);
                if *owner != 1 {
                    a_items.push(item.clone());
                }
                if *owner != 0 {
                    b_items.push(item);
                }
            }
            let (_network, mut a, mut b) = pair(hive, a_items, b_items, SyncConfig::default()).await;
            a.start_session(&hive, vec![R, B]).await.expect("start");
            pump(&mut a, &mut b).await;
            let count = a.replica(&hive).expect("replica").item_count().await.expect("count");
            (roots_match(&a, &b, &hive).await.expect("digest"), count)
        });
        prop_assert!(converged.0);
        prop_assert_eq!(converged.1, split.len());
    }
}
