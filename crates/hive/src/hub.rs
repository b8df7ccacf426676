//! The Hub: unified API for hive replication.
//!
//! A hub owns the replicas of every hive it takes part in, keyed by
//! [`HiveId`], together with the inbound packet queue and the transport.
//! Components refer to each other by id and talk through packets and
//! events; nothing holds a reference back into the hub.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use hive_core::{now_millis, Blake3Hash, ContentItem, HiveId, ItemGuid};
use hive_store::{MergeOutcome, Replica, ReplicaExt};
use hive_sync::{
    respond, verify_convergence, ConvergenceResult, HivePayload, InitiatorSession, InitiatorState,
    NodeId, Packet, PacketKind, PacketQueue, SessionId, SyncConfig, Transport,
};

use crate::error::{HubError, Result};
use crate::events::{HiveEvent, SessionRole};

/// Configuration for the Hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Sync configuration.
    pub sync: SyncConfig,
    /// Identity recorded as `by` on local edits.
    pub editor: String,
    /// Events buffered per subscriber before the slowest one lags.
    pub event_capacity: usize,
    /// Period of the tick loop in [`Hub::run`].
    pub tick_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            editor: "anonymous".to_string(),
            event_capacity: 256,
            tick_interval: Duration::from_millis(100),
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Packets handled.
    pub processed: usize,
    /// Packets dropped: unknown hive or session, oversized, unreadable.
    pub dropped: usize,
    /// Packets whose handling hit a storage or transport error.
    pub failed: usize,
}

/// The main Hub struct.
///
/// Provides a unified API for:
/// - Registering replicas
/// - Posting, editing and deleting items
/// - Starting sync sessions
/// - Draining inbound packets
/// - Subscribing to events
///
/// Mutation goes through `&mut self`, so each replica has a single writer.
pub struct Hub<R: Replica, T: Transport> {
    config: HubConfig,
    replicas: HashMap<HiveId, Arc<R>>,
    queue: PacketQueue,
    transport: T,
    sessions: HashMap<SessionId, InitiatorSession>,
    events: broadcast::Sender<HiveEvent>,
}

impl<R: Replica, T: Transport> Hub<R, T> {
    /// Create a hub that reads packets from `queue` and sends through
    /// `transport`.
    pub fn new(transport: T, queue: PacketQueue, config: HubConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            replicas: HashMap::new(),
            queue,
            transport,
            sessions: HashMap::new(),
            events,
        }
    }

    /// This hub's node in the relay overlay.
    pub fn node_id(&self) -> NodeId {
        self.transport.local_node_id()
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registry
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a replica under its hive id, replacing any previous one.
    pub fn add_replica(&mut self, replica: R) -> HiveId {
        let hive_id = replica.hive_id();
        if self.replicas.insert(hive_id, Arc::new(replica)).is_some() {
            tracing::info!(hive = %hive_id, "replaced replica");
        }
        hive_id
    }

    /// Unregister a hive. Packets for it are dropped afterwards.
    pub fn remove_replica(&mut self, hive_id: &HiveId) -> Option<Arc<R>> {
        self.sessions.retain(|_, s| s.hive_id() != *hive_id);
        self.replicas.remove(hive_id)
    }

    /// Get the replica of a hive.
    pub fn replica(&self, hive_id: &HiveId) -> Option<Arc<R>> {
        self.replicas.get(hive_id).cloned()
    }

    /// Hives with a registered replica.
    pub fn hives(&self) -> Vec<HiveId> {
        self.replicas.keys().copied().collect()
    }

    /// Sessions this hub started that have not completed.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Subscribe to hive events.
    pub fn subscribe(&self) -> broadcast::Receiver<HiveEvent> {
        self.events.subscribe()
    }

    fn lookup(&self, hive_id: &HiveId) -> Result<Arc<R>> {
        self.replica(hive_id).ok_or(HubError::UnknownHive(*hive_id))
    }

    fn emit(&self, event: HiveEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Local edits
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a new item to a hive.
    pub async fn post_item(&mut self, hive_id: &HiveId, item: ContentItem) -> Result<()> {
        let replica = self.lookup(hive_id)?;
        if replica.get_item(&item.guid).await?.is_some() {
            return Err(HubError::ItemExists(item.guid));
        }
        replica.put_item(&item).await?;
        tracing::debug!(hive = %hive_id, guid = %item.guid, "posted item");
        Ok(())
    }

    /// Edit an item's content and record a new version by this hub's editor.
    pub async fn update_item<F>(&mut self, hive_id: &HiveId, guid: &ItemGuid, edit: F) -> Result<ContentItem>
    where
        F: FnOnce(&mut ContentItem),
    {
        let replica = self.lookup(hive_id)?;
        let mut item = replica
            .get_item(guid)
            .await?
            .ok_or(HubError::ItemNotFound(*guid))?;

        edit(&mut item);
        item.add_version(&self.config.editor, now_millis());
        replica.put_item(&item).await?;
        Ok(item)
    }

    /// Delete an item, leaving a tombstone that replicates.
    pub async fn remove_item(&mut self, hive_id: &HiveId, guid: &ItemGuid) -> Result<ContentItem> {
        let replica = self.lookup(hive_id)?;
        if replica.get_item(guid).await?.is_none() {
            return Err(HubError::ItemNotFound(*guid));
        }
        let tombstone = replica
            .tombstone_item(guid, &self.config.editor, now_millis())
            .await?;
        tracing::debug!(hive = %hive_id, %guid, version = tombstone.version(), "removed item");
        Ok(tombstone)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync
    // ─────────────────────────────────────────────────────────────────────────

    /// Open a session with the peer at the end of `forward_path`.
    pub async fn start_session(&mut self, hive_id: &HiveId, forward_path: Vec<NodeId>) -> Result<SessionId> {
        let replica = self.lookup(hive_id)?;
        let digest = replica.build_digest().await?;

        let (session, request) = InitiatorSession::start(
            *hive_id,
            forward_path,
            self.node_id(),
            &digest,
            self.config.sync.probe,
        )?;
        let session_id = session.id();

        self.transport
            .send_along_path(request, session.forward_path())
            .await?;
        self.sessions.insert(session_id, session);

        tracing::info!(hive = %hive_id, session = %session_id, items = digest.len(), "started session");
        Ok(session_id)
    }

    /// Forget a session whose response never arrived.
    ///
    /// A late response for it is dropped like any unknown session. Returns
    /// whether the session was still active.
    pub fn abandon_session(&mut self, session_id: &SessionId) -> bool {
        let abandoned = self.sessions.remove(session_id).is_some();
        if abandoned {
            tracing::debug!(session = %session_id, "abandoned session");
        }
        abandoned
    }

    /// Share a feed or member reference (or a single post) with one peer.
    pub async fn announce(&self, hive_id: &HiveId, payload: HivePayload, path: &[NodeId]) -> Result<()> {
        self.lookup(hive_id)?;
        let packet = Packet::new(
            *hive_id,
            PacketKind::Item {
                session_id: SessionId::new(),
                payload,
            },
        );
        self.transport.send_along_path(packet, path).await?;
        Ok(())
    }

    /// Compare a hive's replica with a remote peer's digest.
    pub async fn verify(
        &self,
        hive_id: &HiveId,
        remote_root: &Blake3Hash,
        remote_keys: &[String],
    ) -> Result<ConvergenceResult> {
        let replica = self.lookup(hive_id)?;
        Ok(verify_convergence(replica.as_ref(), remote_root, remote_keys).await?)
    }

    /// Drain the inbound queue, handling packets in arrival order.
    ///
    /// Never fails: drops and per-packet errors are logged and counted.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        while let Some(packet) = self.queue.try_get_next_packet() {
            let kind = packet.kind_name();
            match self.handle_packet(packet).await {
                Ok(true) => report.processed += 1,
                Ok(false) => report.dropped += 1,
                Err(e) => {
                    tracing::warn!(kind, error = %e, "packet handling failed");
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Tick every `tick_interval` until `shutdown` resolves, then drain
    /// once more.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    let report = self.tick().await;
                    if report != TickReport::default() {
                        tracing::trace!(?report, "tick");
                    }
                }
            }
        }

        self.tick().await;
    }

    /// Handle one packet. `Ok(false)` means it was dropped.
    async fn handle_packet(&mut self, packet: Packet) -> Result<bool> {
        if let Err(reason) = packet.validate_limits() {
            tracing::warn!(hive = %packet.hive_id, reason, "dropping oversized packet");
            return Ok(false);
        }

        let hive_id = packet.hive_id;
        let Some(replica) = self.replicas.get(&hive_id).cloned() else {
            tracing::debug!(hive = %hive_id, kind = packet.kind_name(), "dropping packet for unknown hive");
            return Ok(false);
        };

        match packet.kind {
            PacketKind::SyncRequest(request) => {
                let report =
                    respond(replica.as_ref(), &self.transport, request, &self.config.sync).await?;
                self.emit(HiveEvent::SessionCompleted {
                    hive_id,
                    session_id: report.session_id,
                    role: SessionRole::Responder,
                    pushed: report.push.pushed.len(),
                    received: 0,
                });
                Ok(true)
            }
            PacketKind::SyncResponse(response) => {
                let session_id = response.session_id;
                let Some(session) = self
                    .sessions
                    .get_mut(&session_id)
                    .filter(|s| s.hive_id() == hive_id)
                else {
                    tracing::debug!(session = %session_id, "dropping response for unknown session");
                    return Ok(false);
                };

                let state = session
                    .on_response(&response, replica.as_ref(), &self.transport, &self.config.sync)
                    .await?;

                if state == InitiatorState::Done {
                    if let Some(session) = self.sessions.remove(&session_id) {
                        tracing::info!(
                            hive = %hive_id,
                            session = %session_id,
                            pushed = session.pushed().len(),
                            received = session.received(),
                            "session completed"
                        );
                        self.emit(HiveEvent::SessionCompleted {
                            hive_id,
                            session_id,
                            role: SessionRole::Initiator,
                            pushed: session.pushed().len(),
                            received: session.received(),
                        });
                    }
                }
                Ok(true)
            }
            PacketKind::Item { session_id, payload } => {
                if let Some(session) = self.sessions.get_mut(&session_id) {
                    if session.hive_id() == hive_id {
                        session.record_received();
                    }
                }
                self.apply_payload(hive_id, replica.as_ref(), payload).await
            }
        }
    }

    async fn apply_payload(&self, hive_id: HiveId, replica: &R, payload: HivePayload) -> Result<bool> {
        match payload {
            HivePayload::Post(record) => {
                let item = match ContentItem::try_from(record) {
                    Ok(item) => item,
                    Err(e) => {
                        tracing::warn!(hive = %hive_id, error = %e, "dropping unreadable item");
                        return Ok(false);
                    }
                };
                let guid = item.guid;
                let version = item.version();

                match replica.merge_item(item).await? {
                    MergeOutcome::Applied => {
                        self.emit(HiveEvent::ItemApplied { hive_id, guid, version });
                    }
                    MergeOutcome::Conflict { applied } => {
                        tracing::warn!(hive = %hive_id, %guid, applied, "conflicting edits");
                        if applied {
                            self.emit(HiveEvent::ItemApplied { hive_id, guid, version });
                        }
                        self.emit(HiveEvent::ConflictDetected { hive_id, guid, applied });
                    }
                    MergeOutcome::Stale => {
                        tracing::trace!(hive = %hive_id, %guid, "ignored stale item");
                    }
                }
            }
            HivePayload::Feed(feed) => self.emit(HiveEvent::FeedAnnounced { hive_id, feed }),
            HivePayload::Member(member) => self.emit(HiveEvent::MemberAnnounced { hive_id, member }),
        }
        Ok(true)
    }
}
