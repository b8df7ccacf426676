//! Sync session state machine.
//!
//! Implements anti-entropy between two replicas of a hive. The protocol is
//! built from three steps that can be called on their own:
//!
//! 1. [`compare_root`]: the cheap path. Equal roots mean equal replicas.
//! 2. [`diff_digest`]: which local items the remote side lacks or holds at a
//!    different version.
//! 3. [`push_delta`]: unicast those items along an explicit path.
//!
//! [`SyncSession`] composes them on the responder side and
//! [`InitiatorSession`] on the initiating side.

use std::collections::HashSet;

use hive_core::{parse_digest_key, Blake3Hash, Digest, HiveId, ItemGuid, ItemRecord};
use hive_store::{Replica, ReplicaExt};

use crate::error::{Result, SyncError};
use crate::messages::{limits, HivePayload, NodeId, Packet, PacketKind, SessionId, SyncEnvelope};
use crate::transport::{return_path, Transport};

/// How a session opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeMode {
    /// Send only the root hash first; exchange keys only on mismatch.
    RootOnly,
    /// Send the root hash together with the full key list.
    #[default]
    FullDigest,
}

/// Configuration for sync behavior.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How sessions open.
    pub probe: ProbeMode,
    /// Whether the initiator pushes what the responder lacks.
    pub bidirectional: bool,
    /// Cap on items pushed in one step; the remainder is picked up by a
    /// later session.
    pub max_delta_items: Option<usize>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            probe: ProbeMode::FullDigest,
            bidirectional: true,
            max_delta_items: None,
        }
    }
}

impl SyncConfig {
    fn delta_cap(&self) -> usize {
        self.max_delta_items
            .unwrap_or(usize::MAX)
            .min(limits::MAX_RESPONSE_GUIDS)
    }
}

/// Check whether the local digest already matches the remote root.
pub fn compare_root(local: &Digest, remote_root: &Blake3Hash) -> bool {
    local.root_hash == *remote_root
}

/// Guids of local items the remote side needs.
///
/// A local key absent from `remote_keys` means the remote lacks the item or
/// holds it at a different fingerprint. Without remote keys, or when any of
/// them fails to parse, the whole remote digest is treated as mismatched and
/// every local item is returned.
pub fn diff_digest(local: &Digest, remote_keys: Option<&[String]>) -> Vec<ItemGuid> {
    let Some(remote_keys) = remote_keys else {
        return local.guids();
    };

    if remote_keys.iter().any(|k| parse_digest_key(k).is_none()) {
        tracing::warn!(keys = remote_keys.len(), "malformed remote digest, treating as fully mismatched");
        return local.guids();
    }

    let remote: HashSet<&str> = remote_keys.iter().map(String::as_str).collect();
    local
        .keys
        .iter()
        .filter(|key| !remote.contains(key.as_str()))
        .filter_map(|key| parse_digest_key(key))
        .map(|(guid, _)| guid)
        .collect()
}

/// Result of pushing a delta.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Items sent, in order.
    pub pushed: Vec<ItemGuid>,
    /// Items that could no longer be fetched or read.
    pub skipped: Vec<ItemGuid>,
}

/// Fetch each item of `guids` and unicast it along `path` as its own packet.
///
/// Items that vanished or no longer decode are skipped, not reported as
/// errors.
pub async fn push_delta<R, T>(
    replica: &R,
    transport: &T,
    session_id: SessionId,
    guids: &[ItemGuid],
    path: &[NodeId],
) -> Result<PushReport>
where
    R: Replica + ?Sized,
    T: Transport + ?Sized,
{
    let mut report = PushReport::default();

    for guid in guids {
        let record = match replica.fetch_item_record(guid).await? {
            Some(bytes) => match ItemRecord::from_bytes(&bytes) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(%guid, error = %e, "skipping unreadable item");
                    report.skipped.push(*guid);
                    continue;
                }
            },
            None => {
                tracing::debug!(%guid, "skipping item that is no longer present");
                report.skipped.push(*guid);
                continue;
            }
        };

        let packet = Packet::new(
            replica.hive_id(),
            PacketKind::Item {
                session_id,
                payload: HivePayload::Post(record),
            },
        );
        transport.send_along_path(packet, path).await?;
        report.pushed.push(*guid);
    }

    Ok(report)
}

/// Responder session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    DigestCompared,
    DeltaComputed,
    ItemsPushed,
    Done,
}

/// Responder side of one reconciliation attempt.
///
/// `Init -> DigestCompared -> DeltaComputed -> ItemsPushed`, or straight
/// from `Init` to `Done` when the roots match. [`SyncSession::finish`]
/// builds the response.
#[derive(Debug)]
pub struct SyncSession {
    hive_id: HiveId,
    state: SessionState,
    request: SyncEnvelope,
    local: Option<Digest>,
    delta: Vec<ItemGuid>,
    pushed: Vec<ItemGuid>,
}

impl SyncSession {
    /// Accept a request for `hive_id`.
    pub fn accept(hive_id: HiveId, request: SyncEnvelope) -> Self {
        Self {
            hive_id,
            state: SessionState::Init,
            request,
            local: None,
            delta: Vec::new(),
            pushed: Vec::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.request.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Items selected for push.
    pub fn delta(&self) -> &[ItemGuid] {
        &self.delta
    }

    /// Path the session's replies travel.
    pub fn reply_path(&self) -> &[NodeId] {
        &self.request.return_path
    }

    fn expect(&self, state: SessionState, step: &'static str) -> Result<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(SyncError::OutOfOrder(step))
        }
    }

    /// Compare the local digest against the request root. Returns true on a
    /// match, which ends the session with an empty delta.
    pub fn compare(&mut self, local: Digest) -> Result<bool> {
        self.expect(SessionState::Init, "compare")?;
        let matched = compare_root(&local, &self.request.request_root_hash);
        self.local = Some(local);
        self.state = if matched {
            SessionState::Done
        } else {
            SessionState::DigestCompared
        };
        Ok(matched)
    }

    /// Compute the items the initiator needs, at most `cap` of them.
    ///
    /// A root-only probe carries no keys; its delta is empty and the
    /// response hands the initiator our keys instead.
    pub fn compute_delta(&mut self, cap: usize) -> Result<&[ItemGuid]> {
        self.expect(SessionState::DigestCompared, "compute_delta")?;
        let local = self
            .local
            .as_ref()
            .ok_or(SyncError::OutOfOrder("compute_delta"))?;

        let mut delta = match self.request.request_digest_keys.as_deref() {
            Some(keys) => diff_digest(local, Some(keys)),
            None => Vec::new(),
        };
        delta.truncate(cap);

        self.delta = delta;
        self.state = SessionState::DeltaComputed;
        Ok(&self.delta)
    }

    /// Push the delta along the request's return path.
    pub async fn push<R, T>(&mut self, replica: &R, transport: &T) -> Result<PushReport>
    where
        R: Replica + ?Sized,
        T: Transport + ?Sized,
    {
        self.expect(SessionState::DeltaComputed, "push")?;
        let report = push_delta(
            replica,
            transport,
            self.request.session_id,
            &self.delta,
            &self.request.return_path,
        )
        .await?;
        self.pushed = report.pushed.clone();
        self.state = SessionState::ItemsPushed;
        Ok(report)
    }

    /// Build the response packet, sent by `local_node`.
    pub fn finish(mut self, local_node: NodeId) -> Result<Packet> {
        let matched = match self.state {
            SessionState::Done => true,
            SessionState::ItemsPushed => false,
            _ => return Err(SyncError::OutOfOrder("finish")),
        };
        let local = self.local.take().ok_or(SyncError::OutOfOrder("finish"))?;

        let (keys, guids) = if matched {
            (None, Some(Vec::new()))
        } else if self.request.request_digest_keys.is_none() {
            (Some(local.keys), None)
        } else {
            (Some(local.keys), Some(std::mem::take(&mut self.pushed)))
        };

        self.state = SessionState::Done;
        Ok(Packet::new(
            self.hive_id,
            PacketKind::SyncResponse(SyncEnvelope {
                session_id: self.request.session_id,
                request_root_hash: local.root_hash,
                request_digest_keys: keys,
                response_item_guids: guids,
                return_path: return_path(&self.request.return_path, local_node),
            }),
        ))
    }
}

/// What the responder did with one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponderReport {
    pub session_id: SessionId,
    /// Roots matched; nothing was pushed.
    pub matched: bool,
    pub push: PushReport,
}

/// Answer one request: compare, diff, push, respond.
pub async fn respond<R, T>(
    replica: &R,
    transport: &T,
    request: SyncEnvelope,
    config: &SyncConfig,
) -> Result<ResponderReport>
where
    R: Replica + ?Sized,
    T: Transport + ?Sized,
{
    let mut session = SyncSession::accept(replica.hive_id(), request);
    let session_id = session.id();

    let digest = replica.build_digest().await?;
    let matched = session.compare(digest)?;

    let mut push = PushReport::default();
    if matched {
        tracing::debug!(session = %session_id, "root hashes match");
    } else {
        let delta = session.compute_delta(config.delta_cap())?.len();
        tracing::debug!(session = %session_id, delta, "root mismatch");
        push = session.push(replica, transport).await?;
    }

    let path = session.reply_path().to_vec();
    let response = session.finish(transport.local_node_id())?;
    transport.send_along_path(response, &path).await?;

    Ok(ResponderReport {
        session_id,
        matched,
        push,
    })
}

/// Initiator session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiatorState {
    AwaitingResponse,
    Done,
}

/// Initiating side of one reconciliation attempt.
#[derive(Debug)]
pub struct InitiatorSession {
    id: SessionId,
    hive_id: HiveId,
    forward_path: Vec<NodeId>,
    state: InitiatorState,
    reprobed: bool,
    pushed: Vec<ItemGuid>,
    received: usize,
}

impl InitiatorSession {
    /// Open a session towards the last hop of `forward_path`.
    ///
    /// Returns the session and the request packet to send along
    /// `forward_path`.
    pub fn start(
        hive_id: HiveId,
        forward_path: Vec<NodeId>,
        origin: NodeId,
        local: &Digest,
        probe: ProbeMode,
    ) -> Result<(Self, Packet)> {
        if forward_path.is_empty() {
            return Err(SyncError::InvalidPacket("empty forward path".into()));
        }
        if forward_path.len() > limits::MAX_PATH_HOPS {
            return Err(SyncError::InvalidPacket("forward path too long".into()));
        }

        let session = Self {
            id: SessionId::new(),
            hive_id,
            forward_path,
            state: InitiatorState::AwaitingResponse,
            reprobed: false,
            pushed: Vec::new(),
            received: 0,
        };
        let request = session.request(local, origin, probe);
        Ok((session, request))
    }

    fn request(&self, local: &Digest, origin: NodeId, probe: ProbeMode) -> Packet {
        let keys = match probe {
            ProbeMode::RootOnly => None,
            ProbeMode::FullDigest => Some(local.keys.clone()),
        };
        Packet::new(
            self.hive_id,
            PacketKind::SyncRequest(SyncEnvelope {
                session_id: self.id,
                request_root_hash: local.root_hash,
                request_digest_keys: keys,
                response_item_guids: None,
                return_path: return_path(&self.forward_path, origin),
            }),
        )
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn hive_id(&self) -> HiveId {
        self.hive_id
    }

    pub fn state(&self) -> InitiatorState {
        self.state
    }

    pub fn forward_path(&self) -> &[NodeId] {
        &self.forward_path
    }

    /// Items pushed to the responder so far.
    pub fn pushed(&self) -> &[ItemGuid] {
        &self.pushed
    }

    /// Items received from the responder so far.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Count an item that arrived for this session.
    pub fn record_received(&mut self) {
        self.received += 1;
    }

    /// Handle the responder's answer.
    ///
    /// Pushes the counter-delta when bidirectional, and after a root-only
    /// probe re-sends the request with the full digest.
    pub async fn on_response<R, T>(
        &mut self,
        response: &SyncEnvelope,
        replica: &R,
        transport: &T,
        config: &SyncConfig,
    ) -> Result<InitiatorState>
    where
        R: Replica + ?Sized,
        T: Transport + ?Sized,
    {
        if self.state != InitiatorState::AwaitingResponse {
            return Err(SyncError::OutOfOrder("on_response"));
        }
        if response.session_id != self.id {
            return Err(SyncError::UnknownSession(response.session_id));
        }

        let local = replica.build_digest().await?;
        if compare_root(&local, &response.request_root_hash) {
            self.state = InitiatorState::Done;
            return Ok(self.state);
        }

        if config.bidirectional {
            if let Some(keys) = response.request_digest_keys.as_deref() {
                let mut counter = diff_digest(&local, Some(keys));
                counter.truncate(config.delta_cap());
                tracing::debug!(session = %self.id, counter = counter.len(), "pushing counter-delta");
                let report =
                    push_delta(replica, transport, self.id, &counter, &self.forward_path).await?;
                self.pushed.extend(report.pushed);
            }
        }

        if response.response_item_guids.is_none() && !self.reprobed {
            self.reprobed = true;
            let request = self.request(&local, transport.local_node_id(), ProbeMode::FullDigest);
            transport.send_along_path(request, &self.forward_path).await?;
            return Ok(self.state);
        }

        self.state = InitiatorState::Done;
        Ok(self.state)
    }
}
