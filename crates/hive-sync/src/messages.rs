//! Sync protocol packet types.
//!
//! Packets are exchanged between hubs, possibly through several relays, to
//! converge the replicas of a hive.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hive_core::{Blake3Hash, HiveId, ItemGuid, ItemRecord};

use crate::error::{Result, SyncError};

/// Unique identifier for a node in the relay overlay.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub [u8; 32]);

impl NodeId {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a random node ID.
    pub fn random() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", &hex::encode(self.0)[..8])
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0[..4]))
    }
}

/// Identifies one reconciliation attempt, chosen by the initiator.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a fresh session id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 0;

/// Packet size limits.
pub mod limits {
    /// Max keys in a digest carried by a request or response.
    pub const MAX_DIGEST_KEYS: usize = 100_000;
    /// Max guids in a response's pushed-item list.
    pub const MAX_RESPONSE_GUIDS: usize = 10_000;
    /// Max relay hops in a return path.
    pub const MAX_PATH_HOPS: usize = 32;
}

/// A packet addressed to one hive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    /// Protocol version of the sender.
    pub version: u8,
    /// The hive this packet concerns.
    pub hive_id: HiveId,
    /// What the packet carries.
    pub kind: PacketKind,
}

/// Packet variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PacketKind {
    /// Opens (or re-opens) a session: "here is my state".
    SyncRequest(SyncEnvelope),
    /// Closes a responder's part of a session.
    SyncResponse(SyncEnvelope),
    /// One replicated unit pushed as part of a session's delta.
    Item {
        /// Session the item belongs to.
        session_id: SessionId,
        /// The item itself.
        payload: HivePayload,
    },
}

/// Reconciliation fields shared by requests and responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEnvelope {
    /// Session this envelope belongs to.
    pub session_id: SessionId,
    /// Root hash of the sender's digest.
    pub request_root_hash: Blake3Hash,
    /// Sorted digest keys of the sender. `None` on a root-only probe.
    pub request_digest_keys: Option<Vec<String>>,
    /// Guids the sender pushed in this session. Only set on responses that
    /// follow a full digest comparison.
    pub response_item_guids: Option<Vec<ItemGuid>>,
    /// Hops leading back to the sender, in travel order.
    pub return_path: Vec<NodeId>,
}

/// Payload of an item packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HivePayload {
    /// A content item, merged into the replica.
    Post(ItemRecord),
    /// A feed reference, surfaced to the feed collaborator.
    Feed(FeedRef),
    /// A member reference, surfaced to the membership collaborator.
    Member(MemberRef),
}

/// Reference to an external feed shared within a hive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRef {
    pub url: String,
    pub title: String,
}

/// Reference to a hive member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRef {
    pub name: String,
    pub node_id: NodeId,
}

impl Packet {
    /// Create a packet at the current protocol version.
    pub fn new(hive_id: HiveId, kind: PacketKind) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            hive_id,
            kind,
        }
    }

    /// Session this packet belongs to.
    pub fn session_id(&self) -> SessionId {
        match &self.kind {
            PacketKind::SyncRequest(env) | PacketKind::SyncResponse(env) => env.session_id,
            PacketKind::Item { session_id, .. } => *session_id,
        }
    }

    /// Short name of the packet kind, for logs.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            PacketKind::SyncRequest(_) => "sync_request",
            PacketKind::SyncResponse(_) => "sync_response",
            PacketKind::Item { .. } => "item",
        }
    }

    /// Encode to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| SyncError::InvalidPacket(format!("encode: {}", e)))?;
        Ok(Bytes::from(buf))
    }

    /// Decode from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let packet: Packet = ciborium::from_reader(bytes)
            .map_err(|e| SyncError::InvalidPacket(format!("decode: {}", e)))?;
        if packet.version != PROTOCOL_VERSION {
            return Err(SyncError::VersionMismatch {
                local: PROTOCOL_VERSION,
                peer: packet.version,
            });
        }
        Ok(packet)
    }

    /// Check if this packet respects size limits.
    pub fn validate_limits(&self) -> std::result::Result<(), &'static str> {
        match &self.kind {
            PacketKind::SyncRequest(env) | PacketKind::SyncResponse(env) => {
                if env
                    .request_digest_keys
                    .as_ref()
                    .is_some_and(|k| k.len() > limits::MAX_DIGEST_KEYS)
                {
                    return Err("too many digest keys");
                }
                if env
                    .response_item_guids
                    .as_ref()
                    .is_some_and(|g| g.len() > limits::MAX_RESPONSE_GUIDS)
                {
                    return Err("too many response guids");
                }
                if env.return_path.len() > limits::MAX_PATH_HOPS {
                    return Err("return path too long");
                }
            }
            PacketKind::Item { .. } => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_core::ContentItem;

    fn envelope() -> SyncEnvelope {
        SyncEnvelope {
            session_id: SessionId::new(),
            request_root_hash: Blake3Hash::anchor(),
            request_digest_keys: Some(vec![]),
            response_item_guids: None,
            return_path: vec![NodeId::from_bytes([1; 32])],
        }
    }

    #[test]
    fn test_packet_bytes_preserve_content() {
        let item = ContentItem::new(ItemGuid::from_bytes([3; 16]), "hi", "alice", 1000);
        let packet = Packet::new(
            HiveId::from_bytes([7; 16]),
            PacketKind::Item {
                session_id: SessionId::new(),
                payload: HivePayload::Post(ItemRecord::from(&item)),
            },
        );
        let decoded = Packet::from_bytes(&packet.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_garbage_rejected() {
        let err = Packet::from_bytes(b"not cbor at all").unwrap_err();
        assert!(matches!(err, SyncError::InvalidPacket(_)));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut packet = Packet::new(HiveId::new(), PacketKind::SyncRequest(envelope()));
        packet.version = PROTOCOL_VERSION + 1;
        let bytes = packet.to_bytes().unwrap();
        assert!(matches!(
            Packet::from_bytes(&bytes),
            Err(SyncError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_limits_valid() {
        let packet = Packet::new(HiveId::new(), PacketKind::SyncRequest(envelope()));
        assert!(packet.validate_limits().is_ok());
    }

    #[test]
    fn test_limits_path_too_long() {
        let mut env = envelope();
        env.return_path = vec![NodeId::from_bytes([0; 32]); limits::MAX_PATH_HOPS + 1];
        let packet = Packet::new(HiveId::new(), PacketKind::SyncResponse(env));
        assert_eq!(packet.validate_limits(), Err("return path too long"));
    }

    #[test]
    fn test_limits_too_many_guids() {
        let mut env = envelope();
        env.response_item_guids =
            Some(vec![ItemGuid::from_bytes([0; 16]); limits::MAX_RESPONSE_GUIDS + 1]);
        let packet = Packet::new(HiveId::new(), PacketKind::SyncResponse(env));
        assert!(packet.validate_limits().is_err());
    }

    #[test]
    fn test_session_id_accessor() {
        let env = envelope();
        let id = env.session_id;
        let packet = Packet::new(HiveId::new(), PacketKind::SyncResponse(env));
        assert_eq!(packet.session_id(), id);
        assert_eq!(packet.kind_name(), "sync_response");
    }
}
