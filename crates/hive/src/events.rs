//! Typed event bus.
//!
//! Events are published on a broadcast channel owned by the [`Hub`]. A
//! subscriber simply drops its receiver when done; nothing needs to be
//! unregistered.
//!
//! [`Hub`]: crate::Hub

use hive_core::{HiveId, ItemGuid};
use hive_sync::{FeedRef, MemberRef, SessionId};

/// Which side of a session this hub played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    Initiator,
    Responder,
}

/// Something that happened to a hive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HiveEvent {
    /// A replicated item replaced (or created) the local copy.
    ItemApplied {
        hive_id: HiveId,
        guid: ItemGuid,
        version: u64,
    },
    /// Two copies of an item advanced independently. `applied` tells
    /// whether the incoming copy was kept.
    ConflictDetected {
        hive_id: HiveId,
        guid: ItemGuid,
        applied: bool,
    },
    /// A peer shared a feed reference.
    FeedAnnounced { hive_id: HiveId, feed: FeedRef },
    /// A peer shared a member reference.
    MemberAnnounced { hive_id: HiveId, member: MemberRef },
    /// This hub finished its part of a session.
    SessionCompleted {
        hive_id: HiveId,
        session_id: SessionId,
        role: SessionRole,
        /// Items this hub pushed.
        pushed: usize,
        /// Items this hub received for the session.
        received: usize,
    },
}

impl HiveEvent {
    /// The hive the event concerns.
    pub fn hive_id(&self) -> HiveId {
        match self {
            HiveEvent::ItemApplied { hive_id, .. }
            | HiveEvent::ConflictDetected { hive_id, .. }
            | HiveEvent::FeedAnnounced { hive_id, .. }
            | HiveEvent::MemberAnnounced { hive_id, .. }
            | HiveEvent::SessionCompleted { hive_id, .. } => *hive_id,
        }
    }
}
