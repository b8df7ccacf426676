//! Transport abstraction for the sync protocol.
//!
//! The transport unicasts packets along an explicit sequence of relay hops.
//! Connection lifecycle, handshakes and retries belong to the
//! implementation; the protocol only ever asks for path delivery.

use async_trait::async_trait;

use crate::error::{Result, SyncError};
use crate::messages::{NodeId, Packet};

/// Transport trait for path-routed packet delivery.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a packet through `path`, in order. The last hop is the
    /// destination. Never broadcasts.
    async fn send_along_path(&self, packet: Packet, path: &[NodeId]) -> Result<()>;

    /// Get the local node's identity.
    fn local_node_id(&self) -> NodeId;
}

/// Path a reply takes back to the sender of a packet that travelled
/// `forward`, sent by `origin`. The destination hop is dropped and the
/// remaining relays reversed, ending at `origin`.
pub fn return_path(forward: &[NodeId], origin: NodeId) -> Vec<NodeId> {
    let relays = forward.len().saturating_sub(1);
    forward[..relays]
        .iter()
        .rev()
        .copied()
        .chain(std::iter::once(origin))
        .collect()
}

/// An in-memory relay overlay for testing.
///
/// Every node registers the producer half of its packet queue. Delivery
/// checks each hop is reachable, round-trips the packet through its byte
/// encoding, and enqueues it at the final hop.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::sync::RwLock;

    use crate::queue::PacketSender;

    /// A delivered packet, as seen by the network.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Delivery {
        /// Sending node.
        pub from: NodeId,
        /// Hops traversed, destination last.
        pub path: Vec<NodeId>,
        /// Packet kind name.
        pub kind: &'static str,
    }

    /// Shared state for the memory relay network.
    #[derive(Default)]
    pub struct MemoryNetwork {
        /// Queue producers for each node.
        nodes: RwLock<HashMap<NodeId, PacketSender>>,
        /// Every successful delivery, in order.
        log: Mutex<Vec<Delivery>>,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Attach a node whose inbound packets go to `inbox`.
        pub async fn connect(self: &Arc<Self>, node_id: NodeId, inbox: PacketSender) -> MemoryTransport {
            self.nodes.write().await.insert(node_id, inbox);
            MemoryTransport {
                node_id,
                network: Arc::clone(self),
            }
        }

        /// Attach a pure relay: reachable as a hop but never a destination.
        pub async fn add_relay(&self, node_id: NodeId) {
            let (tx, _rx) = crate::queue::PacketQueue::new();
            self.nodes.write().await.insert(node_id, tx);
        }

        /// Detach a node. Paths through it fail afterwards.
        pub async fn disconnect(&self, node_id: &NodeId) {
            self.nodes.write().await.remove(node_id);
        }

        /// Deliveries made so far.
        pub fn deliveries(&self) -> Vec<Delivery> {
            self.log.lock().map(|log| log.clone()).unwrap_or_default()
        }

        /// Forget recorded deliveries.
        pub fn clear_deliveries(&self) {
            if let Ok(mut log) = self.log.lock() {
                log.clear();
            }
        }
    }

    /// In-memory transport for one node.
    pub struct MemoryTransport {
        node_id: NodeId,
        network: Arc<MemoryNetwork>,
    }

    impl MemoryTransport {
        /// The network this transport is attached to.
        pub fn network(&self) -> &Arc<MemoryNetwork> {
            &self.network
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send_along_path(&self, packet: Packet, path: &[NodeId]) -> Result<()> {
            let destination = path
                .last()
                .ok_or_else(|| SyncError::TransportError("empty path".into()))?;

            let nodes = self.network.nodes.read().await;
            if let Some(hop) = path.iter().find(|hop| !nodes.contains_key(hop)) {
                return Err(SyncError::TransportError(format!("unreachable hop {}", hop)));
            }

            let kind = packet.kind_name();
            let wire = packet.to_bytes()?;
            let received = Packet::from_bytes(&wire)?;

            let inbox = nodes
                .get(destination)
                .ok_or_else(|| SyncError::TransportError(format!("unreachable hop {}", destination)))?;
            inbox.enqueue(received)?;

            if let Ok(mut log) = self.network.log.lock() {
                log.push(Delivery {
                    from: self.node_id,
                    path: path.to_vec(),
                    kind,
                });
            }
            tracing::trace!(from = %self.node_id, to = %destination, hops = path.len(), kind, "delivered packet");
            Ok(())
        }

        fn local_node_id(&self) -> NodeId {
            self.node_id
        }
    }
}
