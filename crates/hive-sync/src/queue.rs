//! Inbound packet queue.
//!
//! Many producers (transport tasks), one consumer (the tick loop). Popping
//! never blocks.

use tokio::sync::mpsc;

use crate::error::{Result, SyncError};
use crate::messages::Packet;

/// Producer half: cloneable, usable from any task or thread.
#[derive(Debug, Clone)]
pub struct PacketSender {
    tx: mpsc::UnboundedSender<Packet>,
}

impl PacketSender {
    /// Append a packet to the queue.
    pub fn enqueue(&self, packet: Packet) -> Result<()> {
        self.tx
            .send(packet)
            .map_err(|_| SyncError::TransportError("packet queue closed".into()))
    }
}

/// Consumer half, owned by the tick loop.
#[derive(Debug)]
pub struct PacketQueue {
    rx: mpsc::UnboundedReceiver<Packet>,
}

impl PacketQueue {
    /// Create a queue and its producer handle.
    pub fn new() -> (PacketSender, PacketQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PacketSender { tx }, PacketQueue { rx })
    }

    /// Pop the oldest packet, if any. Never waits.
    pub fn try_get_next_packet(&mut self) -> Option<Packet> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next packet. `None` once every sender is gone.
    pub async fn next_packet(&mut self) -> Option<Packet> {
        self.rx.recv().await
    }
}
