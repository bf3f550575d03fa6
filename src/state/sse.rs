//! Fan-out of floor events to the SSE clients connected to this node.

use tokio::sync::broadcast;
use tracing::debug;

use crate::dto::sse::ServerEvent;

/// Broadcast channel feeding every `/sse/floor` client of the node.
///
/// A client that falls more than `capacity` events behind skips ahead; the next
/// `stations.snapshot` brings it back in sync.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Attach a floor client; it only sees events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        let receiver = self.sender.subscribe();
        debug!(clients = self.clients(), "floor SSE client attached");
        receiver
    }

    /// Floor clients currently attached.
    pub fn clients(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Send `event` to every attached client and return how many were reached. No client is
    /// fine: nobody is watching the floor.
    pub fn broadcast(&self, event: ServerEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}
