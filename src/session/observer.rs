//! Session observer trait.
//!
//! Observers are notified of lifecycle transitions and roster changes.
//! Notifications for one session are delivered sequentially from the
//! session's controller task, in the order the changes happened.

use crate::state::Peer;
use tokio::sync::mpsc;

/// Trait for observing a session.
///
/// Every method has an empty default so observers implement only what they
/// need. Implementations must not block: they run on the controller task.
pub trait SessionObserver: Send + Sync {
    /// Called once per successful connect, before any peer of that
    /// connection is reported.
    fn on_connected(&self) {}

    /// Called when an established connection is lost. Every peer still in
    /// the roster is then reported through
    /// [`on_peer_disconnected`](Self::on_peer_disconnected).
    fn on_disconnected(&self) {}

    /// Called when a new display name joins.
    fn on_peer_connected(&self, _peer: &Peer) {}

    /// Called when a known peer leaves, while it is still in the roster.
    fn on_peer_disconnected(&self, _peer: &Peer) {}
}

/// Owned form of an observer notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    PeerConnected(Peer),
    PeerDisconnected(Peer),
}

/// Observer that forwards every notification into a channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }

    /// Create an observer and the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn forward(&self, event: SessionEvent) {
        // A dropped receiver just means nobody listens any more.
        let _ = self.tx.send(event);
    }
}

impl SessionObserver for ChannelObserver {
    fn on_connected(&self) {
        self.forward(SessionEvent::Connected);
    }

    fn on_disconnected(&self) {
        self.forward(SessionEvent::Disconnected);
    }

    fn on_peer_connected(&self, peer: &Peer) {
        self.forward(SessionEvent::PeerConnected(peer.clone()));
    }

    fn on_peer_disconnected(&self, peer: &Peer) {
        self.forward(SessionEvent::PeerDisconnected(peer.clone()));
    }
}
