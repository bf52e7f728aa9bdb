//! Observers and waiting helpers.

use parking_lot::Mutex;
use rosterlink::{Peer, SessionEvent, SessionManager, SessionObserver};
use std::time::Duration;
use tokio::sync::mpsc;

/// Records every notification in order.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, wanted: &SessionEvent) -> usize {
        self.events.lock().iter().filter(|e| *e == wanted).count()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_connected(&self) {
        self.events.lock().push(SessionEvent::Connected);
    }

    fn on_disconnected(&self) {
        self.events.lock().push(SessionEvent::Disconnected);
    }

    fn on_peer_connected(&self, peer: &Peer) {
        self.events.lock().push(SessionEvent::PeerConnected(peer.clone()));
    }

    fn on_peer_disconnected(&self, peer: &Peer) {
        self.events.lock().push(SessionEvent::PeerDisconnected(peer.clone()));
    }
}

/// Next notification from a session event stream, or panic after 5s.
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("session event stream closed")
}

/// Wait until the controller has processed everything queued so far.
///
/// Commands are handled in order, so a `connect` for the identity already
/// in use (a no-op while connected) acts as a barrier.
pub async fn flush(session: &SessionManager) {
    let identity = session.identity().unwrap_or_default();
    session.connect(identity).await;
}

/// Poll `condition` until it holds, or panic after 5s.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
