//! Peer roster.
//!
//! An insertion-ordered collection of [`Peer`]s keyed by display name.
//! Display names are unique at any instant; a join for a name that is
//! already present refreshes its connection id instead of adding a
//! second entry.

use serde::{Deserialize, Serialize};

/// A remote participant in the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    /// Unique among current peers.
    pub display_name: String,
    /// Opaque handle assigned by the transport.
    pub connection_id: String,
}

impl Peer {
    pub fn new(display_name: impl Into<String>, connection_id: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            connection_id: connection_id.into(),
        }
    }
}

/// Outcome of [`Roster::join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Join {
    /// The display name was unknown; the peer was appended.
    Added(Peer),
    /// The display name was known; its connection id was replaced.
    Refreshed(Peer),
}

/// Ordered peer collection, join order preserved.
#[derive(Debug, Default)]
pub struct Roster {
    peers: Vec<Peer>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer, or refresh the connection id of an existing one.
    pub fn join(&mut self, display_name: &str, connection_id: &str) -> Join {
        match self.position(display_name) {
            Some(i) => {
                let peer = &mut self.peers[i];
                peer.connection_id = connection_id.to_string();
                Join::Refreshed(peer.clone())
            }
            None => {
                let peer = Peer::new(display_name, connection_id);
                self.peers.push(peer.clone());
                Join::Added(peer)
            }
        }
    }

    /// Index of the peer with `display_name`, if present.
    pub fn position(&self, display_name: &str) -> Option<usize> {
        self.peers.iter().position(|p| p.display_name == display_name)
    }

    pub fn find(&self, display_name: &str) -> Option<&Peer> {
        self.peers.iter().find(|p| p.display_name == display_name)
    }

    /// Remove and return the peer with `display_name`. `None` leaves the
    /// roster untouched.
    pub fn remove(&mut self, display_name: &str) -> Option<Peer> {
        self.position(display_name).map(|i| self.peers.remove(i))
    }

    /// Remove every peer, returning them in join order.
    pub fn drain(&mut self) -> Vec<Peer> {
        std::mem::take(&mut self.peers)
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
