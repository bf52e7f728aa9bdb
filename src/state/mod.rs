//! State management module.
//!
//! Contains the peer roster: the ordered set of remote peers currently
//! present in the session.

mod roster;

pub use roster::{Join, Peer, Roster};
