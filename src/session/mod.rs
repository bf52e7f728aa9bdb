//! Session management.
//!
//! A [`SessionManager`] owns one logical connection to the hub. Transport
//! callbacks feed an inbound queue that a single controller task drains, so
//! lifecycle state and the peer roster have exactly one writer.

mod lifecycle;
mod manager;
mod observer;
mod outbound;

pub use lifecycle::LifecycleState;
pub use manager::SessionManager;
pub use observer::{ChannelObserver, SessionEvent, SessionObserver};

use crate::config::{Config, EventsConfig};
use std::time::Duration;

/// Behavioural settings for a [`SessionManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Fixed delay between reconnect attempts.
    pub retry_delay: Duration,
    /// Event pushed by the hub when a peer joins.
    pub peer_joined_event: String,
    /// Event pushed by the hub when a peer leaves.
    pub peer_left_event: String,
    /// Hub method used by [`SessionManager::send_to_all`].
    pub relay_method: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        let events = EventsConfig::default();
        Self {
            retry_delay: Duration::from_millis(5000),
            peer_joined_event: events.peer_joined,
            peer_left_event: events.peer_left,
            relay_method: events.relay_method,
        }
    }
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            retry_delay: config.retry_delay(),
            peer_joined_event: config.events.peer_joined.clone(),
            peer_left_event: config.events.peer_left.clone(),
            relay_method: config.events.relay_method.clone(),
        }
    }
}

impl SessionOptions {
    /// Override the reconnect delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}
