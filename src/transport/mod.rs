//! Hub transport abstraction.
//!
//! The session drives a [`Transport`]: open, subscribe to named events,
//! invoke remote methods and observe connection loss. [`WsTransport`] is
//! the websocket implementation; tests substitute their own.

mod websocket;

pub use websocket::{WsSettings, WsTransport};

use crate::error::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Callback for a subscribed event. Receives the positional arguments.
pub type EventCallback = Arc<dyn Fn(Vec<Value>) + Send + Sync>;

/// Callback fired when an established connection is lost.
///
/// `None` means the remote side closed without giving a reason.
pub type ClosedCallback = Arc<dyn Fn(Option<TransportError>) + Send + Sync>;

/// A bidirectional, named-event connection to the hub.
///
/// Subscriptions and closed-callbacks are registered once and survive
/// reconnects: a later successful `open` resumes delivery to them.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the connection. Completes once the hub accepted the
    /// handshake. Opening an already open transport is a no-op.
    async fn open(&self) -> Result<(), TransportError>;

    /// Tear down the connection. Closed-callbacks are not fired for a
    /// local close.
    async fn close(&self);

    /// Subscribe `callback` to the event `event`.
    fn on(&self, event: &str, callback: EventCallback);

    /// Invoke a remote method and wait for its completion.
    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<(), TransportError>;

    /// Register a connection-lost callback.
    fn on_closed(&self, callback: ClosedCallback);
}

/// Supplies the `Cookie` header for the websocket upgrade request.
pub trait CookieProvider: Send + Sync {
    /// Header value, or `None` to send no cookie.
    fn cookie_header(&self) -> Option<String>;
}

/// A fixed cookie header, typically from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticCookies(pub Option<String>);

impl CookieProvider for StaticCookies {
    fn cookie_header(&self) -> Option<String> {
        self.0.clone().filter(|c| !c.trim().is_empty())
    }
}
