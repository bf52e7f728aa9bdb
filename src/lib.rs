//! rosterlink - resilient presence/messaging hub client.
//!
//! Keeps one logical connection to a hub alive, reconnecting at a fixed
//! interval after failures, tracks which remote peers are present, and
//! routes correlation-filtered typed messages between local callers and
//! those peers.
//!
//! The entry point is [`SessionManager`]. It is generic over the
//! [`Transport`] it drives; [`WsTransport`] speaks the JSON hub protocol
//! over a websocket.

pub mod config;
pub mod error;
pub mod handlers;
pub mod session;
pub mod state;
pub mod telemetry;
pub mod transport;

pub use config::Config;
pub use error::{DispatchError, HandlerError, TransportError};
pub use handlers::{Delivery, HandlerRegistry, Registration};
pub use session::{
    ChannelObserver, LifecycleState, SessionEvent, SessionManager, SessionObserver, SessionOptions,
};
pub use state::{Peer, Roster};
pub use transport::{
    ClosedCallback, CookieProvider, EventCallback, StaticCookies, Transport, WsSettings,
    WsTransport,
};
