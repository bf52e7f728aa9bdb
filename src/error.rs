//! Unified error handling for rosterlink.
//!
//! None of these errors is fatal: they are logged with their
//! [`error_code`](TransportError::error_code) as a structured label and the
//! session carries on (usually by scheduling a reconnect).

use rosterlink_proto::ProtocolError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

// ============================================================================
// Transport Errors (open / invoke / close)
// ============================================================================

/// Errors raised by a [`Transport`](crate::transport::Transport).
///
/// Cloneable so a single failure can be fanned out to every closed-callback.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("timed out during {0}")]
    Timeout(&'static str),

    #[error("connection closed{}", .0.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    Closed(Option<String>),

    #[error("transport is not open")]
    NotOpen,

    #[error("remote invocation of {method} failed: {reason}")]
    Invoke { method: String, reason: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("websocket error: {0}")]
    WebSocket(String),
}

impl TransportError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect_failed",
            Self::Handshake(_) => "handshake_failed",
            Self::Timeout(_) => "timeout",
            Self::Closed(_) => "closed",
            Self::NotOpen => "not_open",
            Self::Invoke { .. } => "invoke_failed",
            Self::Protocol(_) => "protocol_error",
            Self::WebSocket(_) => "websocket_error",
        }
    }
}

impl From<ProtocolError> for TransportError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::HandshakeRejected(reason) => Self::Handshake(reason),
            other => Self::Protocol(other.to_string()),
        }
    }
}

impl From<tungstenite::Error> for TransportError {
    fn from(e: tungstenite::Error) -> Self {
        match e {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                Self::Closed(None)
            }
            other => Self::WebSocket(other.to_string()),
        }
    }
}

// ============================================================================
// Handler Errors (inbound decode and dispatch)
// ============================================================================

/// Errors local to one inbound handler invocation.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("event {event} delivered {got} arguments, expected 2")]
    Arity { event: String, got: usize },

    #[error("failed to decode payload for {event}: {source}")]
    Decode {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("event {event} carried a non-numeric value")]
    NotNumeric { event: String },
}

impl HandlerError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Arity { .. } => "bad_arity",
            Self::Decode { .. } => "decode_failed",
            Self::NotNumeric { .. } => "not_numeric",
        }
    }
}

// ============================================================================
// Dispatch Errors (outbound relay)
// ============================================================================

/// Errors from the fire-and-forget outbound path. Never returned to callers.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to encode payload for {event}: {source}")]
    Encode {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DispatchError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Encode { .. } => "encode_failed",
            Self::Transport(e) => e.error_code(),
        }
    }
}
