//! # rosterlink-proto
//!
//! Framing and message types for the JSON hub protocol spoken by
//! presence/messaging servers.
//!
//! ## Features
//!
//! - Record framing (JSON documents terminated by `0x1E`)
//! - Handshake request/response
//! - Invocation, completion, ping and close messages
//!
//! ## Quick Start
//!
//! ```rust
//! use rosterlink_proto::{HubMessage, RecordReader};
//! use serde_json::json;
//!
//! let msg = HubMessage::invocation("SendToAll", vec![json!("move"), json!("{}")]);
//! let wire = msg.to_record();
//!
//! let mut reader = RecordReader::new();
//! let parsed: Vec<_> = reader.feed(&wire).collect();
//! assert_eq!(parsed.len(), 1);
//! assert_eq!(HubMessage::parse(&parsed[0]).unwrap(), msg);
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod handshake;
pub mod message;
pub mod record;

pub use self::error::{ProtocolError, Result};
pub use self::handshake::{HandshakeRequest, HandshakeResponse, PROTOCOL_NAME, PROTOCOL_VERSION};
pub use self::message::{HubMessage, MessageType};
pub use self::record::{RecordReader, RECORD_SEPARATOR};
