//! Hub protocol handshake.
//!
//! The client opens with a [`HandshakeRequest`] naming the protocol; the
//! server answers with an empty object or an object carrying `error`.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::record::frame;

/// Protocol name sent in the handshake.
pub const PROTOCOL_NAME: &str = "json";

/// Protocol version sent in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// First record sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    /// Protocol name, always `json` for this crate.
    pub protocol: String,
    /// Protocol version.
    pub version: u32,
}

impl Default for HandshakeRequest {
    fn default() -> Self {
        Self {
            protocol: PROTOCOL_NAME.to_string(),
            version: PROTOCOL_VERSION,
        }
    }
}

impl HandshakeRequest {
    /// Serialize and frame the request.
    pub fn to_record(&self) -> String {
        // A struct of a String and a u32 always serializes.
        let json = serde_json::to_string(self).unwrap_or_default();
        frame(&json)
    }
}

/// Server answer to the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeResponse {
    /// Set when the server refused the handshake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HandshakeResponse {
    /// Parse a single (unframed) record.
    pub fn parse(record: &str) -> Result<Self> {
        Ok(serde_json::from_str(record)?)
    }

    /// Turn a rejection into an error.
    pub fn into_result(self) -> Result<()> {
        match self.error {
            Some(reason) => Err(ProtocolError::HandshakeRejected(reason)),
            None => Ok(()),
        }
    }
}
