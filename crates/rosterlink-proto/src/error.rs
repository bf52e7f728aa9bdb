//! Error types for the hub protocol library.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Top-level protocol errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The record was not valid JSON.
    #[error("malformed record: {0}")]
    Json(#[from] serde_json::Error),

    /// The record was valid JSON but not an object.
    #[error("record is not a JSON object")]
    NotAnObject,

    /// The `type` field was missing or not an unsigned integer.
    #[error("record has no message type")]
    MissingType,

    /// A field required by the message type was absent or had the wrong shape.
    #[error("message type {message_type} is missing field `{field}`")]
    MissingField {
        /// Numeric message type of the record.
        message_type: u64,
        /// Name of the missing field.
        field: &'static str,
    },

    /// The server rejected the handshake.
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),
}

impl ProtocolError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Json(_) => "malformed_json",
            Self::NotAnObject => "not_an_object",
            Self::MissingType => "missing_type",
            Self::MissingField { .. } => "missing_field",
            Self::HandshakeRejected(_) => "handshake_rejected",
        }
    }
}
