//! Hub protocol messages.
//!
//! Records are JSON objects discriminated by a numeric `type` field. Only
//! the message types a presence client needs are modelled; any other type
//! parses as [`HubMessage::Unknown`] so callers can skip it.

use serde_json::{json, Map, Value};

use crate::error::{ProtocolError, Result};
use crate::record::frame;

/// Numeric `type` values defined by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Call a method on the other side.
    Invocation = 1,
    /// Item of a streaming result.
    StreamItem = 2,
    /// Result of an invocation that carried an id.
    Completion = 3,
    /// Start a streaming invocation.
    StreamInvocation = 4,
    /// Cancel a streaming invocation.
    CancelInvocation = 5,
    /// Keep-alive.
    Ping = 6,
    /// Orderly connection close.
    Close = 7,
}

impl MessageType {
    /// Map a raw `type` value.
    pub fn from_u64(raw: u64) -> Option<Self> {
        Some(match raw {
            1 => Self::Invocation,
            2 => Self::StreamItem,
            3 => Self::Completion,
            4 => Self::StreamInvocation,
            5 => Self::CancelInvocation,
            6 => Self::Ping,
            7 => Self::Close,
            _ => return None,
        })
    }
}

/// A decoded hub record.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// Method call. Without an `invocation_id` no completion is expected.
    Invocation {
        /// Correlates the later [`HubMessage::Completion`].
        invocation_id: Option<String>,
        /// Method (or event) name.
        target: String,
        /// Positional arguments.
        arguments: Vec<Value>,
    },
    /// Outcome of an invocation.
    Completion {
        /// Id of the invocation being completed.
        invocation_id: String,
        /// Return value, if any.
        result: Option<Value>,
        /// Remote error text, if the invocation failed.
        error: Option<String>,
    },
    /// Keep-alive.
    Ping,
    /// The server is closing the connection.
    Close {
        /// Reason given by the server.
        error: Option<String>,
        /// Whether the server permits reconnecting.
        allow_reconnect: bool,
    },
    /// A message type this crate does not handle.
    Unknown(u64),
}

impl HubMessage {
    /// Build a non-blocking invocation.
    pub fn invocation(target: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self::Invocation {
            invocation_id: None,
            target: target.into(),
            arguments,
        }
    }

    /// Build an invocation that expects a completion.
    pub fn invocation_with_id(
        invocation_id: impl Into<String>,
        target: impl Into<String>,
        arguments: Vec<Value>,
    ) -> Self {
        Self::Invocation {
            invocation_id: Some(invocation_id.into()),
            target: target.into(),
            arguments,
        }
    }

    /// Parse one unframed record.
    pub fn parse(record: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(record)?;
        let Value::Object(mut obj) = value else {
            return Err(ProtocolError::NotAnObject);
        };
        let raw_type = obj
            .get("type")
            .and_then(Value::as_u64)
            .ok_or(ProtocolError::MissingType)?;

        match MessageType::from_u64(raw_type) {
            Some(MessageType::Invocation) => {
                let target = take_string(&mut obj, "target")
                    .ok_or(ProtocolError::MissingField { message_type: raw_type, field: "target" })?;
                let arguments = match obj.remove("arguments") {
                    Some(Value::Array(args)) => args,
                    None | Some(Value::Null) => Vec::new(),
                    Some(_) => {
                        return Err(ProtocolError::MissingField {
                            message_type: raw_type,
                            field: "arguments",
                        })
                    }
                };
                Ok(Self::Invocation {
                    invocation_id: take_string(&mut obj, "invocationId"),
                    target,
                    arguments,
                })
            }
            Some(MessageType::Completion) => {
                let invocation_id = take_string(&mut obj, "invocationId").ok_or(
                    ProtocolError::MissingField { message_type: raw_type, field: "invocationId" },
                )?;
                Ok(Self::Completion {
                    invocation_id,
                    result: obj.remove("result"),
                    error: take_string(&mut obj, "error"),
                })
            }
            Some(MessageType::Ping) => Ok(Self::Ping),
            Some(MessageType::Close) => Ok(Self::Close {
                error: take_string(&mut obj, "error"),
                allow_reconnect: obj
                    .get("allowReconnect")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            }),
            _ => Ok(Self::Unknown(raw_type)),
        }
    }

    /// Serialize and frame this message.
    pub fn to_record(&self) -> String {
        let value = match self {
            Self::Invocation { invocation_id, target, arguments } => {
                let mut obj = json!({
                    "type": MessageType::Invocation as u8,
                    "target": target,
                    "arguments": arguments,
                });
                if let Some(id) = invocation_id {
                    obj["invocationId"] = json!(id);
                }
                obj
            }
            Self::Completion { invocation_id, result, error } => {
                let mut obj = json!({
                    "type": MessageType::Completion as u8,
                    "invocationId": invocation_id,
                });
                if let Some(result) = result {
                    obj["result"] = result.clone();
                }
                if let Some(error) = error {
                    obj["error"] = json!(error);
                }
                obj
            }
            Self::Ping => json!({ "type": MessageType::Ping as u8 }),
            Self::Close { error, allow_reconnect } => {
                let mut obj = json!({
                    "type": MessageType::Close as u8,
                    "allowReconnect": allow_reconnect,
                });
                if let Some(error) = error {
                    obj["error"] = json!(error);
                }
                obj
            }
            Self::Unknown(raw) => json!({ "type": raw }),
        };
        frame(&value.to_string())
    }
}

fn take_string(obj: &mut Map<String, Value>, key: &str) -> Option<String> {
    match obj.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}
