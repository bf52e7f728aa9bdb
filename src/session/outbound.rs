//! Outbound relay.
//!
//! A relay is a single invocation of the hub's relay method with the
//! positional arguments `(event, correlation_id, encoded_payload)`. The
//! payload travels as a JSON-encoded string so the hub never inspects it.

use crate::error::DispatchError;
use crate::transport::Transport;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Build the relay arguments for `payload`.
pub(super) fn relay_args<T>(
    event: &str,
    correlation_id: Uuid,
    payload: &T,
) -> Result<Vec<Value>, DispatchError>
where
    T: Serialize + ?Sized,
{
    let encoded = serde_json::to_string(payload).map_err(|source| DispatchError::Encode {
        event: event.to_string(),
        source,
    })?;
    Ok(vec![
        Value::String(event.to_string()),
        Value::String(correlation_id.to_string()),
        Value::String(encoded),
    ])
}

/// Invoke `method` on the hub with prepared relay arguments.
pub(super) async fn relay(
    transport: &dyn Transport,
    method: &str,
    args: Vec<Value>,
) -> Result<(), DispatchError> {
    transport.invoke(method, args).await?;
    Ok(())
}
