//! Inbound message handlers.
//!
//! This module contains the handler registry and the dispatch entry point
//! the session wires into the transport for every subscribed event.
//!
//! Every handled event carries exactly two arguments: the correlation id of
//! the intended group and the payload. Every handler registered for the event
//! sees it; those whose id does not match drop it without decoding.

mod registry;

pub use registry::{Delivery, HandlerRegistry, Registration};

use crate::error::HandlerError;
use crate::telemetry::spans;
use serde_json::Value;
use tracing::{error, trace, warn};

/// Dispatch one inbound event and log the outcome.
///
/// Failures are local to this event: they are logged and never reach the
/// transport or the session.
pub fn dispatch_event(registry: &HandlerRegistry, event: &str, args: Vec<Value>) {
    let _span = spans::dispatch(event).entered();

    match registry.dispatch(event, args) {
        Ok(Delivery::Delivered) => {}
        Ok(delivery) => trace!(?delivery, "Event not delivered"),
        Err(e @ HandlerError::Decode { .. }) => {
            error!(error = %e, error_code = e.error_code(), "Failed to deserialize message");
        }
        Err(e) => {
            warn!(error = %e, error_code = e.error_code(), "Dropping malformed event");
        }
    }
}
