//! Telemetry utilities for connect-attempt timing and span construction.

use std::time::Instant;

/// Guard for timing a connect attempt.
///
/// Logs the attempt latency at debug level when dropped.
pub struct AttemptTimer {
    identity: String,
    start: Instant,
}

impl AttemptTimer {
    /// Start timing an attempt.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for AttemptTimer {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!(identity = %self.identity, elapsed_ms, "Connect attempt finished");
    }
}

/// Standardized span constructors for session observability.
pub mod spans {
    use tracing::{Span, debug_span, info_span};

    /// Create a span for one connect attempt of a session.
    pub fn session(identity: &str) -> Span {
        info_span!("session", identity = %identity)
    }

    /// Create a span for an inbound event dispatch.
    pub fn dispatch(event: &str) -> Span {
        debug_span!("dispatch", event = %event)
    }

    /// Create a span for an outbound relay.
    pub fn relay(event: &str, method: &str) -> Span {
        debug_span!("relay", event = %event, method = %method)
    }
}
