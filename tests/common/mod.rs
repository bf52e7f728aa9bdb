//! Integration test common infrastructure.
//!
//! Provides an in-memory transport, a websocket hub double, observers that
//! record notifications, and a log capture for asserting on reports that
//! only surface through tracing.

#![allow(dead_code)]

pub mod hub;
pub mod logs;
pub mod observer;
pub mod transport;

#[allow(unused_imports)]
pub use hub::{FakeHub, HubConnection};
#[allow(unused_imports)]
pub use logs::LogCapture;
#[allow(unused_imports)]
pub use observer::{RecordingObserver, flush, next_event, wait_until};
#[allow(unused_imports)]
pub use transport::MockTransport;
