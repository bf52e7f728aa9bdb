//! In-memory transport.
//!
//! Records every interaction and lets tests push events and connection
//! loss by hand. Callbacks run inline on the caller's task.

use async_trait::async_trait;
use parking_lot::Mutex;
use rosterlink::{ClosedCallback, EventCallback, Transport, TransportError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::Instant;

#[derive(Default)]
pub struct MockTransport {
    subscriptions: Mutex<HashMap<String, Vec<EventCallback>>>,
    closed_callbacks: Mutex<Vec<ClosedCallback>>,
    fail_open: AtomicBool,
    fail_invoke: AtomicBool,
    open: AtomicBool,
    open_attempts: Mutex<Vec<Instant>>,
    invocations: Mutex<Vec<(String, Vec<Value>)>>,
    closes: AtomicUsize,
}

impl MockTransport {
    /// A transport whose `open` succeeds.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A transport whose `open` always fails.
    pub fn failing() -> Arc<Self> {
        let transport = Self::new();
        transport.set_fail_open(true);
        transport
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_invoke(&self, fail: bool) {
        self.fail_invoke.store(fail, Ordering::SeqCst);
    }

    /// Push an event to every subscriber. Returns how many callbacks ran.
    pub fn emit(&self, event: &str, args: Vec<Value>) -> usize {
        let callbacks = self
            .subscriptions
            .lock()
            .get(event)
            .cloned()
            .unwrap_or_default();
        for callback in &callbacks {
            callback(args.clone());
        }
        callbacks.len()
    }

    /// Simulate loss of the established connection.
    pub fn drop_connection(&self, error: Option<TransportError>) {
        self.open.store(false, Ordering::SeqCst);
        let callbacks = self.closed_callbacks.lock().clone();
        for callback in callbacks {
            callback(error.clone());
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize {
        self.open_attempts.lock().len()
    }

    /// Instants of every `open` call, in order.
    pub fn open_times(&self) -> Vec<Instant> {
        self.open_attempts.lock().clone()
    }

    pub fn invocations(&self) -> Vec<(String, Vec<Value>)> {
        self.invocations.lock().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.subscriptions.lock().get(event).map_or(0, Vec::len)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self) -> Result<(), TransportError> {
        self.open_attempts.lock().push(Instant::now());
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(TransportError::Connect {
                endpoint: "mock://hub".into(),
                reason: "connection refused".into(),
            });
        }
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn on(&self, event: &str, callback: EventCallback) {
        self.subscriptions
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(callback);
    }

    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        self.invocations.lock().push((method.to_string(), args));
        if self.fail_invoke.load(Ordering::SeqCst) {
            return Err(TransportError::Invoke {
                method: method.to_string(),
                reason: "hub rejected the call".into(),
            });
        }
        Ok(())
    }

    fn on_closed(&self, callback: ClosedCallback) {
        self.closed_callbacks.lock().push(callback);
    }
}
