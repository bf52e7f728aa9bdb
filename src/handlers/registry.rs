//! Handler registry and dispatch.
//!
//! The `HandlerRegistry` maps event names to every [`Registration`] made for
//! them: a correlation id plus a decode-and-invoke closure captured when the
//! caller registered. Many objects listen on one event name, each with its
//! own id, so an event is offered to all of them and each one filters on its
//! id. Decoding only happens after the correlation id matched.

use crate::error::HandlerError;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

type Deliver = Box<dyn Fn(&str, Value) -> Result<(), HandlerError> + Send + Sync>;

/// One registered handler.
pub struct Registration {
    correlation_id: Uuid,
    kind: &'static str,
    deliver: Deliver,
}

impl Registration {
    /// Handler whose payload is a JSON document decoded into `T`.
    ///
    /// The payload may arrive either as an encoded JSON string or as an
    /// already structured value.
    pub fn json<T, F>(correlation_id: Uuid, callback: F) -> Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let deliver = move |event: &str, payload: Value| {
            let decoded = match payload {
                Value::String(encoded) => serde_json::from_str::<T>(&encoded),
                other => serde_json::from_value::<T>(other),
            };
            let value = decoded.map_err(|source| HandlerError::Decode {
                event: event.to_string(),
                source,
            })?;
            callback(value);
            Ok(())
        };
        Self {
            correlation_id,
            kind: "json",
            deliver: Box::new(deliver),
        }
    }

    /// Handler whose payload is already a number; no decode step.
    pub fn numeric<F>(correlation_id: Uuid, callback: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        let deliver = move |event: &str, payload: Value| {
            let value = payload.as_f64().ok_or_else(|| HandlerError::NotNumeric {
                event: event.to_string(),
            })?;
            callback(value);
            Ok(())
        };
        Self {
            correlation_id,
            kind: "numeric",
            deliver: Box::new(deliver),
        }
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// `"json"` or `"numeric"`.
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("correlation_id", &self.correlation_id)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Result of a successful [`HandlerRegistry::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// At least one callback ran with a decoded value.
    Delivered,
    /// No registration matched the event's (possibly unreadable) correlation id.
    Mismatched,
    /// No handler is registered for the event.
    Unhandled,
    /// The registry was closed.
    Closed,
}

/// Registry of inbound handlers, keyed by event name.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Vec<Arc<Registration>>>>,
    /// Events already subscribed on the transport. Never shrinks: the
    /// transport contract has no unsubscribe.
    subscribed: Mutex<HashSet<String>>,
    closed: AtomicBool,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler for `event`. Earlier registrations stay active.
    ///
    /// Returns `true` when the caller must subscribe `event` on the
    /// transport, i.e. the first time this event name is seen.
    pub fn insert(&self, event: &str, registration: Registration) -> bool {
        self.handlers
            .write()
            .entry(event.to_string())
            .or_default()
            .push(Arc::new(registration));
        self.subscribed.lock().insert(event.to_string())
    }

    /// Remove every handler for `event` and return how many there were.
    /// Later events with that name are reported as [`Delivery::Unhandled`].
    pub fn remove(&self, event: &str) -> usize {
        self.handlers.write().remove(event).map_or(0, |r| r.len())
    }

    pub fn contains(&self, event: &str) -> bool {
        self.handlers.read().contains_key(event)
    }

    /// Correlation ids registered for `event`, in registration order.
    pub fn correlation_ids(&self, event: &str) -> Vec<Uuid> {
        self.handlers
            .read()
            .get(event)
            .map(|regs| regs.iter().map(|r| r.correlation_id).collect())
            .unwrap_or_default()
    }

    /// Number of event names with at least one handler.
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Stop delivering events. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Route one inbound event carrying `(correlation_id, payload)`.
    pub fn dispatch(&self, event: &str, args: Vec<Value>) -> Result<Delivery, HandlerError> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(Delivery::Closed);
        }

        // Clone out of the lock so callbacks run unlocked.
        let Some(registrations) = self.handlers.read().get(event).cloned() else {
            return Ok(Delivery::Unhandled);
        };

        let [id, payload]: [Value; 2] = args.try_into().map_err(|args: Vec<Value>| {
            HandlerError::Arity {
                event: event.to_string(),
                got: args.len(),
            }
        })?;

        let Some(id) = id.as_str().and_then(|s| Uuid::parse_str(s).ok()) else {
            return Ok(Delivery::Mismatched);
        };

        let mut delivered = false;
        let mut failure = None;
        for registration in registrations.iter().filter(|r| r.correlation_id == id) {
            match (registration.deliver)(event, payload.clone()) {
                Ok(()) => delivered = true,
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None if delivered => Ok(Delivery::Delivered),
            None => Ok(Delivery::Mismatched),
        }
    }
}
