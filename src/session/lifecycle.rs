//! Connection lifecycle state machine.
//!
//! The [`Controller`] is the only writer of lifecycle state and of the
//! roster. It drains commands one at a time; an open attempt is awaited
//! inline, so peer events queued during the attempt are only applied after
//! `on_connected` has been delivered.

use super::manager::Inner;
use crate::error::TransportError;
use crate::state::Join;
use crate::telemetry::{AttemptTimer, spans};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{Instrument, debug, error, info, trace, warn};

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Created, never connected.
    Idle,
    /// An open attempt is in flight.
    Connecting,
    Connected,
    /// Disconnected with a reconnect scheduled.
    Retrying,
    /// Terminal.
    Disposed,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Retrying => "retrying",
            Self::Disposed => "disposed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Work items for the controller task.
pub(super) enum Command {
    Connect {
        identity: String,
        reply: oneshot::Sender<LifecycleState>,
    },
    /// A retry timer fired. Stale epochs are ignored.
    Retry { epoch: u64 },
    PeerJoined(Vec<Value>),
    PeerLeft(Vec<Value>),
    Closed(Option<TransportError>),
}

pub(super) struct Controller {
    inner: Arc<Inner>,
    inbound: mpsc::UnboundedReceiver<Command>,
    /// Bumped on every scheduled retry and every explicit connect.
    retry_epoch: u64,
}

impl Controller {
    pub(super) fn new(inner: Arc<Inner>, inbound: mpsc::UnboundedReceiver<Command>) -> Self {
        Self {
            inner,
            inbound,
            retry_epoch: 0,
        }
    }

    pub(super) async fn run(mut self) {
        loop {
            let command = tokio::select! {
                biased;
                _ = self.inner.shutdown.cancelled() => break,
                command = self.inbound.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };

            match command {
                Command::Connect { identity, reply } => {
                    let state = self.handle_connect(identity).await;
                    let _ = reply.send(state);
                }
                Command::Retry { epoch } => self.handle_retry(epoch).await,
                Command::PeerJoined(args) => self.handle_join(args),
                Command::PeerLeft(args) => self.handle_leave(args),
                Command::Closed(error) => self.handle_closed(error),
            }
        }
        debug!("Session controller stopped");
    }

    // ========================================================================
    // Connect / fail / retry
    // ========================================================================

    async fn handle_connect(&mut self, identity: String) -> LifecycleState {
        if self.inner.is_disposed() {
            return LifecycleState::Disposed;
        }
        *self.inner.identity.write() = Some(identity);

        match self.inner.state() {
            state @ (LifecycleState::Connected | LifecycleState::Connecting) => state,
            LifecycleState::Retrying => {
                // Connect now; the scheduled retry becomes stale.
                self.retry_epoch += 1;
                self.attempt().await
            }
            _ => self.attempt().await,
        }
    }

    async fn handle_retry(&mut self, epoch: u64) {
        if self.inner.is_disposed() {
            return;
        }
        if epoch != self.retry_epoch {
            trace!(epoch, current = self.retry_epoch, "Ignoring stale retry");
            return;
        }
        if self.inner.state() != LifecycleState::Retrying {
            return;
        }
        debug!("Retrying connection");
        self.attempt().await;
    }

    async fn attempt(&mut self) -> LifecycleState {
        let identity = self.inner.identity.read().clone().unwrap_or_default();
        let span = spans::session(&identity);

        async {
            let _timer = AttemptTimer::new(identity.as_str());
            if self.inner.transition(LifecycleState::Connecting).is_none() {
                return LifecycleState::Disposed;
            }

            let opened = tokio::select! {
                _ = self.inner.shutdown.cancelled() => return LifecycleState::Disposed,
                opened = self.inner.transport.open() => opened,
            };

            match opened {
                Ok(()) => {
                    if self.inner.transition(LifecycleState::Connected).is_none() {
                        return LifecycleState::Disposed;
                    }
                    info!("Connection started");
                    self.inner.notify(|o| o.on_connected());
                    LifecycleState::Connected
                }
                Err(e) => {
                    self.fail(e);
                    self.inner.state()
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Record a failure, report loss of an established connection and
    /// schedule the next attempt.
    fn fail(&mut self, error: TransportError) {
        warn!(error = %error, error_code = error.error_code(), "Connection failed");

        let Some(previous) = self.inner.transition(LifecycleState::Retrying) else {
            return;
        };

        if previous == LifecycleState::Connected {
            self.inner.notify(|o| o.on_disconnected());
            let dropped = self.inner.roster.write().drain();
            for peer in &dropped {
                self.inner.notify(|o| o.on_peer_disconnected(peer));
            }
        }

        self.schedule_retry();
    }

    fn schedule_retry(&mut self) {
        self.retry_epoch += 1;
        let epoch = self.retry_epoch;
        let delay = self.inner.options.retry_delay;
        let shutdown = self.inner.shutdown.clone();
        let commands = self.inner.commands.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = commands.send(Command::Retry { epoch });
                }
            }
        });
        debug!(delay_ms = delay.as_millis() as u64, epoch, "Reconnect scheduled");
    }

    fn handle_closed(&mut self, error: Option<TransportError>) {
        if self.inner.state() != LifecycleState::Connected {
            trace!(state = %self.inner.state(), "Ignoring close outside a connection");
            return;
        }
        self.fail(error.unwrap_or(TransportError::Closed(None)));
    }

    // ========================================================================
    // Roster
    // ========================================================================

    /// Validate a peer event and return `(display_name, connection_id)`,
    /// or `None` when it must be ignored.
    fn peer_event<'a>(&self, kind: &'static str, args: &'a [Value]) -> Option<(&'a str, &'a str)> {
        if self.inner.state() != LifecycleState::Connected {
            trace!(kind, "Ignoring peer event while not connected");
            return None;
        }

        let (Some(name), Some(connection_id)) = (
            args.first().and_then(Value::as_str),
            args.get(1).and_then(Value::as_str),
        ) else {
            warn!(kind, args = args.len(), "Malformed peer event");
            return None;
        };

        let is_self = self.inner.identity.read().as_deref() == Some(name);
        if is_self {
            trace!(kind, "Ignoring peer event for the local identity");
            return None;
        }
        Some((name, connection_id))
    }

    fn handle_join(&mut self, args: Vec<Value>) {
        let Some((name, connection_id)) = self.peer_event("join", &args) else {
            return;
        };

        let join = self.inner.roster.write().join(name, connection_id);
        match join {
            Join::Added(peer) => {
                debug!(display_name = %peer.display_name, connection_id = %peer.connection_id, "Peer connected");
                self.inner.notify(|o| o.on_peer_connected(&peer));
            }
            Join::Refreshed(peer) => {
                debug!(display_name = %peer.display_name, connection_id = %peer.connection_id, "Peer rejoined");
            }
        }
    }

    fn handle_leave(&mut self, args: Vec<Value>) {
        let Some((name, connection_id)) = self.peer_event("leave", &args) else {
            return;
        };

        let peer = self.inner.roster.read().find(name).cloned();
        match peer {
            Some(peer) => {
                debug!(display_name = %peer.display_name, connection_id = %peer.connection_id, "Peer disconnected");
                self.inner.notify(|o| o.on_peer_disconnected(&peer));
                self.inner.roster.write().remove(name);
            }
            None => {
                error!(display_name = name, connection_id, "Peer not found on disconnection");
            }
        }
    }
}
