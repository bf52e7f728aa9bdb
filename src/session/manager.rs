//! Session manager: the caller-facing handle.

use super::lifecycle::{Command, Controller, LifecycleState};
use super::observer::{ChannelObserver, SessionEvent, SessionObserver};
use super::{SessionOptions, outbound};
use crate::config::Config;
use crate::handlers::{HandlerRegistry, Registration, dispatch_event};
use crate::state::{Peer, Roster};
use crate::telemetry::spans;
use crate::transport::{CookieProvider, Transport, WsTransport};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, trace, warn};
use uuid::Uuid;

/// State shared between the manager handle, the controller task and
/// transport callbacks.
pub(super) struct Inner {
    pub(super) transport: Arc<dyn Transport>,
    pub(super) options: SessionOptions,
    pub(super) registry: Arc<HandlerRegistry>,
    pub(super) roster: RwLock<Roster>,
    state: RwLock<LifecycleState>,
    pub(super) identity: RwLock<Option<String>>,
    observers: RwLock<Vec<Arc<dyn SessionObserver>>>,
    disposed: AtomicBool,
    pub(super) shutdown: CancellationToken,
    pub(super) commands: mpsc::UnboundedSender<Command>,
}

impl Inner {
    pub(super) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(super) fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    /// Move to `next` unless the session is disposed. Returns the state
    /// that was replaced.
    pub(super) fn transition(&self, next: LifecycleState) -> Option<LifecycleState> {
        let mut state = self.state.write();
        if *state == LifecycleState::Disposed || self.is_disposed() {
            return None;
        }
        Some(std::mem::replace(&mut *state, next))
    }

    /// Call `f` on every observer. No lock is held during the calls.
    pub(super) fn notify(&self, f: impl Fn(&dyn SessionObserver)) {
        let observers = self.observers.read().clone();
        for observer in &observers {
            f(observer.as_ref());
        }
    }

    fn mark_disposed(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        *self.state.write() = LifecycleState::Disposed;
        self.shutdown.cancel();
        self.registry.close();
        true
    }
}

/// Client-side manager for one hub session.
///
/// Must be created inside a tokio runtime: construction spawns the
/// controller task. Every operation is a no-op once the manager has been
/// disposed.
pub struct SessionManager {
    inner: Arc<Inner>,
    controller: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    /// Create a manager driving `transport`.
    pub fn new(transport: Arc<dyn Transport>, options: SessionOptions) -> Self {
        let (commands, inbound) = mpsc::unbounded_channel();

        let joined = commands.clone();
        transport.on(
            &options.peer_joined_event,
            Arc::new(move |args| {
                let _ = joined.send(Command::PeerJoined(args));
            }),
        );
        let left = commands.clone();
        transport.on(
            &options.peer_left_event,
            Arc::new(move |args| {
                let _ = left.send(Command::PeerLeft(args));
            }),
        );
        let closed = commands.clone();
        transport.on_closed(Arc::new(move |error| {
            let _ = closed.send(Command::Closed(error));
        }));

        let inner = Arc::new(Inner {
            transport,
            options,
            registry: Arc::new(HandlerRegistry::new()),
            roster: RwLock::new(Roster::new()),
            state: RwLock::new(LifecycleState::Idle),
            identity: RwLock::new(None),
            observers: RwLock::new(Vec::new()),
            disposed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            commands,
        });

        let controller = tokio::spawn(Controller::new(Arc::clone(&inner), inbound).run());

        Self {
            inner,
            controller: Mutex::new(Some(controller)),
        }
    }

    /// Create a manager with a websocket transport built from `config`.
    pub fn from_config(config: &Config, cookies: Arc<dyn CookieProvider>) -> Self {
        let transport = Arc::new(WsTransport::from_config(config, cookies));
        Self::new(transport, SessionOptions::from(config))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Store `identity` and open the connection.
    ///
    /// Completes once the first attempt succeeded or failed; a failed
    /// attempt leaves the session in [`LifecycleState::Retrying`] with a
    /// reconnect scheduled. Returns the state after the attempt.
    pub async fn connect(&self, identity: impl Into<String>) -> LifecycleState {
        if self.inner.is_disposed() {
            return LifecycleState::Disposed;
        }

        let (reply, rx) = oneshot::channel();
        let command = Command::Connect {
            identity: identity.into(),
            reply,
        };
        if self.inner.commands.send(command).is_err() {
            return self.state();
        }
        rx.await.unwrap_or(LifecycleState::Disposed)
    }

    /// Close the transport and stop every pending and future retry.
    /// Idempotent.
    pub async fn dispose(&self) {
        if !self.inner.mark_disposed() {
            return;
        }

        let controller = self.controller.lock().take();
        if let Some(controller) = controller
            && let Err(e) = controller.await
        {
            warn!(error = %e, "Session controller ended abnormally");
        }

        self.inner.transport.close().await;
        info!("Session disposed");
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LifecycleState::Connected
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Identity given to the last [`connect`](Self::connect).
    pub fn identity(&self) -> Option<String> {
        self.inner.identity.read().clone()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    // ========================================================================
    // Roster and observers
    // ========================================================================

    /// Snapshot of the current peers, in join order.
    pub fn peers(&self) -> Vec<Peer> {
        self.inner.roster.read().peers().to_vec()
    }

    pub fn add_observer(&self, observer: Arc<dyn SessionObserver>) {
        if self.inner.is_disposed() {
            return;
        }
        self.inner.observers.write().push(observer);
    }

    /// Subscribe to session notifications as a stream of [`SessionEvent`]s.
    pub fn events(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (observer, rx) = ChannelObserver::channel();
        self.add_observer(Arc::new(observer));
        rx
    }

    // ========================================================================
    // Inbound handlers
    // ========================================================================

    /// Deliver `event` payloads tagged with `correlation_id` to `callback`,
    /// decoded as `T`.
    ///
    /// Events carrying any other correlation id are dropped without
    /// decoding. A payload that fails to decode is logged and skipped; the
    /// handler stays registered. Registering the same event again adds a
    /// handler alongside the earlier ones; each filters on its own id.
    pub fn register_handler<T, F>(&self, event: &str, correlation_id: Uuid, callback: F)
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.register(event, Registration::json(correlation_id, callback));
    }

    /// Like [`register_handler`](Self::register_handler) for payloads that
    /// are plain numbers.
    pub fn register_numeric_handler<F>(&self, event: &str, correlation_id: Uuid, callback: F)
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.register(event, Registration::numeric(correlation_id, callback));
    }

    /// Remove every handler for `event`. Returns whether any was registered.
    pub fn unregister_handler(&self, event: &str) -> bool {
        if self.inner.is_disposed() {
            return false;
        }
        let removed = self.inner.registry.remove(event);
        debug!(event, removed, "Handlers unregistered");
        removed > 0
    }

    fn register(&self, event: &str, registration: Registration) {
        if self.inner.is_disposed() {
            return;
        }

        let correlation_id = registration.correlation_id();
        let kind = registration.kind();
        if self.inner.registry.insert(event, registration) {
            let registry = Arc::clone(&self.inner.registry);
            let name = event.to_string();
            self.inner.transport.on(
                event,
                Arc::new(move |args| dispatch_event(&registry, &name, args)),
            );
        }
        debug!(event, kind, %correlation_id, "Handler registered");
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    /// Relay `payload` to every peer as `event`, tagged with
    /// `correlation_id`.
    ///
    /// Does nothing unless connected. Never blocks and never reports
    /// failures to the caller; they are logged.
    pub fn send_to_all<T>(&self, event: &str, correlation_id: Uuid, payload: &T)
    where
        T: Serialize + ?Sized,
    {
        if self.inner.is_disposed() || !self.is_connected() {
            trace!(event, "Not connected, dropping outbound message");
            return;
        }

        let args = match outbound::relay_args(event, correlation_id, payload) {
            Ok(args) => args,
            Err(e) => {
                warn!(error = %e, error_code = e.error_code(), "Failed to send message");
                return;
            }
        };

        let inner = Arc::clone(&self.inner);
        let span = spans::relay(event, &inner.options.relay_method);
        tokio::spawn(
            async move {
                if inner.is_disposed() {
                    return;
                }
                if let Err(e) =
                    outbound::relay(inner.transport.as_ref(), &inner.options.relay_method, args)
                        .await
                {
                    warn!(error = %e, error_code = e.error_code(), "Failed to send message");
                }
            }
            .instrument(span),
        );
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if !self.inner.mark_disposed() {
            return;
        }
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let transport = Arc::clone(&self.inner.transport);
            runtime.spawn(async move { transport.close().await });
        }
    }
}
