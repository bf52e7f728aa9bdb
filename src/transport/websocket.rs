//! Websocket transport speaking the JSON hub protocol.
//!
//! One link task per open connection owns the socket. Callers talk to it
//! through an unbounded outbound queue; completions come back through
//! per-invocation oneshot channels.

use super::{ClosedCallback, CookieProvider, EventCallback, Transport};
use crate::config::{Config, TransportConfig};
use crate::error::TransportError;
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use rosterlink_proto::{HandshakeRequest, HandshakeResponse, HubMessage, RecordReader};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Timing knobs for [`WsTransport`].
#[derive(Debug, Clone, Copy)]
pub struct WsSettings {
    /// Upper bound for TCP/TLS connect plus the protocol handshake.
    pub handshake_timeout: Duration,
    /// Interval between protocol pings while connected.
    pub keepalive_interval: Duration,
    /// How long an invocation waits for its completion.
    pub invoke_timeout: Duration,
}

impl Default for WsSettings {
    fn default() -> Self {
        Self::from(&TransportConfig::default())
    }
}

impl From<&TransportConfig> for WsSettings {
    fn from(config: &TransportConfig) -> Self {
        Self {
            handshake_timeout: Duration::from_secs(config.handshake_timeout_secs),
            keepalive_interval: Duration::from_secs(config.keepalive_interval_secs),
            invoke_timeout: Duration::from_secs(config.invoke_timeout_secs),
        }
    }
}

struct PendingInvoke {
    method: String,
    reply: oneshot::Sender<Result<(), TransportError>>,
}

/// State shared between the transport handle and its link task.
#[derive(Default)]
struct Shared {
    subscriptions: DashMap<String, Vec<EventCallback>>,
    closed_callbacks: RwLock<Vec<ClosedCallback>>,
    pending: DashMap<String, PendingInvoke>,
}

impl Shared {
    fn fail_pending(&self, reason: &TransportError) {
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, pending)) = self.pending.remove(&id) {
                let _ = pending.reply.send(Err(reason.clone()));
            }
        }
    }

    fn fire_closed(&self, error: Option<TransportError>) {
        // Snapshot so callbacks may register further callbacks.
        let callbacks = self.closed_callbacks.read().clone();
        for callback in callbacks {
            callback(error.clone());
        }
    }

    /// Handle one inbound record. Returns `Some` when the hub closed.
    fn handle_record(&self, record: &str) -> Option<LinkEnd> {
        let message = match HubMessage::parse(record) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, error_code = e.error_code(), "Ignoring malformed record");
                return None;
            }
        };

        match message {
            HubMessage::Invocation { target, arguments, .. } => {
                let callbacks = self.subscriptions.get(&target).map(|c| c.value().clone());
                match callbacks {
                    Some(callbacks) => {
                        for callback in callbacks {
                            callback(arguments.clone());
                        }
                    }
                    None => trace!(%target, "No subscription for event"),
                }
            }
            HubMessage::Completion { invocation_id, error, .. } => {
                match self.pending.remove(&invocation_id) {
                    Some((_, pending)) => {
                        let result = match error {
                            Some(reason) => Err(TransportError::Invoke {
                                method: pending.method,
                                reason,
                            }),
                            None => Ok(()),
                        };
                        let _ = pending.reply.send(result);
                    }
                    None => debug!(%invocation_id, "Completion for unknown invocation"),
                }
            }
            HubMessage::Ping => trace!("Ping from hub"),
            HubMessage::Close { error, allow_reconnect } => {
                info!(?error, allow_reconnect, "Hub closed the connection");
                return Some(LinkEnd::Remote(error.map(|e| TransportError::Closed(Some(e)))));
            }
            HubMessage::Unknown(raw) => debug!(message_type = raw, "Ignoring unknown message type"),
        }
        None
    }
}

/// Why the link task stopped.
enum LinkEnd {
    Local,
    Remote(Option<TransportError>),
}

struct Link {
    outbound: mpsc::UnboundedSender<Message>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Link {
    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }
}

/// [`Transport`] over a websocket to a JSON hub.
pub struct WsTransport {
    endpoint: String,
    cookies: Arc<dyn CookieProvider>,
    settings: WsSettings,
    shared: Arc<Shared>,
    link: Mutex<Option<Link>>,
    next_invocation: AtomicU64,
}

impl WsTransport {
    /// Create a transport for `endpoint` (a `ws://` or `wss://` URL).
    pub fn new(
        endpoint: impl Into<String>,
        cookies: Arc<dyn CookieProvider>,
        settings: WsSettings,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            cookies,
            settings,
            shared: Arc::new(Shared::default()),
            link: Mutex::new(None),
            next_invocation: AtomicU64::new(1),
        }
    }

    /// Create a transport from the `[server]` and `[transport]` sections.
    pub fn from_config(config: &Config, cookies: Arc<dyn CookieProvider>) -> Self {
        Self::new(config.endpoint(), cookies, WsSettings::from(&config.transport))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn connect(&self) -> Result<(WsStream, RecordReader, Vec<String>), TransportError> {
        let connect_err = |reason: String| TransportError::Connect {
            endpoint: self.endpoint.clone(),
            reason,
        };

        let mut request = self
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| connect_err(e.to_string()))?;
        if let Some(cookie) = self.cookies.cookie_header() {
            let value = HeaderValue::from_str(&cookie).map_err(|e| connect_err(e.to_string()))?;
            request.headers_mut().insert(header::COOKIE, value);
        }

        let (mut ws, _response) = connect_async(request)
            .await
            .map_err(|e| connect_err(e.to_string()))?;

        ws.send(Message::Text(HandshakeRequest::default().to_record())).await?;

        let mut reader = RecordReader::new();
        loop {
            let Some(frame) = ws.next().await else {
                return Err(TransportError::Closed(None));
            };
            match frame? {
                Message::Text(text) => {
                    let mut records = reader.feed(&text);
                    if let Some(first) = records.next() {
                        HandshakeResponse::parse(&first)?.into_result()?;
                        let backlog = records.collect();
                        return Ok((ws, reader, backlog));
                    }
                }
                Message::Close(frame) => {
                    return Err(TransportError::Handshake(
                        frame
                            .map(|f| f.reason.to_string())
                            .unwrap_or_else(|| "closed during handshake".to_string()),
                    ));
                }
                _ => {}
            }
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self) -> Result<(), TransportError> {
        let mut link = self.link.lock().await;
        if link.as_ref().is_some_and(Link::is_live) {
            return Ok(());
        }

        let (ws, reader, backlog) =
            tokio::time::timeout(self.settings.handshake_timeout, self.connect())
                .await
                .map_err(|_| TransportError::Timeout("handshake"))??;
        debug!(endpoint = %self.endpoint, "Handshake accepted");

        let (sink, stream) = ws.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_link(
            sink,
            stream,
            reader,
            backlog,
            outbound_rx,
            cancel.clone(),
            Arc::clone(&self.shared),
            self.settings.keepalive_interval,
        ));

        *link = Some(Link {
            outbound,
            cancel,
            task,
        });
        Ok(())
    }

    async fn close(&self) {
        let link = self.link.lock().await.take();
        if let Some(link) = link {
            link.cancel.cancel();
            if let Err(e) = link.task.await {
                warn!(error = %e, "Link task ended abnormally");
            }
        }
    }

    fn on(&self, event: &str, callback: EventCallback) {
        self.shared
            .subscriptions
            .entry(event.to_string())
            .or_default()
            .push(callback);
    }

    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<(), TransportError> {
        let outbound = {
            let link = self.link.lock().await;
            link.as_ref()
                .filter(|l| l.is_live())
                .map(|l| l.outbound.clone())
                .ok_or(TransportError::NotOpen)?
        };

        let id = self.next_invocation.fetch_add(1, Ordering::Relaxed).to_string();
        let (reply, rx) = oneshot::channel();
        self.shared.pending.insert(
            id.clone(),
            PendingInvoke {
                method: method.to_string(),
                reply,
            },
        );

        let record = HubMessage::invocation_with_id(id.as_str(), method, args).to_record();
        if outbound.send(Message::Text(record)).is_err() {
            self.shared.pending.remove(&id);
            return Err(TransportError::NotOpen);
        }

        match tokio::time::timeout(self.settings.invoke_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::Closed(None)),
            Err(_) => {
                self.shared.pending.remove(&id);
                Err(TransportError::Timeout("invoke"))
            }
        }
    }

    fn on_closed(&self, callback: ClosedCallback) {
        self.shared.closed_callbacks.write().push(callback);
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            link.cancel.cancel();
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_link(
    mut sink: SplitSink<WsStream, Message>,
    mut stream: SplitStream<WsStream>,
    mut reader: RecordReader,
    backlog: Vec<String>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    cancel: CancellationToken,
    shared: Arc<Shared>,
    keepalive: Duration,
) {
    let mut end = backlog.iter().find_map(|record| shared.handle_record(record));

    let mut ping = tokio::time::interval_at(tokio::time::Instant::now() + keepalive, keepalive);

    while end.is_none() {
        tokio::select! {
            _ = cancel.cancelled() => end = Some(LinkEnd::Local),
            Some(message) = outbound.recv() => {
                if let Err(e) = sink.send(message).await {
                    end = Some(LinkEnd::Remote(Some(e.into())));
                }
            }
            _ = ping.tick() => {
                if let Err(e) = sink.send(Message::Text(HubMessage::Ping.to_record())).await {
                    end = Some(LinkEnd::Remote(Some(e.into())));
                }
            }
            frame = stream.next() => match frame {
                None => end = Some(LinkEnd::Remote(None)),
                Some(Err(e)) => end = Some(LinkEnd::Remote(Some(e.into()))),
                Some(Ok(Message::Text(text))) => {
                    end = reader.feed(&text).find_map(|record| shared.handle_record(&record));
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                    end = Some(LinkEnd::Remote(reason.map(|r| TransportError::Closed(Some(r)))));
                }
                Some(Ok(Message::Binary(_))) => debug!("Ignoring binary frame"),
                Some(Ok(_)) => {}
            },
        }
    }

    // Mark the link dead and stop accepting invocations first. Anything
    // queued before the receiver closed is already in `pending`.
    cancel.cancel();
    outbound.close();

    match end {
        Some(LinkEnd::Remote(error)) => {
            let reason = error.clone().unwrap_or(TransportError::Closed(None));
            shared.fail_pending(&reason);
            let _ = sink.close().await;
            info!(error = ?error, "Connection lost");
            shared.fire_closed(error);
        }
        Some(LinkEnd::Local) | None => {
            shared.fail_pending(&TransportError::Closed(None));
            let _ = sink.close().await;
            debug!("Link closed locally");
        }
    }
}
