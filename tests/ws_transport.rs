//! Integration tests for the websocket transport against a loopback hub.

mod common;

use common::{FakeHub, next_event};
use rosterlink::{
    LifecycleState, Peer, SessionEvent, SessionManager, SessionOptions, StaticCookies, Transport,
    TransportError, WsSettings, WsTransport,
};
use rosterlink_proto::HubMessage;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn transport_for(hub: &FakeHub, cookie: Option<&str>) -> Arc<WsTransport> {
    let settings = WsSettings {
        handshake_timeout: Duration::from_secs(5),
        keepalive_interval: Duration::from_secs(60),
        invoke_timeout: Duration::from_secs(5),
    };
    Arc::new(WsTransport::new(
        hub.endpoint(),
        Arc::new(StaticCookies(cookie.map(str::to_string))),
        settings,
    ))
}

async fn recv_timeout<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out")
        .expect("channel closed")
}

#[tokio::test]
async fn test_open_handshakes_and_delivers_events() {
    let hub = FakeHub::bind().await;
    let transport = transport_for(&hub, Some("session=abc"));

    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<Value>>();
    transport.on("OnConnected", Arc::new(move |args| {
        let _ = tx.send(args);
    }));

    let (opened, mut conn) = tokio::join!(transport.open(), hub.accept_session());
    opened.unwrap();
    assert_eq!(conn.cookie(), Some("session=abc"));

    conn.send(&HubMessage::invocation("OnConnected", vec![json!("bob"), json!("c2")]))
        .await;
    assert_eq!(recv_timeout(&mut rx).await, vec![json!("bob"), json!("c2")]);

    // Opening an open transport does not dial again.
    transport.open().await.unwrap();
    transport.close().await;
}

#[tokio::test]
async fn test_invoke_waits_for_completion() {
    let hub = FakeHub::bind().await;
    let transport = transport_for(&hub, None);
    let (opened, mut conn) = tokio::join!(transport.open(), hub.accept_session());
    opened.unwrap();
    assert_eq!(conn.cookie(), None);

    let caller = Arc::clone(&transport);
    let call = tokio::spawn(async move {
        caller
            .invoke("SendToAll", vec![json!("move"), json!("id"), json!("{}")])
            .await
    });

    let HubMessage::Invocation { invocation_id: Some(id), target, arguments } = conn.recv().await
    else {
        panic!("expected an invocation with an id");
    };
    assert_eq!(target, "SendToAll");
    assert_eq!(arguments, vec![json!("move"), json!("id"), json!("{}")]);

    conn.send(&HubMessage::Completion { invocation_id: id, result: None, error: None })
        .await;
    call.await.unwrap().unwrap();

    transport.close().await;
}

#[tokio::test]
async fn test_invoke_surfaces_remote_error() {
    let hub = FakeHub::bind().await;
    let transport = transport_for(&hub, None);
    let (opened, mut conn) = tokio::join!(transport.open(), hub.accept_session());
    opened.unwrap();

    let caller = Arc::clone(&transport);
    let call = tokio::spawn(async move { caller.invoke("SendToAll", vec![]).await });

    let HubMessage::Invocation { invocation_id: Some(id), .. } = conn.recv().await else {
        panic!("expected an invocation with an id");
    };
    conn.send(&HubMessage::Completion {
        invocation_id: id,
        result: None,
        error: Some("not allowed".into()),
    })
    .await;

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, TransportError::Invoke { ref reason, .. } if reason == "not allowed"));

    transport.close().await;
}

#[tokio::test]
async fn test_invoke_before_open_is_rejected() {
    let hub = FakeHub::bind().await;
    let transport = transport_for(&hub, None);

    let err = transport.invoke("SendToAll", vec![]).await.unwrap_err();
    assert!(matches!(err, TransportError::NotOpen));
}

#[tokio::test]
async fn test_hub_close_fires_closed_callback() {
    let hub = FakeHub::bind().await;
    let transport = transport_for(&hub, None);
    let (tx, mut rx) = mpsc::unbounded_channel::<Option<TransportError>>();
    transport.on_closed(Arc::new(move |error| {
        let _ = tx.send(error);
    }));

    let (opened, mut conn) = tokio::join!(transport.open(), hub.accept_session());
    opened.unwrap();

    conn.send(&HubMessage::Close { error: Some("shutting down".into()), allow_reconnect: true })
        .await;

    let error = recv_timeout(&mut rx).await;
    assert!(matches!(error, Some(TransportError::Closed(Some(ref r))) if r == "shutting down"));

    let err = transport.invoke("SendToAll", vec![]).await.unwrap_err();
    assert!(matches!(err, TransportError::NotOpen));
}

#[tokio::test]
async fn test_socket_loss_fires_closed_callback_once() {
    let hub = FakeHub::bind().await;
    let transport = transport_for(&hub, None);
    let (tx, mut rx) = mpsc::unbounded_channel::<Option<TransportError>>();
    transport.on_closed(Arc::new(move |error| {
        let _ = tx.send(error);
    }));

    let (opened, conn) = tokio::join!(transport.open(), hub.accept_session());
    opened.unwrap();
    conn.drop_socket().await;

    recv_timeout(&mut rx).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_local_close_does_not_fire_closed_callback() {
    let hub = FakeHub::bind().await;
    let transport = transport_for(&hub, None);
    let (tx, mut rx) = mpsc::unbounded_channel::<Option<TransportError>>();
    transport.on_closed(Arc::new(move |error| {
        let _ = tx.send(error);
    }));

    let (opened, _conn) = tokio::join!(transport.open(), hub.accept_session());
    opened.unwrap();
    transport.close().await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_handshake_rejection() {
    let hub = FakeHub::bind().await;
    let transport = transport_for(&hub, None);

    let server = async {
        let mut conn = hub.accept().await;
        conn.read_handshake().await;
        conn.send_raw(r#"{"error":"unsupported protocol"}"#).await;
        conn
    };
    let (opened, _conn) = tokio::join!(transport.open(), server);

    let err = opened.unwrap_err();
    assert!(matches!(err, TransportError::Handshake(ref r) if r == "unsupported protocol"));
}

#[tokio::test]
async fn test_open_against_closed_port_fails() {
    let addr = {
        let hub = FakeHub::bind().await;
        hub.addr()
    };
    let transport = WsTransport::new(
        format!("ws://{addr}/hubs/presence"),
        Arc::new(StaticCookies(None)),
        WsSettings::default(),
    );

    let err = transport.open().await.unwrap_err();
    assert_eq!(err.error_code(), "connect_failed");
}

#[tokio::test]
async fn test_session_over_websocket() {
    let hub = FakeHub::bind().await;
    let transport = transport_for(&hub, None);
    let session = SessionManager::new(
        transport,
        SessionOptions::default().with_retry_delay(Duration::from_secs(60)),
    );
    let mut events = session.events();

    let (state, mut conn) = tokio::join!(session.connect("alice"), hub.accept_session());
    assert_eq!(state, LifecycleState::Connected);
    assert_eq!(next_event(&mut events).await, SessionEvent::Connected);

    conn.send(&HubMessage::invocation("OnConnected", vec![json!("bob"), json!("c2")]))
        .await;
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::PeerConnected(Peer::new("bob", "c2"))
    );

    conn.drop_socket().await;
    assert_eq!(next_event(&mut events).await, SessionEvent::Disconnected);
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::PeerDisconnected(Peer::new("bob", "c2"))
    );
    assert_eq!(session.state(), LifecycleState::Retrying);

    session.dispose().await;
}

#[tokio::test]
async fn test_connection_loss_fails_invocations_without_waiting_for_timeout() {
    let hub = FakeHub::bind().await;
    let transport = Arc::new(WsTransport::new(
        hub.endpoint(),
        Arc::new(StaticCookies(None)),
        WsSettings {
            handshake_timeout: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(60),
            invoke_timeout: Duration::from_secs(60),
        },
    ));
    let (tx, mut rx) = mpsc::unbounded_channel::<Option<TransportError>>();
    transport.on_closed(Arc::new(move |error| {
        let _ = tx.send(error);
    }));

    let (opened, mut conn) = tokio::join!(transport.open(), hub.accept_session());
    opened.unwrap();

    let caller = Arc::clone(&transport);
    let in_flight = tokio::spawn(async move { caller.invoke("SendToAll", vec![]).await });
    let HubMessage::Invocation { .. } = conn.recv().await else {
        panic!("expected an invocation");
    };
    conn.drop_socket().await;

    let err = tokio::time::timeout(Duration::from_secs(2), in_flight)
        .await
        .expect("in-flight invoke waited for its timeout")
        .unwrap()
        .unwrap_err();
    assert!(!matches!(err, TransportError::Timeout(_)));

    recv_timeout(&mut rx).await;
    let err = tokio::time::timeout(Duration::from_secs(2), transport.invoke("SendToAll", vec![]))
        .await
        .expect("invoke after loss waited for its timeout")
        .unwrap_err();
    assert!(matches!(err, TransportError::NotOpen));
}
