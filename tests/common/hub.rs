//! Websocket hub double.
//!
//! Accepts real websocket connections on a loopback port and speaks the
//! JSON hub protocol from the server side, one connection at a time.

use futures_util::{SinkExt, StreamExt};
use rosterlink_proto::{HandshakeRequest, HubMessage, RecordReader, record};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};

pub struct FakeHub {
    listener: TcpListener,
    addr: SocketAddr,
}

impl FakeHub {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind hub");
        let addr = listener.local_addr().expect("hub address");
        Self { listener, addr }
    }

    /// Websocket endpoint clients should dial.
    pub fn endpoint(&self) -> String {
        format!("ws://{}/hubs/presence", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accept the next websocket connection (without the hub handshake).
    pub async fn accept(&self) -> HubConnection {
        let (stream, _) = tokio::time::timeout(Duration::from_secs(5), self.listener.accept())
            .await
            .expect("timed out waiting for a client")
            .expect("accept");

        let mut cookie = None;
        let ws = accept_hdr_async(
            stream,
            |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                cookie = request
                    .headers()
                    .get("cookie")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                Ok(response)
            },
        )
        .await
        .expect("websocket upgrade");

        HubConnection {
            ws,
            reader: RecordReader::new(),
            queued: VecDeque::new(),
            cookie,
        }
    }

    /// Accept a connection and complete the hub handshake.
    pub async fn accept_session(&self) -> HubConnection {
        let mut conn = self.accept().await;
        let request = conn.read_handshake().await;
        assert_eq!(request, HandshakeRequest::default());
        conn.send_raw("{}").await;
        conn
    }
}

pub struct HubConnection {
    ws: WebSocketStream<TcpStream>,
    reader: RecordReader,
    queued: VecDeque<String>,
    cookie: Option<String>,
}

impl HubConnection {
    /// `Cookie` header sent with the upgrade request.
    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    pub async fn read_handshake(&mut self) -> HandshakeRequest {
        let record = self.next_record().await;
        serde_json::from_str(&record).expect("handshake request")
    }

    /// Send one JSON document as a record.
    pub async fn send_raw(&mut self, json: &str) {
        self.ws
            .send(Message::Text(record::frame(json)))
            .await
            .expect("hub send");
    }

    pub async fn send(&mut self, message: &HubMessage) {
        self.ws
            .send(Message::Text(message.to_record()))
            .await
            .expect("hub send");
    }

    /// Next message from the client, skipping keep-alive pings.
    pub async fn recv(&mut self) -> HubMessage {
        loop {
            let record = self.next_record().await;
            match HubMessage::parse(&record).expect("client record") {
                HubMessage::Ping => continue,
                message => return message,
            }
        }
    }

    /// Close the websocket without a hub close message.
    pub async fn drop_socket(mut self) {
        let _ = self.ws.close(None).await;
    }

    async fn next_record(&mut self) -> String {
        loop {
            if let Some(record) = self.queued.pop_front() {
                return record;
            }
            let frame = tokio::time::timeout(Duration::from_secs(5), self.ws.next())
                .await
                .expect("timed out waiting for the client")
                .expect("client hung up")
                .expect("websocket read");
            if let Message::Text(text) = frame {
                self.queued.extend(self.reader.feed(&text));
            }
        }
    }
}
