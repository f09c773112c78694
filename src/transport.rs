use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("receive failed: {0}")]
    Recv(String),
}

/// Write half of an established connection.
#[async_trait]
pub trait WireTx: Send {
    async fn send(&mut self, bytes: Vec<u8>) -> Result<(), TransportError>;
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of an established connection. `Ok(None)` means the peer closed
/// the stream cleanly.
#[async_trait]
pub trait WireRx: Send {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}

pub struct Connection {
    pub tx: Box<dyn WireTx>,
    pub rx: Box<dyn WireRx>,
}

/// Connection factory. The session state machine re-connects through this on
/// every recovery attempt; tests drive the machine with an in-memory
/// implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<Connection, TransportError>;
}

/// Websocket transport with bearer-token auth and device identification
/// headers.
pub struct WsTransport {
    pub url: String,
    pub token: String,
    pub device_id: String,
    pub client_id: String,
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self) -> Result<Connection, TransportError> {
        let url = Url::parse(&self.url).map_err(|e| TransportError::Connect(e.to_string()))?;
        let host = url.host_str().unwrap_or_default().to_string();

        let request = tokio_tungstenite::tungstenite::http::Request::builder()
            .method("GET")
            .uri(&self.url)
            .header("Host", host)
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header(
                "Sec-WebSocket-Key",
                tokio_tungstenite::tungstenite::handshake::client::generate_key(),
            )
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Device-Id", &self.device_id)
            .header("Client-Id", &self.client_id)
            .header("Protocol-Version", "1")
            .body(())
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::debug!("connecting to {}", self.url);
        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (write, read) = ws_stream.split();

        Ok(Connection {
            tx: Box::new(WsTx(write)),
            rx: Box::new(WsRx(read)),
        })
    }
}

struct WsTx(WsSink);

#[async_trait]
impl WireTx for WsTx {
    async fn send(&mut self, bytes: Vec<u8>) -> Result<(), TransportError> {
        // Envelopes are JSON, sent as text frames.
        let text =
            String::from_utf8(bytes).map_err(|e| TransportError::Send(e.to_string()))?;
        self.0
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.0
            .close()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

struct WsRx(WsStream);

#[async_trait]
impl WireRx for WsRx {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            match self.0.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.to_vec())),
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!("server closed connection: {:?}", frame);
                    return Ok(None);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(TransportError::Recv(e.to_string())),
                None => return Ok(None),
            }
        }
    }
}
