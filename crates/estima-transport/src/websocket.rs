//! WebSocket transport over `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::{header, StatusCode};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::{
    Connection, ConnectionId, Handshake, OriginPolicy, Transport,
    TransportError,
};

/// A peer that opens TCP but never finishes the upgrade is dropped after
/// this long.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<TcpStream>;

/// Listens for WebSocket upgrades.
pub struct WebSocketTransport {
    listener: TcpListener,
    origins: OriginPolicy,
}

impl WebSocketTransport {
    /// Listens on `addr` and accepts every origin.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with_origins(addr, OriginPolicy::any()).await
    }

    /// Listens on `addr`, refusing browsers whose origin `origins` does
    /// not permit.
    pub async fn bind_with_origins(
        addr: &str,
        origins: OriginPolicy,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(
            addr,
            any_origin = origins.is_open(),
            "websocket listener bound"
        );
        Ok(Self { listener, origins })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Handshake = WebSocketHandshake;
    type Error = TransportError;

    /// Returns as soon as TCP is accepted; the upgrade happens in
    /// [`WebSocketHandshake::complete`].
    async fn accept(&mut self) -> Result<Self::Handshake, Self::Error> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::trace!(%peer, "tcp accepted");
        Ok(WebSocketHandshake {
            stream,
            peer,
            origins: self.origins.clone(),
            timeout: HANDSHAKE_TIMEOUT,
        })
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        // Dropping the transport closes the listener.
        Ok(())
    }
}

/// A TCP peer waiting for its WebSocket upgrade.
pub struct WebSocketHandshake {
    stream: TcpStream,
    peer: SocketAddr,
    origins: OriginPolicy,
    timeout: Duration,
}

impl WebSocketHandshake {
    /// Overrides [`HANDSHAKE_TIMEOUT`] for this peer.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Handshake for WebSocketHandshake {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    /// Checks the `Origin` header and upgrades, within the timeout.
    async fn complete(self) -> Result<WebSocketConnection, TransportError> {
        let Self {
            stream,
            peer,
            origins,
            timeout,
        } = self;

        let mut refused: Option<String> = None;
        let check_origin = |req: &Request, resp: Response| {
            let origin = req
                .headers()
                .get(header::ORIGIN)
                .and_then(|v| v.to_str().ok());
            if origins.permits(origin) {
                return Ok(resp);
            }
            refused = Some(origin.unwrap_or_default().to_string());
            let mut denied = ErrorResponse::new(Some("origin not allowed".into()));
            *denied.status_mut() = StatusCode::FORBIDDEN;
            Err(denied)
        };

        let upgraded = tokio::time::timeout(
            timeout,
            tokio_tungstenite::accept_hdr_async(stream, check_origin),
        )
        .await;

        if let Some(origin) = refused {
            tracing::warn!(%peer, %origin, "refused websocket from origin");
            return Err(TransportError::OriginRejected(origin));
        }

        let ws = match upgraded {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => return Err(TransportError::Handshake(e.to_string())),
            Err(_) => {
                return Err(TransportError::Handshake(format!(
                    "no upgrade from {peer} within {timeout:?}"
                )));
            }
        };

        let id = ConnectionId::next();
        tracing::debug!(%id, %peer, "websocket upgraded");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            peer,
            opened: Instant::now(),
            last_frame_ms: AtomicU64::new(0),
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

/// An upgraded WebSocket, split into independently locked halves.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: SocketAddr,
    opened: Instant,
    /// Milliseconds after `opened` at which the last frame arrived.
    last_frame_ms: AtomicU64,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    fn millis_open(&self) -> u64 {
        self.opened.elapsed().as_millis() as u64
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// UTF-8 goes out as a text frame, anything else as binary.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let frame = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.sink
            .lock()
            .await
            .send(frame)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        while let Some(frame) = stream.next().await {
            if frame.is_ok() {
                self.last_frame_ms.store(self.millis_open(), Ordering::Relaxed);
            }
            match frame {
                Ok(Message::Text(text)) => return Ok(Some(text.as_bytes().to_vec())),
                Ok(Message::Binary(data)) => return Ok(Some(data.to_vec())),
                Ok(Message::Close(_)) => return Ok(None),
                // Control frames are answered by tungstenite itself.
                Ok(_) => {}
                Err(e) => return Err(TransportError::ReceiveFailed(e.to_string())),
            }
        }
        Ok(None)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| TransportError::ConnectionClosed(e.to_string()))
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn idle_for(&self) -> Duration {
        let last = self.last_frame_ms.load(Ordering::Relaxed);
        Duration::from_millis(self.millis_open().saturating_sub(last))
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Some(self.peer)
    }
}
