//! Network edge of Estima.
//!
//! The server only sees the [`Transport`] and [`Connection`] traits:
//! accept a peer, push frames to it, pull frames from it. The WebSocket
//! implementation behind the `websocket` feature (on by default) adds a
//! browser [`OriginPolicy`] check during the upgrade.

#![allow(async_fn_in_trait)]

mod error;
mod origin;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use origin::OriginPolicy;
#[cfg(feature = "websocket")]
pub use websocket::{
    WebSocketConnection, WebSocketHandshake, WebSocketTransport, HANDSHAKE_TIMEOUT,
};

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique handle for one accepted peer.
///
/// Rooms key their broadcast groups by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw value. Tests use this to fake connections.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a fresh id, never `0`.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A listener producing [`Connection`]s.
///
/// Accepting is split in two so a slow handshake never holds up the
/// listener: [`accept`](Self::accept) only takes the next raw peer, and
/// the returned [`Handshake`] is completed wherever the caller likes,
/// typically in the peer's own task.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Handshake: Handshake<Connection = Self::Connection, Error = Self::Error>;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next peer.
    async fn accept(&mut self) -> Result<Self::Handshake, Self::Error>;

    /// Stops producing connections. Already accepted ones are unaffected.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A peer that has connected but not yet finished the protocol upgrade.
pub trait Handshake: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Runs the upgrade. Implementations bound how long this may take.
    async fn complete(self) -> Result<Self::Connection, Self::Error>;

    /// Remote address of the peer.
    fn peer_addr(&self) -> SocketAddr;
}

/// One peer, framed.
///
/// Implementations must allow `send` from one task while another is
/// parked in `recv`; the server relies on it to deliver broadcasts to a
/// client that is not currently sending anything.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Writes one frame.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Reads one frame. `Ok(None)` means the peer closed cleanly.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Starts a clean close.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    /// Time since the peer last sent anything, control frames included.
    ///
    /// Keep-alive pings that [`recv`](Self::recv) absorbs still count,
    /// so an idle check based on this does not drop a quiet but live peer.
    fn idle_for(&self) -> Duration;

    /// Remote address, when the transport knows it.
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn test_fresh_ids_are_distinct_and_nonzero() {
        let ids: BTreeSet<ConnectionId> =
            (0..100).map(|_| ConnectionId::next()).collect();
        assert_eq!(ids.len(), 100);
        assert!(ids.iter().all(|id| id.get() > 0));
    }

    #[test]
    fn test_display_prefix() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_ids_sort_numerically() {
        let mut ids = vec![ConnectionId::new(10), ConnectionId::new(2)];
        ids.sort();
        assert_eq!(ids.iter().map(|id| id.get()).collect::<Vec<_>>(), [2, 10]);
    }
}
