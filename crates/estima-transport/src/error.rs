use std::io;

/// Failures at the network edge.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer is gone.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Binding or accepting on the listener failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] io::Error),

    /// The TCP peer connected but the protocol upgrade did not complete.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The upgrade request came from a browser origin outside the
    /// allow-list.
    #[error("origin not allowed: {0:?}")]
    OriginRejected(String),

    #[error("transport shut down")]
    Shutdown,
}
