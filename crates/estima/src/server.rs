//! `EstimaServer` builder and accept loop.
//!
//! Ties the layers together: the WebSocket transport accepts TCP peers,
//! each gets its own task that finishes the upgrade and then runs the
//! handler, and every handler talks to the shared room [`Coordinator`].
//! The accept loop itself never waits on a peer.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use estima_protocol::{Codec, JsonCodec};
use estima_room::{Coordinator, RoomConfig};
use estima_transport::{
    Handshake, OriginPolicy, Transport, TransportError, WebSocketTransport,
};

use crate::config::ServerConfig;
use crate::handler::handle_connection;
use crate::EstimaError;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) rooms: Coordinator,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Option<Duration>,
    pub(crate) outbound_buffer: usize,
}

/// Builder for configuring and starting an Estima server.
///
/// # Example
///
/// ```rust,no_run
/// use estima::prelude::*;
///
/// # async fn start() -> Result<(), EstimaError> {
/// let server = EstimaServer::builder()
///     .bind("0.0.0.0:8080")
///     .allowed_origins(["https://poker.example"])
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct EstimaServerBuilder {
    config: ServerConfig,
}

impl EstimaServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces every setting with `config`.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Restricts which browser origins may connect.
    pub fn allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_origins =
            origins.into_iter().map(Into::into).collect();
        self
    }

    /// Closes connections that stay silent for `timeout`. `None` disables.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.idle_timeout_secs = timeout.map_or(0, |t| t.as_secs().max(1));
        self
    }

    /// Frames queued per connection before a client that is not reading
    /// gets disconnected.
    pub fn outbound_buffer(mut self, frames: usize) -> Self {
        self.config.outbound_buffer = frames;
        self
    }

    /// Sets the configuration every room is spawned with.
    pub fn room_config(mut self, room: RoomConfig) -> Self {
        self.config.room = room;
        self
    }

    /// Binds the listener and builds a server speaking JSON.
    pub async fn build(self) -> Result<EstimaServer<JsonCodec>, EstimaError> {
        self.build_with_codec(JsonCodec).await
    }

    /// Binds the listener and builds a server using `codec`.
    pub async fn build_with_codec<C: Codec>(
        self,
        codec: C,
    ) -> Result<EstimaServer<C>, EstimaError> {
        let origins = OriginPolicy::allow(self.config.allowed_origins.iter().cloned());
        let transport =
            WebSocketTransport::bind_with_origins(&self.config.bind_addr, origins)
                .await?;

        let state = Arc::new(ServerState {
            rooms: Coordinator::new(self.config.room.clone()),
            codec,
            idle_timeout: self.config.idle_timeout(),
            outbound_buffer: self.config.outbound_buffer,
        });

        Ok(EstimaServer { transport, state })
    }
}

impl Default for EstimaServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Estima server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct EstimaServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl EstimaServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> EstimaServerBuilder {
        EstimaServerBuilder::new()
    }
}

impl<C: Codec> EstimaServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), EstimaError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// Connections already accepted keep running in their own tasks.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), EstimaError>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr().map_err(TransportError::AcceptFailed)?;
        tracing::info!(%addr, "Estima server running");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested, no longer accepting");
                    self.transport.shutdown().await?;
                    return Ok(());
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(handshake) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            let peer = handshake.peer_addr();
                            let conn = match handshake.complete().await {
                                Ok(conn) => conn,
                                // Logged by the transport.
                                Err(TransportError::OriginRejected(_)) => return,
                                Err(e) => {
                                    tracing::debug!(%peer, error = %e, "handshake failed");
                                    return;
                                }
                            };
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }
    }
}
