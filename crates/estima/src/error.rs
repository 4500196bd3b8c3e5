//! Unified error type for the Estima server.

use estima_protocol::ProtocolError;
use estima_room::RoomError;
use estima_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum EstimaError {
    /// Binding, accepting, sending or receiving failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded, decoded or validated.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room actor went away.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The server configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
