//! # Estima
//!
//! Real-time room server for estimation sessions: participants join a
//! room, vote privately, reveal together, reset, and chat.
//!
//! Each room is an isolated actor, so everything that happens in one room
//! is applied in a single order and every member sees the same sequence
//! of updates. Rooms never block each other.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use estima::prelude::*;
//!
//! # async fn start() -> Result<(), EstimaError> {
//! let config = ServerConfig::from_env()?;
//! let server = EstimaServer::builder().config(config).build().await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub mod config;
pub mod logging;

pub use config::{ConfigError, ServerConfig};
pub use error::EstimaError;
pub use server::{EstimaServer, EstimaServerBuilder};

/// Everything needed to run a server or talk to one.
pub mod prelude {
    pub use crate::config::{ConfigError, ServerConfig};
    pub use crate::logging::init_logging;
    pub use crate::{EstimaError, EstimaServer, EstimaServerBuilder};

    pub use estima_protocol::{
        Ack, ChatEntry, ClientEvent, Codec, Envelope, JoinRoom, JsonCodec,
        Participants, ParticipantsUpdate, Ping, ProtocolError, RoomEvent,
        RoomId, RoomRequest, SendMessage, SendVote, ServerMessage, UserId,
        VoteStatus, Votes, VotesRevealed,
    };
    pub use estima_room::{Coordinator, RoomConfig, RoomError, RoomSnapshot};
    pub use estima_transport::{OriginPolicy, TransportError};
}
