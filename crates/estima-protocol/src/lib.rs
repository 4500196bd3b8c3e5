//! Wire protocol for Estima.
//!
//! - **Types** ([`RoomId`], [`UserId`], [`VoteStatus`], [`ChatEntry`]):
//!   identifiers and the room data that appears in events.
//! - **Inbound** ([`Envelope`], [`ClientEvent`]): what clients send,
//!   with [`ClientEvent::validate`] as the boundary check.
//! - **Outbound** ([`ServerMessage`], [`RoomEvent`], [`Ack`]): acks,
//!   room broadcasts, errors, pongs.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes ↔ types.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope / ServerMessage) → Room coordinator
//! ```

mod codec;
mod error;
mod event;
mod message;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use event::{
    ClientEvent, Envelope, JoinRoom, Ping, RoomRequest, SendMessage, SendVote,
};
pub use message::{
    Ack, ParticipantsUpdate, RoomEvent, ServerMessage, VotesRevealed,
};
pub use types::{ChatEntry, Participants, RoomId, UserId, VoteStatus, Votes};
