//! Inbound events: what clients send to the server.
//!
//! Every frame a client sends is an [`Envelope`]:
//!
//! ```text
//! { "ack": 7, "payload": { "event": "sendVote",
//!                          "data": { "roomId": "R1", "user": "alice", "vote": "5" } } }
//! ```
//!
//! `ack` is optional. When present, events that acknowledge (join, vote,
//! reset) answer with an ack frame carrying the same id, and boundary
//! errors are reported against it.
//!
//! Payload fields default to empty when missing so that a frame with a
//! forgotten field still decodes and [`ClientEvent::validate`] can name
//! the field in a `BadRequest` instead of a generic decode failure.

use serde::{Deserialize, Serialize};

use crate::{ProtocolError, RoomId, UserId};

/// The top-level inbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Client-chosen request id, echoed back in the ack or error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,

    /// The event itself.
    pub payload: ClientEvent,
}

impl Envelope {
    /// Wraps an event without an ack id.
    pub fn new(payload: ClientEvent) -> Self {
        Self { ack: None, payload }
    }

    /// Wraps an event with an ack id.
    pub fn with_ack(ack: u64, payload: ClientEvent) -> Self {
        Self {
            ack: Some(ack),
            payload,
        }
    }
}

/// `joinRoom` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    #[serde(default)]
    pub room_id: RoomId,
    #[serde(default)]
    pub user: UserId,
}

/// `sendVote` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SendVote {
    #[serde(default)]
    pub room_id: RoomId,
    #[serde(default)]
    pub user: UserId,
    #[serde(default)]
    pub vote: String,
}

/// Payload of `resetVotes` and `revealVotes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RoomRequest {
    #[serde(default)]
    pub room_id: RoomId,
}

/// `sendMessage` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    #[serde(default)]
    pub room_id: RoomId,
    #[serde(default)]
    pub user: UserId,
    #[serde(default)]
    pub message: String,
}

/// `ping` payload. Answered with a pong, never touches a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Ping {
    #[serde(default)]
    pub client_time: u64,
}

/// Every event a client can send.
///
/// Adjacently tagged: `{ "event": "joinRoom", "data": { ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    JoinRoom(JoinRoom),
    SendVote(SendVote),
    ResetVotes(RoomRequest),
    RevealVotes(RoomRequest),
    SendMessage(SendMessage),
    Ping(Ping),
}

impl ClientEvent {
    /// The wire name of this event, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom(_) => "joinRoom",
            Self::SendVote(_) => "sendVote",
            Self::ResetVotes(_) => "resetVotes",
            Self::RevealVotes(_) => "revealVotes",
            Self::SendMessage(_) => "sendMessage",
            Self::Ping(_) => "ping",
        }
    }

    /// Whether the server answers this event with `{success: true}`.
    pub fn is_acknowledged(&self) -> bool {
        matches!(
            self,
            Self::JoinRoom(_) | Self::SendVote(_) | Self::ResetVotes(_)
        )
    }

    /// The room this event targets, if any.
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            Self::JoinRoom(e) => Some(&e.room_id),
            Self::SendVote(e) => Some(&e.room_id),
            Self::ResetVotes(e) | Self::RevealVotes(e) => Some(&e.room_id),
            Self::SendMessage(e) => Some(&e.room_id),
            Self::Ping(_) => None,
        }
    }

    /// Checks that every required field is present and non-empty.
    ///
    /// # Errors
    /// [`ProtocolError::BadRequest`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Self::JoinRoom(e) => {
                require("roomId", e.room_id.as_str())?;
                require("user", e.user.as_str())
            }
            Self::SendVote(e) => {
                require("roomId", e.room_id.as_str())?;
                require("user", e.user.as_str())?;
                require("vote", &e.vote)
            }
            Self::ResetVotes(e) | Self::RevealVotes(e) => {
                require("roomId", e.room_id.as_str())
            }
            Self::SendMessage(e) => {
                require("roomId", e.room_id.as_str())?;
                require("user", e.user.as_str())?;
                require("message", &e.message)
            }
            Self::Ping(_) => Ok(()),
        }
    }
}

fn require(field: &str, value: &str) -> Result<(), ProtocolError> {
    if value.trim().is_empty() {
        return Err(ProtocolError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}
