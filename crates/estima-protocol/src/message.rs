//! Outbound frames: what the server sends to clients.
//!
//! ```text
//! {"type":"ack","id":7,"data":{"success":true}}
//! {"type":"broadcast","roomId":"R1","event":"updateVotes","data":{"alice":"5"}}
//! {"type":"error","id":7,"code":400,"message":"roomId is required"}
//! {"type":"pong","clientTime":1,"serverTime":2}
//! ```

use serde::{Deserialize, Serialize};

use crate::{ChatEntry, Participants, RoomId, Votes};

/// Body of an acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    /// `{success: true}`, the only ack the room core ever produces.
    pub fn success() -> Self {
        Self { success: true }
    }
}

/// `updateParticipants` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantsUpdate {
    pub participants: Participants,
}

/// `votesRevealed` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotesRevealed {
    pub votes: Votes,
}

/// A change pushed to every subscriber of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum RoomEvent {
    /// Full participant → status mapping.
    UpdateParticipants(ParticipantsUpdate),
    /// Full vote mapping; empty after a reset.
    UpdateVotes(Votes),
    /// Full history on join, a single entry per new message.
    UpdateChat(Vec<ChatEntry>),
    /// Current votes, unmodified.
    VotesRevealed(VotesRevealed),
}

impl RoomEvent {
    /// The wire name of this event, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UpdateParticipants(_) => "updateParticipants",
            Self::UpdateVotes(_) => "updateVotes",
            Self::UpdateChat(_) => "updateChat",
            Self::VotesRevealed(_) => "votesRevealed",
        }
    }
}

/// Every frame the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Answer to an acknowledged event.
    Ack { id: u64, data: Ack },

    /// A room event; every subscriber of `room_id` gets the same frame.
    #[serde(rename_all = "camelCase")]
    Broadcast {
        room_id: RoomId,
        #[serde(flatten)]
        event: RoomEvent,
    },

    /// A problem with the sender's own request. Never broadcast.
    /// `code` follows HTTP conventions (400 bad request, 503 unavailable).
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        code: u16,
        message: String,
    },

    /// Answer to `ping`. `server_time` is milliseconds since the
    /// connection was accepted.
    #[serde(rename_all = "camelCase")]
    Pong { client_time: u64, server_time: u64 },
}

impl ServerMessage {
    /// Builds a broadcast frame for `room_id`.
    pub fn broadcast(room_id: RoomId, event: RoomEvent) -> Self {
        Self::Broadcast { room_id, event }
    }

    /// Builds an error frame.
    pub fn error(id: Option<u64>, code: u16, message: impl Into<String>) -> Self {
        Self::Error {
            id,
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{UserId, VoteStatus};
    use serde_json::json;

    #[test]
    fn test_ack_json_shape() {
        let msg = ServerMessage::Ack {
            id: 7,
            data: Ack::success(),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "ack", "id": 7, "data": {"success": true}})
        );
    }

    #[test]
    fn test_broadcast_flattens_event_next_to_room_id() {
        let mut participants = Participants::new();
        participants.insert(UserId::from("alice"), VoteStatus::NotVoted);
        let msg = ServerMessage::broadcast(
            RoomId::from("R1"),
            RoomEvent::UpdateParticipants(ParticipantsUpdate { participants }),
        );
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "broadcast",
                "roomId": "R1",
                "event": "updateParticipants",
                "data": {"participants": {"alice": "not-voted"}}
            })
        );
    }

    #[test]
    fn test_votes_revealed_wraps_votes() {
        let mut votes = Votes::new();
        votes.insert(UserId::from("alice"), "5".into());
        let event = RoomEvent::VotesRevealed(VotesRevealed { votes });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "votesRevealed", "data": {"votes": {"alice": "5"}}})
        );
    }

    #[test]
    fn test_update_chat_is_a_list() {
        let event = RoomEvent::UpdateChat(vec![ChatEntry::new(
            UserId::from("bob"),
            "hello",
        )]);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "updateChat", "data": [{"user": "bob", "message": "hello"}]})
        );
    }

    #[test]
    fn test_error_omits_missing_id() {
        let msg = ServerMessage::error(None, 400, "bad frame");
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["code"], 400);
    }

    #[test]
    fn test_broadcast_decodes_back() {
        let json = r#"{"type":"broadcast","roomId":"R1","event":"updateVotes","data":{}}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            ServerMessage::broadcast(
                RoomId::from("R1"),
                RoomEvent::UpdateVotes(Votes::new())
            )
        );
    }

    #[test]
    fn test_pong_uses_camel_case() {
        let msg = ServerMessage::Pong {
            client_time: 1,
            server_time: 2,
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "pong", "clientTime": 1, "serverTime": 2})
        );
    }
}
