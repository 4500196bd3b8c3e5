//! Core protocol types: identifiers and the room data that travels on
//! the wire.
//!
//! Both identifiers are free-form strings chosen by clients. The server
//! never interprets them beyond "non-empty".

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The key of a room, e.g. `"sprint-42"`.
///
/// Serialized as a plain JSON string (`#[serde(transparent)]`).
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    Default,
)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The name a client uses inside a room, e.g. `"alice"`.
///
/// Identity is not verified; two connections claiming the same name are
/// the same participant.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    Default,
)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Room data
// ---------------------------------------------------------------------------

/// Whether a participant has a vote on record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum VoteStatus {
    /// No vote since the last join or reset.
    #[default]
    NotVoted,
    /// A vote is on record.
    Voted,
}

impl fmt::Display for VoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotVoted => f.write_str("not-voted"),
            Self::Voted => f.write_str("voted"),
        }
    }
}

/// Participant name → vote status, serialized in name order.
pub type Participants = BTreeMap<UserId, VoteStatus>;

/// Participant name → vote value, serialized in name order.
pub type Votes = BTreeMap<UserId, String>;

/// One chat line as stored and broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub user: UserId,
    pub message: String,
}

impl ChatEntry {
    pub fn new(user: UserId, message: impl Into<String>) -> Self {
        Self {
            user,
            message: message.into(),
        }
    }
}
