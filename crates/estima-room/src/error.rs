//! Error types for the room layer.

use estima_protocol::RoomId;

/// Errors that can occur during room operations.
///
/// None of these are part of the client-visible contract: operations on
/// unknown rooms are silent no-ops, not errors. What remains is the room
/// actor itself going away.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room's command channel is closed or its reply was dropped.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}
