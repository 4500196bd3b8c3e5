//! Room coordinator: the only way in to room state.
//!
//! Keeps the registry of room actors and turns each client operation into
//! a command for the right actor. The registry lock is held only to find
//! or create a handle, never while a room is working, so rooms proceed
//! in parallel.

use std::collections::HashMap;

use estima_protocol::{Ack, RoomId, UserId};
use estima_transport::ConnectionId;
use tokio::sync::Mutex;

use crate::room::spawn_room;
use crate::{RoomConfig, RoomError, RoomHandle, RoomSnapshot, Subscriber};

/// Owns every room. Rooms are created on first join and live until the
/// coordinator is dropped.
pub struct Coordinator {
    rooms: Mutex<HashMap<RoomId, RoomHandle>>,
    config: RoomConfig,
}

impl Coordinator {
    /// Creates a coordinator with no rooms.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            config: config.validated(),
        }
    }

    async fn handle(&self, room_id: &RoomId) -> Option<RoomHandle> {
        self.rooms.lock().await.get(room_id).cloned()
    }

    async fn handle_or_create(&self, room_id: &RoomId) -> RoomHandle {
        let mut rooms = self.rooms.lock().await;
        if let Some(handle) = rooms.get(room_id) {
            return handle.clone();
        }
        let handle = spawn_room(room_id.clone(), self.config.command_buffer);
        rooms.insert(room_id.clone(), handle.clone());
        // Rooms are never reclaimed; keep the count visible.
        tracing::info!(%room_id, rooms = rooms.len(), "room created");
        handle
    }

    /// `joinRoom`: creates the room if needed, sets `user` to not-voted,
    /// subscribes `conn`, then broadcasts participants and chat history.
    ///
    /// The joiner's own subscriber receives both broadcasts before this
    /// returns.
    pub async fn join(
        &self,
        room_id: &RoomId,
        user: UserId,
        conn: ConnectionId,
        subscriber: Subscriber,
    ) -> Result<Ack, RoomError> {
        self.handle_or_create(room_id)
            .await
            .join(user, conn, subscriber)
            .await
    }

    /// `sendVote`: acks success even when the room does not exist, in
    /// which case nothing happens.
    pub async fn vote(
        &self,
        room_id: &RoomId,
        user: UserId,
        vote: String,
    ) -> Result<Ack, RoomError> {
        match self.handle(room_id).await {
            Some(handle) => handle.vote(user, vote).await,
            None => {
                tracing::debug!(%room_id, %user, "vote for unknown room ignored");
                Ok(Ack::success())
            }
        }
    }

    /// `resetVotes`: acks success even when the room does not exist.
    pub async fn reset(&self, room_id: &RoomId) -> Result<Ack, RoomError> {
        match self.handle(room_id).await {
            Some(handle) => handle.reset().await,
            None => {
                tracing::debug!(%room_id, "reset for unknown room ignored");
                Ok(Ack::success())
            }
        }
    }

    /// `revealVotes`: broadcasts the current votes. No-op for an unknown
    /// room.
    pub async fn reveal(&self, room_id: &RoomId) -> Result<(), RoomError> {
        match self.handle(room_id).await {
            Some(handle) => handle.reveal().await,
            None => Ok(()),
        }
    }

    /// `sendMessage`: appends to chat and broadcasts the single new entry.
    /// No-op for an unknown room.
    pub async fn send_message(
        &self,
        room_id: &RoomId,
        user: UserId,
        message: String,
    ) -> Result<(), RoomError> {
        match self.handle(room_id).await {
            Some(handle) => handle.send_message(user, message).await,
            None => Ok(()),
        }
    }

    /// Removes `conn` from the room's broadcast group. The user stays a
    /// participant.
    pub async fn unsubscribe(
        &self,
        room_id: &RoomId,
        conn: ConnectionId,
    ) -> Result<(), RoomError> {
        match self.handle(room_id).await {
            Some(handle) => handle.unsubscribe(conn).await,
            None => Ok(()),
        }
    }

    /// A consistent copy of the room, or `None` if it was never joined.
    pub async fn snapshot(
        &self,
        room_id: &RoomId,
    ) -> Result<Option<RoomSnapshot>, RoomError> {
        match self.handle(room_id).await {
            Some(handle) => handle.snapshot().await.map(Some),
            None => Ok(None),
        }
    }

    /// Returns the number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Lists all live room keys.
    pub async fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.lock().await.keys().cloned().collect()
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
