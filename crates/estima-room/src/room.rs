//! Room actor: an isolated Tokio task that owns one room.
//!
//! Each room runs in its own task and is reached only through an mpsc
//! channel, so every operation on a room is applied one at a time in
//! arrival order, and every broadcast is built from the state the same
//! command just produced. Different rooms never wait on each other.

use std::collections::HashMap;
use std::sync::Arc;

use estima_protocol::{
    Ack, ChatEntry, Participants, RoomEvent, RoomId, ServerMessage, UserId,
    Votes,
};
use estima_transport::ConnectionId;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Notify};

use crate::{Room, RoomError};

/// Outbound queue of one connection.
///
/// Rooms push broadcast frames into it and the connection's writer task
/// drains it onto the socket. The queue is bounded: a client that stops
/// reading fills it, at which point delivery fails, the room drops the
/// subscriber, and [`overflowed`](Self::overflowed) fires so the
/// connection can be closed.
#[derive(Debug, Clone)]
pub struct Subscriber {
    frames: mpsc::Sender<ServerMessage>,
    overflow: Arc<Notify>,
}

impl Subscriber {
    pub fn new(frames: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            frames,
            overflow: Arc::new(Notify::new()),
        }
    }

    /// Creates a subscriber and the receiving end of its queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Queues `msg` without waiting. Returns `false` if the receiver is
    /// gone or the queue is full; a full queue also triggers
    /// [`overflowed`](Self::overflowed).
    pub fn deliver(&self, msg: ServerMessage) -> bool {
        match self.frames.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.overflow.notify_one();
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Completes once some delivery to this queue (or a clone of it) has
    /// failed because the queue was full.
    pub async fn overflowed(&self) {
        self.overflow.notified().await;
    }
}

/// Commands sent to a room actor through its channel.
///
/// Variants with a `reply` are answered after the mutation has been
/// applied and its broadcasts enqueued.
pub(crate) enum RoomCommand {
    Join {
        user: UserId,
        conn: ConnectionId,
        subscriber: Subscriber,
        reply: oneshot::Sender<Ack>,
    },
    Vote {
        user: UserId,
        vote: String,
        reply: oneshot::Sender<Ack>,
    },
    Reset {
        reply: oneshot::Sender<Ack>,
    },
    Reveal,
    Message {
        user: UserId,
        message: String,
    },
    Unsubscribe {
        conn: ConnectionId,
    },
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
}

/// A consistent copy of a room's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub participants: Participants,
    pub votes: Votes,
    pub chat: Vec<ChatEntry>,
    /// Connections currently in the broadcast group.
    pub subscribers: usize,
}

/// Handle to a running room actor.
///
/// Cheap to clone; the coordinator hands out clones so callers can talk
/// to a room without holding the registry lock.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    async fn request<T>(
        &self,
        cmd: RoomCommand,
        reply_rx: oneshot::Receiver<T>,
    ) -> Result<T, RoomError> {
        self.send(cmd).await?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    /// Adds `user` and subscribes `conn` before anything is broadcast.
    pub async fn join(
        &self,
        user: UserId,
        conn: ConnectionId,
        subscriber: Subscriber,
    ) -> Result<Ack, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            RoomCommand::Join {
                user,
                conn,
                subscriber,
                reply,
            },
            rx,
        )
        .await
    }

    pub async fn vote(
        &self,
        user: UserId,
        vote: String,
    ) -> Result<Ack, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.request(RoomCommand::Vote { user, vote, reply }, rx).await
    }

    pub async fn reset(&self) -> Result<Ack, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.request(RoomCommand::Reset { reply }, rx).await
    }

    /// Fire-and-forget: returns once the command is queued.
    pub async fn reveal(&self) -> Result<(), RoomError> {
        self.send(RoomCommand::Reveal).await
    }

    /// Fire-and-forget: returns once the command is queued.
    pub async fn send_message(
        &self,
        user: UserId,
        message: String,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::Message { user, message }).await
    }

    pub async fn unsubscribe(&self, conn: ConnectionId) -> Result<(), RoomError> {
        self.send(RoomCommand::Unsubscribe { conn }).await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.request(RoomCommand::Snapshot { reply }, rx).await
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room_id: RoomId,
    room: Room,
    subscribers: HashMap<ConnectionId, Subscriber>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Processes commands until every handle is dropped.
    async fn run(mut self) {
        tracing::debug!(room_id = %self.room_id, "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join {
                    user,
                    conn,
                    subscriber,
                    reply,
                } => {
                    self.handle_join(user, conn, subscriber);
                    let _ = reply.send(Ack::success());
                }
                RoomCommand::Vote { user, vote, reply } => {
                    self.handle_vote(user, vote);
                    let _ = reply.send(Ack::success());
                }
                RoomCommand::Reset { reply } => {
                    self.handle_reset();
                    let _ = reply.send(Ack::success());
                }
                RoomCommand::Reveal => self.handle_reveal(),
                RoomCommand::Message { user, message } => {
                    self.handle_message(user, message);
                }
                RoomCommand::Unsubscribe { conn } => {
                    if self.subscribers.remove(&conn).is_some() {
                        tracing::debug!(
                            room_id = %self.room_id,
                            %conn,
                            subscribers = self.subscribers.len(),
                            "connection unsubscribed"
                        );
                    }
                }
                RoomCommand::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot());
                }
            }
        }

        tracing::debug!(room_id = %self.room_id, "room actor stopped");
    }

    fn handle_join(
        &mut self,
        user: UserId,
        conn: ConnectionId,
        subscriber: Subscriber,
    ) {
        self.room.join(user.clone());
        // Subscribe first so the joiner sees the broadcasts below.
        self.subscribers.insert(conn, subscriber);

        tracing::info!(
            room_id = %self.room_id,
            %user,
            %conn,
            participants = self.room.participants().len(),
            "user joined room"
        );

        self.broadcast(self.room.participants_event());
        self.broadcast(self.room.chat_history_event());
    }

    fn handle_vote(&mut self, user: UserId, vote: String) {
        tracing::info!(room_id = %self.room_id, %user, "vote cast");
        self.room.vote(user, vote);
        self.broadcast(self.room.participants_event());
        self.broadcast(self.room.votes_event());
    }

    fn handle_reset(&mut self) {
        self.room.reset();
        tracing::info!(room_id = %self.room_id, "votes reset");
        self.broadcast(self.room.participants_event());
        self.broadcast(self.room.votes_event());
    }

    fn handle_reveal(&mut self) {
        tracing::info!(
            room_id = %self.room_id,
            votes = self.room.votes().len(),
            "votes revealed"
        );
        self.broadcast(self.room.revealed_event());
    }

    fn handle_message(&mut self, user: UserId, message: String) {
        let entry = self.room.push_message(user, message);
        tracing::info!(
            room_id = %self.room_id,
            user = %entry.user,
            chat_len = self.room.chat().len(),
            "chat message"
        );
        self.broadcast(RoomEvent::UpdateChat(vec![entry]));
    }

    /// Sends one frame to every subscriber, dropping those whose
    /// connection has gone away or whose queue is full.
    fn broadcast(&mut self, event: RoomEvent) {
        let name = event.name();
        let frame = ServerMessage::broadcast(self.room_id.clone(), event);
        let room_id = &self.room_id;
        self.subscribers.retain(|conn, subscriber| {
            let delivered = subscriber.deliver(frame.clone());
            if !delivered {
                tracing::debug!(
                    %room_id,
                    %conn,
                    event = name,
                    "dropping closed or lagging subscriber"
                );
            }
            delivered
        });
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id.clone(),
            participants: self.room.participants().clone(),
            votes: self.room.votes().clone(),
            chat: self.room.chat().to_vec(),
            subscribers: self.subscribers.len(),
        }
    }
}

/// Spawns a new room actor task and returns a handle to it.
///
/// `channel_size` bounds the command queue; senders wait when it is full.
pub(crate) fn spawn_room(room_id: RoomId, channel_size: usize) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let actor = RoomActor {
        room_id: room_id.clone(),
        room: Room::new(),
        subscribers: HashMap::new(),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
