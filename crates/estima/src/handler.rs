//! Per-connection handler: decode, validate, dispatch, reply.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`]. Outbound traffic for the connection (acks,
//! errors, pongs and room broadcasts) goes through one bounded queue
//! drained by a single writer task, so the client sees frames in the
//! order they were produced. A client that stops reading fills the queue
//! and is disconnected.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use estima_protocol::{
    Ack, ClientEvent, Codec, Envelope, RoomId, ServerMessage,
};
use estima_room::{RoomError, Subscriber};
use estima_transport::{
    Connection, ConnectionId, TransportError, WebSocketConnection,
};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::EstimaError;

/// Error code sent when a room actor cannot be reached.
const ROOM_UNAVAILABLE: u16 = 503;

/// How long the close handshake may take before the socket is dropped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Drop guard that removes the connection from every room it joined.
///
/// `Drop` is synchronous, so the unsubscribes run in a spawned task.
/// Participants stay in their rooms; only the broadcast subscription goes.
struct ConnectionGuard<C: Codec> {
    conn_id: ConnectionId,
    rooms: BTreeSet<RoomId>,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        if self.rooms.is_empty() {
            return;
        }
        let conn_id = self.conn_id;
        let rooms = std::mem::take(&mut self.rooms);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            for room_id in rooms {
                if let Err(e) = state.rooms.unsubscribe(&room_id, conn_id).await {
                    tracing::debug!(%conn_id, error = %e, "unsubscribe failed");
                }
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), EstimaError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let started = Instant::now();
    tracing::info!(%conn_id, peer = ?conn.peer_addr(), "connection opened");

    let (outbound, outbound_rx) = Subscriber::channel(state.outbound_buffer);
    let writer = tokio::spawn(write_loop(
        Arc::clone(&conn),
        outbound_rx,
        Arc::clone(&state),
    ));

    let mut guard = ConnectionGuard {
        conn_id,
        rooms: BTreeSet::new(),
        state: Arc::clone(&state),
    };

    loop {
        let received = tokio::select! {
            () = outbound.overflowed() => {
                tracing::warn!(%conn_id, "client not reading, closing");
                break;
            }
            received = next_frame(&conn, state.idle_timeout) => match received {
                Some(received) => received,
                None => {
                    tracing::info!(%conn_id, "connection idle, closing");
                    break;
                }
            },
        };

        let data = match received {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                reply(
                    &outbound,
                    ServerMessage::error(None, e.status_code(), e.to_string()),
                );
                continue;
            }
        };

        let Envelope { ack, payload } = envelope;
        if let Err(e) = payload.validate() {
            tracing::debug!(
                %conn_id,
                event = payload.name(),
                room_id = ?payload.room_id(),
                error = %e,
                "rejected event"
            );
            reply(
                &outbound,
                ServerMessage::error(ack, e.status_code(), e.to_string()),
            );
            continue;
        }

        let acknowledged = payload.is_acknowledged();
        tracing::trace!(
            %conn_id,
            event = payload.name(),
            room_id = ?payload.room_id(),
            "dispatching"
        );
        match dispatch(&state, &mut guard, &outbound, payload, started).await {
            Ok(answer) => {
                if let (Some(id), true) = (ack, acknowledged) {
                    reply(
                        &outbound,
                        ServerMessage::Ack {
                            id,
                            data: answer.unwrap_or_else(Ack::success),
                        },
                    );
                }
            }
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "room operation failed");
                reply(
                    &outbound,
                    ServerMessage::error(ack, ROOM_UNAVAILABLE, e.to_string()),
                );
            }
        }
    }

    // Rooms drop their copies of the sender once unsubscribed; aborting
    // the writer also closes the receiver so any late broadcast fails
    // fast and prunes this connection.
    drop(guard);
    drop(outbound);
    writer.abort();
    // A client that stopped reading may never drain the close frame.
    match tokio::time::timeout(CLOSE_TIMEOUT, conn.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(%conn_id, error = %e, "close failed"),
        Err(_) => tracing::debug!(%conn_id, "close timed out"),
    }
    tracing::info!(
        %conn_id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "connection finished"
    );
    Ok(())
}

/// Waits for the next inbound frame.
///
/// Returns `None` once the connection has been silent for `limit`. Any
/// frame counts as activity, so a client that only sends WebSocket pings
/// stays connected.
async fn next_frame(
    conn: &WebSocketConnection,
    limit: Option<Duration>,
) -> Option<Result<Option<Vec<u8>>, TransportError>> {
    let Some(limit) = limit else {
        return Some(conn.recv().await);
    };
    let mut wait = limit;
    loop {
        match tokio::time::timeout(wait, conn.recv()).await {
            Ok(received) => return Some(received),
            Err(_) => {
                // Control frames are answered inside recv and never
                // returned, but they do move the activity clock.
                let idle = conn.idle_for();
                if idle >= limit {
                    return None;
                }
                wait = limit - idle;
            }
        }
    }
}

/// Routes one validated event to the coordinator.
///
/// Returns the ack body for acknowledged events.
async fn dispatch<C: Codec>(
    state: &ServerState<C>,
    guard: &mut ConnectionGuard<C>,
    outbound: &Subscriber,
    event: ClientEvent,
    started: Instant,
) -> Result<Option<Ack>, RoomError> {
    let conn_id = guard.conn_id;
    match event {
        ClientEvent::JoinRoom(join) => {
            guard.rooms.insert(join.room_id.clone());
            state
                .rooms
                .join(&join.room_id, join.user, conn_id, outbound.clone())
                .await
                .map(Some)
        }
        ClientEvent::SendVote(vote) => state
            .rooms
            .vote(&vote.room_id, vote.user, vote.vote)
            .await
            .map(Some),
        ClientEvent::ResetVotes(req) => {
            state.rooms.reset(&req.room_id).await.map(Some)
        }
        ClientEvent::RevealVotes(req) => {
            state.rooms.reveal(&req.room_id).await?;
            Ok(None)
        }
        ClientEvent::SendMessage(msg) => {
            state
                .rooms
                .send_message(&msg.room_id, msg.user, msg.message)
                .await?;
            Ok(None)
        }
        ClientEvent::Ping(ping) => {
            reply(
                outbound,
                ServerMessage::Pong {
                    client_time: ping.client_time,
                    server_time: started.elapsed().as_millis() as u64,
                },
            );
            Ok(None)
        }
    }
}

/// Queues a frame for this connection's writer.
fn reply(outbound: &Subscriber, msg: ServerMessage) {
    // A full queue trips the overflow signal the read loop waits on; a
    // closed one means the writer has stopped and recv notices soon after.
    let _ = outbound.deliver(msg);
}

/// Drains the outbound channel onto the socket.
async fn write_loop<C: Codec>(
    conn: Arc<WebSocketConnection>,
    mut outbound: mpsc::Receiver<ServerMessage>,
    state: Arc<ServerState<C>>,
) {
    let conn_id = conn.id();
    while let Some(msg) = outbound.recv().await {
        let bytes = match state.codec.encode(&msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to encode frame");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, error = %e, "send failed, stopping writer");
            break;
        }
    }
}
