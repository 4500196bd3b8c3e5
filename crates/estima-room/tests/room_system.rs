//! Integration tests for the coordinator and room actors.

use std::collections::BTreeSet;
use std::sync::Arc;

use estima_protocol::{
    Ack, ChatEntry, ParticipantsUpdate, RoomEvent, RoomId, ServerMessage,
    UserId, VoteStatus, Votes, VotesRevealed,
};
use estima_room::{Coordinator, RoomConfig, Subscriber};
use estima_transport::ConnectionId;
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

fn room(id: &str) -> RoomId {
    RoomId::from(id)
}

fn user(name: &str) -> UserId {
    UserId::from(name)
}

fn conn(id: u64) -> ConnectionId {
    ConnectionId::new(id)
}

fn subscriber() -> (Subscriber, mpsc::Receiver<ServerMessage>) {
    Subscriber::channel(256)
}

/// Everything already queued for a subscriber, as (room, event) pairs.
fn drain(
    rx: &mut mpsc::Receiver<ServerMessage>,
) -> Vec<(RoomId, RoomEvent)> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        match msg {
            ServerMessage::Broadcast { room_id, event } => {
                out.push((room_id, event))
            }
            other => panic!("room actors only broadcast, got {other:?}"),
        }
    }
    out
}

fn events(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<RoomEvent> {
    drain(rx).into_iter().map(|(_, e)| e).collect()
}

/// Waits until every command queued for `room_id` so far has run.
async fn settle(coord: &Coordinator, room_id: &RoomId) {
    let _ = coord.snapshot(room_id).await.unwrap();
}

fn participants(pairs: &[(&str, VoteStatus)]) -> RoomEvent {
    RoomEvent::UpdateParticipants(ParticipantsUpdate {
        participants: pairs
            .iter()
            .map(|(name, status)| (user(name), *status))
            .collect(),
    })
}

fn votes(pairs: &[(&str, &str)]) -> Votes {
    pairs
        .iter()
        .map(|(name, vote)| (user(name), vote.to_string()))
        .collect()
}

// =========================================================================
// join
// =========================================================================

#[tokio::test]
async fn test_join_creates_room_and_broadcasts_to_joiner() {
    let coord = Coordinator::default();
    let (tx, mut rx) = subscriber();

    let ack = coord
        .join(&room("R1"), user("alice"), conn(1), tx)
        .await
        .unwrap();

    assert_eq!(ack, Ack::success());
    assert_eq!(coord.room_count().await, 1);
    // Both broadcasts are already queued when join returns.
    assert_eq!(
        drain(&mut rx),
        vec![
            (room("R1"), participants(&[("alice", VoteStatus::NotVoted)])),
            (room("R1"), RoomEvent::UpdateChat(vec![])),
        ]
    );
}

#[tokio::test]
async fn test_second_join_reaches_existing_members() {
    let coord = Coordinator::default();
    let (tx_a, mut rx_a) = subscriber();
    let (tx_b, mut rx_b) = subscriber();

    coord.join(&room("R1"), user("alice"), conn(1), tx_a).await.unwrap();
    drain(&mut rx_a);
    coord.join(&room("R1"), user("bob"), conn(2), tx_b).await.unwrap();

    let expected = participants(&[
        ("alice", VoteStatus::NotVoted),
        ("bob", VoteStatus::NotVoted),
    ]);
    assert_eq!(events(&mut rx_a)[0], expected);
    assert_eq!(events(&mut rx_b)[0], expected);
}

#[tokio::test]
async fn test_join_sends_chat_backlog() {
    let coord = Coordinator::default();
    let (tx_a, _rx_a) = subscriber();
    coord.join(&room("R1"), user("alice"), conn(1), tx_a).await.unwrap();
    coord
        .send_message(&room("R1"), user("alice"), "first".into())
        .await
        .unwrap();
    coord
        .send_message(&room("R1"), user("alice"), "second".into())
        .await
        .unwrap();

    let (tx_b, mut rx_b) = subscriber();
    coord.join(&room("R1"), user("bob"), conn(2), tx_b).await.unwrap();

    assert_eq!(
        events(&mut rx_b)[1],
        RoomEvent::UpdateChat(vec![
            ChatEntry::new(user("alice"), "first"),
            ChatEntry::new(user("alice"), "second"),
        ])
    );
}

#[tokio::test]
async fn test_rejoin_is_idempotent() {
    let coord = Coordinator::default();
    let (tx, _rx) = subscriber();
    coord
        .join(&room("R1"), user("alice"), conn(1), tx.clone())
        .await
        .unwrap();
    coord
        .send_message(&room("R1"), user("alice"), "hi".into())
        .await
        .unwrap();
    coord.vote(&room("R1"), user("alice"), "5".into()).await.unwrap();

    coord.join(&room("R1"), user("alice"), conn(1), tx).await.unwrap();

    let snap = coord.snapshot(&room("R1")).await.unwrap().unwrap();
    assert_eq!(snap.participants.len(), 1);
    assert_eq!(snap.participants[&user("alice")], VoteStatus::NotVoted);
    assert!(snap.votes.is_empty());
    assert_eq!(snap.chat.len(), 1);
    assert_eq!(snap.subscribers, 1, "same connection subscribes once");
}

// =========================================================================
// vote / reset / reveal on unknown rooms
// =========================================================================

#[tokio::test]
async fn test_operations_on_unknown_room_are_silent_noops() {
    let coord = Coordinator::default();
    let (tx, mut rx) = subscriber();
    coord.join(&room("R1"), user("alice"), conn(1), tx).await.unwrap();
    drain(&mut rx);

    let r2 = room("R2");
    assert_eq!(
        coord.vote(&r2, user("alice"), "5".into()).await.unwrap(),
        Ack::success()
    );
    assert_eq!(coord.reset(&r2).await.unwrap(), Ack::success());
    coord.reveal(&r2).await.unwrap();
    coord.send_message(&r2, user("alice"), "hello?".into()).await.unwrap();

    assert_eq!(coord.room_count().await, 1, "no room was created");
    assert!(coord.snapshot(&r2).await.unwrap().is_none());
    settle(&coord, &room("R1")).await;
    assert!(drain(&mut rx).is_empty(), "nothing was broadcast");
}

// =========================================================================
// The alice/bob scenario
// =========================================================================

#[tokio::test]
async fn test_vote_join_reset_scenario() {
    let coord = Coordinator::default();
    let r1 = room("R1");
    let (tx_a, mut rx_a) = subscriber();
    let (tx_b, _rx_b) = subscriber();

    coord.join(&r1, user("alice"), conn(1), tx_a).await.unwrap();
    drain(&mut rx_a);

    coord.vote(&r1, user("alice"), "5".into()).await.unwrap();
    assert_eq!(
        events(&mut rx_a),
        vec![
            participants(&[("alice", VoteStatus::Voted)]),
            RoomEvent::UpdateVotes(votes(&[("alice", "5")])),
        ]
    );

    coord.join(&r1, user("bob"), conn(2), tx_b).await.unwrap();
    let snap = coord.snapshot(&r1).await.unwrap().unwrap();
    assert_eq!(snap.participants[&user("alice")], VoteStatus::Voted);
    assert_eq!(snap.participants[&user("bob")], VoteStatus::NotVoted);
    assert_eq!(snap.votes, votes(&[("alice", "5")]));
    drain(&mut rx_a);

    coord.reset(&r1).await.unwrap();
    assert_eq!(
        events(&mut rx_a),
        vec![
            participants(&[
                ("alice", VoteStatus::NotVoted),
                ("bob", VoteStatus::NotVoted),
            ]),
            RoomEvent::UpdateVotes(Votes::new()),
        ]
    );
    let snap = coord.snapshot(&r1).await.unwrap().unwrap();
    assert!(snap.votes.is_empty());
}

// =========================================================================
// reveal
// =========================================================================

#[tokio::test]
async fn test_reveal_twice_is_identical_and_read_only() {
    let coord = Coordinator::default();
    let r1 = room("R1");
    let (tx, mut rx) = subscriber();
    coord.join(&r1, user("alice"), conn(1), tx).await.unwrap();
    coord.vote(&r1, user("alice"), "8".into()).await.unwrap();
    let before = coord.snapshot(&r1).await.unwrap().unwrap();
    drain(&mut rx);

    coord.reveal(&r1).await.unwrap();
    coord.reveal(&r1).await.unwrap();
    let after = coord.snapshot(&r1).await.unwrap().unwrap();

    let revealed = events(&mut rx);
    let expected = RoomEvent::VotesRevealed(VotesRevealed {
        votes: votes(&[("alice", "8")]),
    });
    assert_eq!(revealed, vec![expected.clone(), expected]);
    assert_eq!(before, after);
}

// =========================================================================
// chat
// =========================================================================

#[tokio::test]
async fn test_each_message_broadcasts_only_itself_in_order() {
    let coord = Coordinator::default();
    let r1 = room("R1");
    let (tx, mut rx) = subscriber();
    coord.join(&r1, user("alice"), conn(1), tx).await.unwrap();
    drain(&mut rx);

    let texts = ["a", "b", "c", "d", "e"];
    for text in texts {
        coord
            .send_message(&r1, user("alice"), text.into())
            .await
            .unwrap();
    }
    settle(&coord, &r1).await;

    let received = events(&mut rx);
    assert_eq!(received.len(), texts.len());
    for (event, text) in received.iter().zip(texts) {
        assert_eq!(
            *event,
            RoomEvent::UpdateChat(vec![ChatEntry::new(user("alice"), text)])
        );
    }
    let snap = coord.snapshot(&r1).await.unwrap().unwrap();
    let stored: Vec<&str> = snap.chat.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(stored, texts);
}

// =========================================================================
// Broadcast groups
// =========================================================================

#[tokio::test]
async fn test_rooms_do_not_leak_broadcasts() {
    let coord = Coordinator::default();
    let (tx1, mut rx1) = subscriber();
    let (tx2, mut rx2) = subscriber();
    coord.join(&room("R1"), user("alice"), conn(1), tx1).await.unwrap();
    coord.join(&room("R2"), user("bob"), conn(2), tx2).await.unwrap();
    drain(&mut rx1);
    drain(&mut rx2);

    coord.vote(&room("R2"), user("bob"), "3".into()).await.unwrap();

    assert!(drain(&mut rx1).is_empty());
    assert!(drain(&mut rx2).iter().all(|(id, _)| *id == room("R2")));
}

#[tokio::test]
async fn test_one_connection_can_be_in_several_rooms() {
    let coord = Coordinator::default();
    let (tx, mut rx) = subscriber();
    coord
        .join(&room("R1"), user("alice"), conn(1), tx.clone())
        .await
        .unwrap();
    coord.join(&room("R2"), user("alice"), conn(1), tx).await.unwrap();
    drain(&mut rx);

    coord.reset(&room("R1")).await.unwrap();
    coord.reset(&room("R2")).await.unwrap();

    let rooms: BTreeSet<RoomId> =
        drain(&mut rx).into_iter().map(|(id, _)| id).collect();
    assert_eq!(rooms, BTreeSet::from([room("R1"), room("R2")]));
}

#[tokio::test]
async fn test_closed_subscriber_is_pruned() {
    let coord = Coordinator::default();
    let r1 = room("R1");
    let (tx_a, rx_a) = subscriber();
    let (tx_b, mut rx_b) = subscriber();
    coord.join(&r1, user("alice"), conn(1), tx_a).await.unwrap();
    coord.join(&r1, user("bob"), conn(2), tx_b).await.unwrap();
    drop(rx_a);

    coord.vote(&r1, user("bob"), "1".into()).await.unwrap();

    let snap = coord.snapshot(&r1).await.unwrap().unwrap();
    assert_eq!(snap.subscribers, 1);
    assert!(snap.participants.contains_key(&user("alice")));
    assert!(!events(&mut rx_b).is_empty());
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery_but_keeps_participant() {
    let coord = Coordinator::default();
    let r1 = room("R1");
    let (tx, mut rx) = subscriber();
    coord.join(&r1, user("alice"), conn(1), tx).await.unwrap();
    drain(&mut rx);

    coord.unsubscribe(&r1, conn(1)).await.unwrap();
    coord.reveal(&r1).await.unwrap();
    let snap = coord.snapshot(&r1).await.unwrap().unwrap();

    assert!(drain(&mut rx).is_empty());
    assert_eq!(snap.subscribers, 0);
    assert_eq!(snap.participants[&user("alice")], VoteStatus::NotVoted);
}

// =========================================================================
// Concurrency
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_votes_are_linearizable() {
    let coord = Arc::new(Coordinator::new(RoomConfig { command_buffer: 4 }));
    let r1 = room("R1");
    // Sees every join and vote below.
    let (observer, mut rx) = Subscriber::channel(1024);
    coord
        .join(&r1, user("observer"), conn(0), observer)
        .await
        .unwrap();
    drain(&mut rx);

    let mut tasks = Vec::new();
    for i in 1..=32u64 {
        let coord = Arc::clone(&coord);
        let r1 = r1.clone();
        tasks.push(tokio::spawn(async move {
            let (tx, _rx) = subscriber();
            let name = user(&format!("user-{i}"));
            coord.join(&r1, name.clone(), conn(i), tx).await.unwrap();
            coord.vote(&r1, name, i.to_string()).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let snap = coord.snapshot(&r1).await.unwrap().unwrap();
    assert_eq!(snap.votes.len(), 32);
    for i in 1..=32u64 {
        let name = user(&format!("user-{i}"));
        assert_eq!(snap.participants[&name], VoteStatus::Voted);
        assert_eq!(snap.votes[&name], i.to_string());
    }

    // Every vote broadcast pair was computed from one consistent state:
    // the voted set in updateParticipants equals the keys of the
    // updateVotes that immediately follows it.
    let received = events(&mut rx);
    let mut pending: Option<BTreeSet<UserId>> = None;
    let mut pairs = 0;
    for event in received {
        match event {
            RoomEvent::UpdateParticipants(update) => {
                pending = Some(
                    update
                        .participants
                        .into_iter()
                        .filter(|(_, s)| *s == VoteStatus::Voted)
                        .map(|(u, _)| u)
                        .collect(),
                );
            }
            RoomEvent::UpdateVotes(v) => {
                let voted = pending.take().expect("votes follow participants");
                assert_eq!(voted, v.keys().cloned().collect());
                pairs += 1;
            }
            RoomEvent::UpdateChat(_) => {
                pending = None;
            }
            RoomEvent::VotesRevealed(_) => panic!("nobody revealed"),
        }
    }
    assert_eq!(pairs, 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_joins_create_one_room() {
    let coord = Arc::new(Coordinator::default());
    let mut tasks = Vec::new();
    for i in 0..16u64 {
        let coord = Arc::clone(&coord);
        tasks.push(tokio::spawn(async move {
            let (tx, _rx) = subscriber();
            coord
                .join(&room("shared"), user(&format!("u{i}")), conn(i), tx)
                .await
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(coord.room_count().await, 1);
    let snap = coord.snapshot(&room("shared")).await.unwrap().unwrap();
    assert_eq!(snap.participants.len(), 16);
}

#[tokio::test]
async fn test_lagging_subscriber_is_dropped_and_signalled() {
    let coord = Coordinator::default();
    let r1 = room("R1");
    // Room for the two join broadcasts only.
    let (slow, mut slow_rx) = Subscriber::channel(2);
    let watcher = slow.clone();
    let (tx, mut rx) = subscriber();
    coord.join(&r1, user("slow"), conn(1), slow).await.unwrap();
    coord.join(&r1, user("alice"), conn(2), tx).await.unwrap();

    coord.vote(&r1, user("alice"), "5".into()).await.unwrap();

    let snap = coord.snapshot(&r1).await.unwrap().unwrap();
    assert_eq!(snap.subscribers, 1, "the full queue was dropped");
    assert!(snap.participants.contains_key(&user("slow")));
    tokio::time::timeout(std::time::Duration::from_secs(1), watcher.overflowed())
        .await
        .expect("owner of the full queue is told");
    assert_eq!(events(&mut slow_rx).len(), 2);
    assert!(!events(&mut rx).is_empty());
}

#[tokio::test]
async fn test_room_ids_lists_joined_rooms_only() {
    let coord = Coordinator::default();
    let (tx, _rx) = subscriber();
    coord
        .join(&room("b"), user("alice"), conn(1), tx.clone())
        .await
        .unwrap();
    coord.join(&room("a"), user("alice"), conn(1), tx).await.unwrap();
    coord.vote(&room("never"), user("alice"), "1".into()).await.unwrap();

    let mut ids = coord.room_ids().await;
    ids.sort();
    assert_eq!(ids, [room("a"), room("b")]);
}
