//! Room state: participants, votes, and chat, with no I/O.
//!
//! The actor in [`room`](crate::room) owns one [`Room`] and is the only
//! thing that mutates it. Every method here keeps two invariants:
//!
//! - every key in `votes` is also a key in `participants`;
//! - a participant is [`VoteStatus::Voted`] iff they have an entry in `votes`.

use estima_protocol::{
    ChatEntry, Participants, ParticipantsUpdate, RoomEvent, UserId,
    VoteStatus, Votes, VotesRevealed,
};

/// The mutable state of one room.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Room {
    participants: Participants,
    votes: Votes,
    chat: Vec<ChatEntry>,
}

impl Room {
    /// Creates an empty room.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `user`, or puts a returning user back to not-voted.
    ///
    /// A returning user's old vote is dropped along with their status.
    pub fn join(&mut self, user: UserId) {
        self.votes.remove(&user);
        self.participants.insert(user, VoteStatus::NotVoted);
    }

    /// Records `vote` for `user`, replacing any earlier vote. A user who
    /// never joined becomes a participant.
    pub fn vote(&mut self, user: UserId, vote: String) {
        self.participants.insert(user.clone(), VoteStatus::Voted);
        self.votes.insert(user, vote);
    }

    /// Clears every vote and puts every participant back to not-voted.
    pub fn reset(&mut self) {
        self.votes.clear();
        for status in self.participants.values_mut() {
            *status = VoteStatus::NotVoted;
        }
    }

    /// Appends a chat line and returns it.
    pub fn push_message(&mut self, user: UserId, message: String) -> ChatEntry {
        let entry = ChatEntry { user, message };
        self.chat.push(entry.clone());
        entry
    }

    pub fn participants(&self) -> &Participants {
        &self.participants
    }

    pub fn votes(&self) -> &Votes {
        &self.votes
    }

    pub fn chat(&self) -> &[ChatEntry] {
        &self.chat
    }

    /// `updateParticipants` with the full mapping.
    pub fn participants_event(&self) -> RoomEvent {
        RoomEvent::UpdateParticipants(ParticipantsUpdate {
            participants: self.participants.clone(),
        })
    }

    /// `updateVotes` with the full mapping.
    pub fn votes_event(&self) -> RoomEvent {
        RoomEvent::UpdateVotes(self.votes.clone())
    }

    /// `updateChat` with the whole history.
    pub fn chat_history_event(&self) -> RoomEvent {
        RoomEvent::UpdateChat(self.chat.clone())
    }

    /// `votesRevealed` with the current votes.
    pub fn revealed_event(&self) -> RoomEvent {
        RoomEvent::VotesRevealed(VotesRevealed {
            votes: self.votes.clone(),
        })
    }
}
