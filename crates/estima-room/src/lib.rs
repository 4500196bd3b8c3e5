//! Room state and coordination for Estima.
//!
//! Each room runs as an isolated Tokio task (actor model) owning its
//! participants, votes, chat, and broadcast group. All operations on one
//! room are applied in arrival order; different rooms run independently.
//!
//! # Key types
//!
//! - [`Coordinator`]: finds or creates rooms and routes operations
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`Room`]: the pure state one actor owns
//! - [`RoomConfig`]: per-room settings

mod config;
mod coordinator;
mod error;
mod room;
mod state;

pub use config::RoomConfig;
pub use coordinator::Coordinator;
pub use error::RoomError;
pub use room::{RoomHandle, RoomSnapshot, Subscriber};
pub use state::Room;
