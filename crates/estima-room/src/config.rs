//! Room configuration.

use serde::{Deserialize, Serialize};

/// Settings shared by every room the coordinator spawns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Capacity of each room actor's command queue. When full, callers
    /// wait, which throttles a single busy room without affecting others.
    pub command_buffer: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self { command_buffer: 64 }
    }
}

impl RoomConfig {
    /// Returns a config whose buffer is at least 1 (`mpsc::channel`
    /// panics on zero).
    pub fn validated(mut self) -> Self {
        if self.command_buffer == 0 {
            tracing::warn!("room command_buffer of 0 raised to 1");
            self.command_buffer = 1;
        }
        self
    }
}
