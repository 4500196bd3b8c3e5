//! Server configuration, loadable from the environment.

use std::time::Duration;

use estima_room::RoomConfig;
use serde::{Deserialize, Serialize};

/// Address the server binds to when nothing else is configured.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

const ENV_BIND_ADDR: &str = "ESTIMA_BIND_ADDR";
const ENV_ALLOWED_ORIGINS: &str = "ESTIMA_ALLOWED_ORIGINS";
const ENV_IDLE_TIMEOUT_SECS: &str = "ESTIMA_IDLE_TIMEOUT_SECS";
const ENV_ROOM_COMMAND_BUFFER: &str = "ESTIMA_ROOM_COMMAND_BUFFER";
const ENV_OUTBOUND_BUFFER: &str = "ESTIMA_OUTBOUND_BUFFER";

/// A configuration value could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: String, value: String },
}

/// Everything the server needs to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `host:port` to listen on.
    pub bind_addr: String,

    /// Browser origins allowed to connect. Empty means any.
    pub allowed_origins: Vec<String>,

    /// Seconds without an inbound frame before a connection is closed.
    /// `0` disables the timeout.
    pub idle_timeout_secs: u64,

    /// Frames queued per connection before a client that is not reading
    /// gets disconnected.
    pub outbound_buffer: usize,

    /// Settings for every room.
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            allowed_origins: Vec::new(),
            idle_timeout_secs: 120,
            outbound_buffer: 256,
            room: RoomConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads `ESTIMA_*` variables on top of the defaults.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `ESTIMA_BIND_ADDR` | `bind_addr` |
    /// | `ESTIMA_ALLOWED_ORIGINS` | `allowed_origins` (comma separated) |
    /// | `ESTIMA_IDLE_TIMEOUT_SECS` | `idle_timeout_secs` |
    /// | `ESTIMA_OUTBOUND_BUFFER` | `outbound_buffer` |
    /// | `ESTIMA_ROOM_COMMAND_BUFFER` | `room.command_buffer` |
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads variables through
    /// `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup(ENV_BIND_ADDR) {
            let addr = addr.trim();
            if !addr.is_empty() {
                config.bind_addr = addr.to_string();
            }
        }
        if let Some(origins) = lookup(ENV_ALLOWED_ORIGINS) {
            config.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(secs) = lookup(ENV_IDLE_TIMEOUT_SECS) {
            config.idle_timeout_secs = parse(ENV_IDLE_TIMEOUT_SECS, &secs)?;
        }
        if let Some(buffer) = lookup(ENV_OUTBOUND_BUFFER) {
            config.outbound_buffer = parse(ENV_OUTBOUND_BUFFER, &buffer)?;
        }
        if let Some(buffer) = lookup(ENV_ROOM_COMMAND_BUFFER) {
            config.room.command_buffer =
                parse(ENV_ROOM_COMMAND_BUFFER, &buffer)?;
        }

        Ok(config)
    }

    /// The idle timeout, or `None` when disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0)
            .then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    })
}
