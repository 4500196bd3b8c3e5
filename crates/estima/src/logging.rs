//! Tracing subscriber setup for binaries built on Estima.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use tracing_subscriber::util::TryInitError;

/// Installs the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` (e.g. `"info"` or
/// `"estima=debug"`) is used.
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init_logging(default_level: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails_instead_of_panicking() {
        let _ = init_logging("info");
        assert!(init_logging("debug").is_err());
    }
}
