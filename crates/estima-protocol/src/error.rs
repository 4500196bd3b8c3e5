//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The frame is not a well-formed envelope: malformed JSON, unknown
    /// event name, or wrong field types.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame decoded but a required field is missing or empty.
    /// Reported to the sender only, never broadcast.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ProtocolError {
    /// HTTP-style status code used when reporting this error to a client.
    pub fn status_code(&self) -> u16 {
        match self {
            #[cfg(feature = "json")]
            Self::Encode(_) => 500,
            #[cfg(feature = "json")]
            Self::Decode(_) => 400,
            Self::BadRequest(_) => 400,
        }
    }
}
