//! Error types for SASL operations.

/// Result type alias for SASL operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SASL error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server sent a challenge the mechanism cannot answer.
    #[error("invalid challenge for {mechanism}: {reason}")]
    InvalidChallenge {
        /// Mechanism name.
        mechanism: &'static str,
        /// What was wrong with the challenge.
        reason: String,
    },

    /// The credential provider could not supply a required value.
    #[error("missing credential: {0}")]
    MissingCredentials(&'static str),

    /// No client implementation exists for the mechanism.
    #[error("unsupported SASL mechanism: {0}")]
    UnsupportedMechanism(String),

    /// Wrap or unwrap was requested but no security layer was negotiated.
    #[error("no security layer negotiated for {0}")]
    NoSecurityLayer(&'static str),

    /// Malformed base64 or security layer data.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Self::Encoding(err.to_string())
    }
}
