//! Error types for the IMAP library.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during IMAP operations.
///
/// A tagged NO is not an error: commands report it as `Ok(false)`. Every
/// other variant except `InvalidState` and `InvalidCommand` is fatal to the
/// exchange in flight, and the client refuses further commands until it is
/// disconnected.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Malformed server data.
    #[error("Parse error at position {position}: {message}")]
    Parse {
        /// Byte offset in the response line where the error occurred.
        position: usize,
        /// Description of what went wrong, including the offending token.
        message: String,
    },

    /// The stream ended before a literal was complete.
    #[error("Truncated literal: expected {expected} bytes, received {received}")]
    Truncated {
        /// Announced literal size.
        expected: usize,
        /// Bytes read before end of stream.
        received: usize,
    },

    /// Server returned BAD.
    #[error("Server returned BAD for {command}: {text}")]
    Bad {
        /// Command that was rejected, or `*` for an untagged BAD.
        command: String,
        /// Response text.
        text: String,
    },

    /// Server sent BYE (disconnecting).
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A caller-supplied argument cannot be sent safely; nothing was written.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// SASL security layer failure after authentication.
    #[error("SASL error: {0}")]
    Sasl(#[from] tessera_sasl::Error),
}

impl Error {
    /// Builds a parse error.
    pub(crate) fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
