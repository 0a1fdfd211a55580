//! IMAP connection management.
//!
//! This module provides connection handling for IMAP servers, including:
//! - Configuration (host, port, security mode, literal policy)
//! - Pluggable transports with in-place TLS upgrade
//! - Framed I/O that reads one complete response at a time
//! - The SASL security layer adapter
//! - The client that runs command exchanges

mod client;
mod config;
mod framed;
mod sasl_stream;
mod stream;

pub use client::{Client, ClientBuilder, Completion, SessionState};
pub use config::{Config, ConfigBuilder, Security};
pub use framed::FramedStream;
pub use sasl_stream::SaslStream;
pub use stream::{
    BoxFuture, BoxedIo, Connector, ImapIo, OnceConnector, RustlsUpgrader, StreamUpgrader,
    TcpConnector, create_tls_connector,
};
