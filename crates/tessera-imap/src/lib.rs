//! # tessera-imap
//!
//! An IMAP4rev1 (RFC 3501) client protocol engine with the UIDPLUS, ACL,
//! QUOTA, NAMESPACE and SASL-IR extensions.
//!
//! ## Features
//!
//! - **Lazy connections**: the first command connects, reads the greeting
//!   and runs STARTTLS when configured
//! - **Event handler**: untagged server data is delivered to a
//!   [`ResponseHandler`] as it arrives, before the command completes
//! - **Streaming literals**: payloads above a threshold go to a
//!   [`LiteralFactory`] instead of memory
//! - **STARTTLS and SASL security layers** replace the transport in place
//! - **TLS via rustls**: secure connections without OpenSSL dependency
//! - **Sans-I/O parser**: protocol parsing separated from network I/O
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use tessera_imap::{Client, Config, LoggingHandler};
//! use tessera_imap::command::{FetchAttribute, FetchItems};
//! use tessera_sasl::Credentials;
//!
//! #[tokio::main]
//! async fn main() -> tessera_imap::Result<()> {
//!     let config = Config::new("imap.example.com");
//!     let mut client = Client::with_handler(config, LoggingHandler);
//!
//!     let creds = Arc::new(Credentials::new("user@example.com", "password"));
//!     if !client.authenticate("PLAIN", creds).await? {
//!         return Ok(());
//!     }
//!
//!     client.select("INBOX").await?;
//!     let items = FetchItems::Items(vec![FetchAttribute::Envelope, FetchAttribute::Uid]);
//!     client.fetch(None, &items).await?;
//!
//!     client.logout().await
//! }
//! ```
//!
//! ## Errors
//!
//! A tagged NO is not an error: command methods return `Ok(false)`. Every
//! [`Error`] leaves the client unusable until [`Client::disconnect`].
//!
//! ## Modules
//!
//! - [`command`]: IMAP command builders and types
//! - [`connection`]: Transports, framing and the client
//! - [`handler`]: The event handler interface and stock handlers
//! - [`literal`]: Literal payloads and their storage
//! - [`parser`]: Sans-I/O response parser
//! - [`types`]: Core IMAP types (flags, mailboxes, sets, etc.)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod handler;
pub mod literal;
pub mod parser;
pub mod types;

pub use command::{
    Command, FetchAttribute, FetchItems, SearchCriteria, SequenceSet, StatusAttribute,
    StoreAction, TagGenerator,
};
pub use connection::{
    Client, ClientBuilder, Completion, Config, ConfigBuilder, Connector, FramedStream, Security,
    SessionState, StreamUpgrader,
};
pub use error::{Error, Result};
pub use handler::{CollectingHandler, Event, LoggingHandler, NoopHandler, ResponseHandler};
pub use literal::{FileLiteralFactory, Literal, LiteralFactory, MemoryLiteralFactory};
pub use parser::{Response, ResponseParser, UntaggedResponse};
pub use types::{
    Flag, Flags, ListEntry, MailboxStatus, MessageSet, NumberSet, ResponseCode, Status, UidSet,
};

/// IMAP protocol version supported.
pub const IMAP_VERSION: &str = "IMAP4rev1";
