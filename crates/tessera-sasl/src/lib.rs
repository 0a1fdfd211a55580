//! # tessera-sasl
//!
//! Client-side SASL (RFC 4422) mechanisms for email protocols.
//!
//! A [`SaslClient`] turns server challenges into client responses. Each
//! instance drives one authentication exchange and, when the mechanism
//! negotiates integrity or confidentiality, wraps and unwraps the traffic
//! that follows.
//!
//! ## Mechanisms
//!
//! - PLAIN (RFC 4616)
//! - LOGIN
//! - CRAM-MD5 (RFC 2195)
//! - OAUTHBEARER (RFC 7628)
//! - XOAUTH2 (Google/Microsoft)
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use tessera_sasl::{Credentials, client_for};
//!
//! let creds = Arc::new(Credentials::new("alice", "secret"));
//! let mut client = client_for("PLAIN", creds).unwrap();
//! assert!(client.has_initial_response());
//! assert_eq!(client.evaluate_challenge(b"").unwrap(), b"\0alice\0secret");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cram_md5;
mod credentials;
mod error;
mod mechanism;
mod oauth;
mod plain;

pub use cram_md5::CramMd5;
pub use credentials::{CredentialProvider, Credentials};
pub use error::{Error, Result};
pub use mechanism::{Qop, SUPPORTED_MECHANISMS, SaslClient, client_for};
pub use oauth::{OAuthBearer, XOAuth2};
pub use plain::{Login, Plain};
