//! IMAP protocol parser.
//!
//! A sans-I/O parser for IMAP4rev1 server responses (RFC 3501), including
//! the UIDPLUS, ACL, QUOTA and NAMESPACE extensions.
//!
//! # Architecture
//!
//! - **Tokenizer**: turns a response [`Frame`] into IMAP tokens (atoms,
//!   numbers, strings, literals, delimiters and line markers)
//! - **Response Parser**: builds structured response objects from tokens
//!
//! # Example
//!
//! ```
//! use tessera_imap::parser::{Response, ResponseParser, UntaggedResponse};
//!
//! let response = ResponseParser::parse(b"* 3 EXISTS\r\n").unwrap();
//! assert_eq!(response, Response::Untagged(UntaggedResponse::Exists(3)));
//! ```

pub mod response;
pub mod tokenizer;

pub use response::{
    Address, BodyPart, BodyStructure, Disposition, Envelope, FetchItem, Multipart, PartKind,
    Response, ResponseParser, UntaggedResponse,
};
pub use tokenizer::{Frame, FramePart, Token, Tokenizer};
