//! Token types.

use crate::literal::Literal;

/// A lexical token of an IMAP server response.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `NIL`.
    Nil,
    /// Atom, including `\`-prefixed flag atoms.
    Atom(String),
    /// Number (all-digit atom).
    Number(u64),
    /// Literal payload.
    Literal(Literal),
    /// Quoted string with escapes removed.
    QuotedString(String),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// Command tag at the start of a tagged response.
    Tag(String),
    /// `*` at the start of an untagged response.
    Untagged,
    /// `+` at the start of a continuation request.
    Continuation,
    /// CRLF terminating the response.
    EndOfLine,
}

impl Token {
    /// Returns true for `(`.
    #[must_use]
    pub const fn is_lparen(&self) -> bool {
        matches!(self, Self::LParen)
    }

    /// Returns true for `)`.
    #[must_use]
    pub const fn is_rparen(&self) -> bool {
        matches!(self, Self::RParen)
    }

    /// Returns true for the end-of-line marker.
    #[must_use]
    pub const fn is_end_of_line(&self) -> bool {
        matches!(self, Self::EndOfLine)
    }
}
