//! IMAP tokenizer for server responses.
//!
//! The tokenizer works on one complete [`Frame`] at a time, so it never
//! performs I/O. It is a small state machine:
//!
//! - `Init`: expects a tag, `*` or `+` at the start of the line.
//! - `Body`: yields value and delimiter tokens, skipping spaces.
//! - `EndOfLine`: reached on CRLF; yields only [`Token::EndOfLine`] until
//!   [`Tokenizer::reset`] is called.

#![allow(clippy::missing_errors_doc)]

mod frame;
mod token;

pub use frame::{Frame, FramePart, literal_announcement, trailing_literal};
pub use token::Token;

use bytes::Bytes;

use crate::literal::Literal;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Body,
    EndOfLine,
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    part: usize,
    pos: usize,
    offset: usize,
    state: State,
}

/// Tokenizer over one response frame.
#[derive(Debug)]
pub struct Tokenizer {
    frame: Frame,
    part: usize,
    pos: usize,
    /// Bytes in parts before `part`, for error positions.
    offset: usize,
    state: State,
}

impl Tokenizer {
    /// Creates a tokenizer positioned at the start of the frame.
    #[must_use]
    pub const fn new(frame: Frame) -> Self {
        Self {
            frame,
            part: 0,
            pos: 0,
            offset: 0,
            state: State::Init,
        }
    }

    /// Creates a tokenizer over an in-memory response.
    pub fn from_bytes(input: &[u8]) -> Result<Self> {
        Ok(Self::new(Frame::from_bytes(input)?))
    }

    /// Byte offset of the next unread byte within the frame.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.offset + self.pos
    }

    /// Returns true once the terminating CRLF has been consumed.
    #[must_use]
    pub fn at_end_of_line(&self) -> bool {
        self.state == State::EndOfLine
    }

    /// Returns the next token.
    pub fn next(&mut self) -> Result<Token> {
        match self.state {
            State::EndOfLine => Ok(Token::EndOfLine),
            State::Init => self.next_initial(),
            State::Body => self.next_body(),
        }
    }

    /// Returns the next token without consuming it.
    pub fn peek(&mut self) -> Result<Token> {
        let mark = self.mark();
        let token = self.next();
        self.rewind(mark);
        token
    }

    /// Returns the rest of the current line as text, without the CRLF.
    pub fn collect_to_end_of_line(&mut self) -> String {
        if self.state == State::EndOfLine {
            return String::new();
        }
        let line = self.line();
        let end = line.strip_suffix(b"\r\n").map_or(line.len(), <[u8]>::len);
        let start = self.pos.min(end);
        let text = String::from_utf8_lossy(&line[start..end]).into_owned();
        self.pos = line.len();
        self.state = State::EndOfLine;
        text
    }

    /// Skips spaces and returns the next raw byte of the line without consuming it.
    ///
    /// Used where free text may follow, since text need not tokenize.
    pub fn peek_byte(&mut self) -> Option<u8> {
        if self.state != State::Body {
            return None;
        }
        let line = self.line();
        while line.get(self.pos) == Some(&b' ') {
            self.pos += 1;
        }
        line.get(self.pos).copied()
    }

    /// Returns the raw text up to the next `]` on this line and consumes the `]`.
    pub fn collect_to_close_bracket(&mut self) -> Result<String> {
        let line = self.line();
        let start = self.pos.min(line.len());
        let Some(len) = line[start..].iter().position(|&b| b == b']') else {
            return Err(self.error("unterminated response code"));
        };
        let text = String::from_utf8_lossy(&line[start..start + len])
            .trim()
            .to_string();
        self.pos = start + len + 1;
        Ok(text)
    }

    /// Returns to the start-of-line state and flushes the wire trace.
    pub fn reset(&mut self) {
        tracing::trace!(target: "tessera_imap::wire", "S: {}", self.frame.summary());
        self.state = State::Init;
    }

    const fn mark(&self) -> Mark {
        Mark {
            part: self.part,
            pos: self.pos,
            offset: self.offset,
            state: self.state,
        }
    }

    const fn rewind(&mut self, mark: Mark) {
        self.part = mark.part;
        self.pos = mark.pos;
        self.offset = mark.offset;
        self.state = mark.state;
    }

    fn line(&self) -> Bytes {
        match self.frame.parts().get(self.part) {
            Some(FramePart::Line(line)) => line.clone(),
            _ => Bytes::new(),
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::parse(self.position(), message)
    }

    fn next_initial(&mut self) -> Result<Token> {
        let line = self.line();
        let token = match line.get(self.pos) {
            None => return Err(self.error("empty response")),
            Some(b'*') => {
                if line.get(self.pos + 1) != Some(&b' ') {
                    return Err(self.error("expected space after '*'"));
                }
                self.pos += 2;
                Token::Untagged
            }
            Some(b'+') => {
                self.pos += 1;
                if line.get(self.pos) == Some(&b' ') {
                    self.pos += 1;
                }
                Token::Continuation
            }
            Some(_) => {
                let start = self.pos;
                while line
                    .get(self.pos)
                    .is_some_and(|&b| is_atom_char(b) || b == b']')
                {
                    self.pos += 1;
                }
                if self.pos == start {
                    return Err(self.error(format!(
                        "unexpected byte {:#04x} at start of response",
                        line[start]
                    )));
                }
                Token::Tag(String::from_utf8_lossy(&line[start..self.pos]).into_owned())
            }
        };
        self.state = State::Body;
        Ok(token)
    }

    fn next_body(&mut self) -> Result<Token> {
        let line = self.line();
        while line.get(self.pos) == Some(&b' ') {
            self.pos += 1;
        }
        let Some(&byte) = line.get(self.pos) else {
            return Err(self.error("unexpected end of response line"));
        };

        match byte {
            b'\r' => {
                if line.get(self.pos + 1) == Some(&b'\n') {
                    self.pos += 2;
                    self.state = State::EndOfLine;
                    Ok(Token::EndOfLine)
                } else {
                    Err(self.error("expected LF after CR"))
                }
            }
            b'(' => self.single(Token::LParen),
            b')' => self.single(Token::RParen),
            b'[' => self.single(Token::LBracket),
            b']' => self.single(Token::RBracket),
            b'"' => self.read_quoted(&line),
            b'{' => self.read_literal(&line),
            b'\\' => Ok(self.read_flag(&line)),
            b'0'..=b'9' => Ok(self.read_number_or_atom(&line)),
            _ if is_atom_char(byte) => Ok(self.read_atom(&line)),
            _ => Err(self.error(format!("unexpected byte {byte:#04x}"))),
        }
    }

    const fn single(&mut self, token: Token) -> Result<Token> {
        self.pos += 1;
        Ok(token)
    }

    fn take_atom_chars(&mut self, line: &[u8]) -> usize {
        let start = self.pos;
        while line.get(self.pos).copied().is_some_and(is_atom_char) {
            self.pos += 1;
        }
        start
    }

    fn read_atom(&mut self, line: &[u8]) -> Token {
        let start = self.take_atom_chars(line);
        let atom = &line[start..self.pos];
        if atom.eq_ignore_ascii_case(b"NIL") {
            Token::Nil
        } else {
            Token::Atom(String::from_utf8_lossy(atom).into_owned())
        }
    }

    /// Reads `\Flag`; `\*` is kept whole.
    fn read_flag(&mut self, line: &[u8]) -> Token {
        let start = self.pos;
        self.pos += 1;
        if line.get(self.pos) == Some(&b'*') {
            self.pos += 1;
        } else {
            self.take_atom_chars(line);
        }
        Token::Atom(String::from_utf8_lossy(&line[start..self.pos]).into_owned())
    }

    /// A digit run is a number unless more atom characters follow it.
    fn read_number_or_atom(&mut self, line: &[u8]) -> Token {
        let start = self.take_atom_chars(line);
        let text = &line[start..self.pos];
        if text.iter().all(u8::is_ascii_digit)
            && let Some(n) = std::str::from_utf8(text)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
        {
            return Token::Number(n);
        }
        Token::Atom(String::from_utf8_lossy(text).into_owned())
    }

    fn read_quoted(&mut self, line: &[u8]) -> Result<Token> {
        self.pos += 1;
        let mut value = Vec::new();
        loop {
            match line.get(self.pos) {
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    match line.get(self.pos + 1) {
                        Some(&c) if c != b'\r' && c != b'\n' => value.push(c),
                        _ => return Err(self.error("unterminated escape in quoted string")),
                    }
                    self.pos += 2;
                }
                Some(b'\n') => return Err(self.error("LF in quoted string")),
                Some(b'\r') | None => return Err(self.error("unterminated quoted string")),
                Some(&c) => {
                    value.push(c);
                    self.pos += 1;
                }
            }
        }
        Ok(Token::QuotedString(
            String::from_utf8_lossy(&value).into_owned(),
        ))
    }

    fn read_literal(&mut self, line: &Bytes) -> Result<Token> {
        if self.pos > 0 && !matches!(line[self.pos - 1], b' ' | b'(') {
            return Err(self.error("literal must start a token"));
        }
        let Some(size) = literal_announcement(&line[self.pos..]) else {
            return Err(self.error("malformed literal announcement"));
        };
        let literal = match self.frame.parts().get(self.part + 1) {
            Some(FramePart::Literal(literal)) => literal.clone(),
            _ => {
                return Err(Error::Truncated {
                    expected: size,
                    received: 0,
                });
            }
        };
        if literal.len() != size {
            return Err(Error::Truncated {
                expected: size,
                received: literal.len(),
            });
        }
        self.offset += line.len() + size;
        self.part += 2;
        self.pos = 0;
        Ok(Token::Literal(literal))
    }

    /// Consumes a token, failing unless it matches `expected`'s kind.
    pub fn expect(&mut self, expected: &Token) -> Result<()> {
        let token = self.next()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {expected:?}, got {token:?}")))
        }
    }

    /// Reads an atom.
    pub fn read_atom_string(&mut self) -> Result<String> {
        match self.next()? {
            Token::Atom(s) => Ok(s),
            Token::Number(n) => Ok(n.to_string()),
            token => Err(self.error(format!("expected atom, got {token:?}"))),
        }
    }

    /// Reads an astring: atom, number, quoted string or literal.
    pub fn read_astring(&mut self) -> Result<String> {
        match self.next()? {
            Token::Atom(s) | Token::QuotedString(s) => Ok(s),
            Token::Number(n) => Ok(n.to_string()),
            Token::Literal(literal) => Ok(literal.to_string_lossy()?),
            token => Err(self.error(format!("expected string, got {token:?}"))),
        }
    }

    /// Reads an nstring: `NIL` or a string.
    pub fn read_nstring(&mut self) -> Result<Option<String>> {
        match self.next()? {
            Token::Nil => Ok(None),
            Token::QuotedString(s) | Token::Atom(s) => Ok(Some(s)),
            Token::Number(n) => Ok(Some(n.to_string())),
            Token::Literal(literal) => Ok(Some(literal.to_string_lossy()?)),
            token => Err(self.error(format!("expected nstring, got {token:?}"))),
        }
    }

    /// Reads a string value as a literal handle, keeping large payloads in storage.
    pub fn read_nliteral(&mut self) -> Result<Option<Literal>> {
        match self.next()? {
            Token::Nil => Ok(None),
            Token::Literal(literal) => Ok(Some(literal)),
            Token::QuotedString(s) | Token::Atom(s) => Ok(Some(Literal::Memory(Bytes::from(s)))),
            token => Err(self.error(format!("expected string or NIL, got {token:?}"))),
        }
    }

    /// Reads a 64-bit number.
    pub fn read_u64(&mut self) -> Result<u64> {
        match self.next()? {
            Token::Number(n) => Ok(n),
            token => Err(self.error(format!("expected number, got {token:?}"))),
        }
    }

    /// Reads a 32-bit number.
    pub fn read_u32(&mut self) -> Result<u32> {
        let n = self.read_u64()?;
        u32::try_from(n).map_err(|_| self.error(format!("number {n} out of 32-bit range")))
    }

    /// Skips tokens up to and including the `)` closing the current list.
    pub fn skip_list_remainder(&mut self) -> Result<()> {
        let mut depth = 1usize;
        while depth > 0 {
            match self.next()? {
                Token::LParen => depth += 1,
                Token::RParen => depth -= 1,
                Token::EndOfLine => return Err(self.error("unbalanced parentheses")),
                _ => {}
            }
        }
        Ok(())
    }

    /// Skips tokens up to and including the `]` closing the current bracket.
    pub fn skip_bracket_remainder(&mut self) -> Result<()> {
        let mut depth = 1usize;
        while depth > 0 {
            match self.next()? {
                Token::LBracket => depth += 1,
                Token::RBracket => depth -= 1,
                Token::EndOfLine => return Err(self.error("unbalanced brackets")),
                _ => {}
            }
        }
        Ok(())
    }

    /// Skips one value, which may be a parenthesised list.
    pub fn skip_value(&mut self) -> Result<()> {
        match self.next()? {
            Token::LParen => self.skip_list_remainder(),
            Token::EndOfLine | Token::RParen => Err(self.error("expected value")),
            _ => Ok(()),
        }
    }

    /// Returns true if the next token is `)`.
    pub fn next_is_rparen(&mut self) -> Result<bool> {
        Ok(self.peek()?.is_rparen())
    }

    /// Returns true if the next token ends the line.
    pub fn next_is_end_of_line(&mut self) -> Result<bool> {
        Ok(self.peek()?.is_end_of_line())
    }
}

/// Returns true if the byte may appear in an atom.
///
/// Excludes controls, space and the reserved set `"%()*[\]{`.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    b > 0x20
        && b != 0x7f
        && !matches!(
            b,
            b'"' | b'%' | b'(' | b')' | b'*' | b'[' | b'\\' | b']' | b'{'
        )
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn tokens(input: &[u8]) -> Vec<Token> {
        let mut tokenizer = Tokenizer::from_bytes(input).unwrap();
        let mut out = Vec::new();
        loop {
            let token = tokenizer.next().unwrap();
            let done = token.is_end_of_line();
            out.push(token);
            if done {
                break;
            }
        }
        out
    }

    fn atom(s: &str) -> Token {
        Token::Atom(s.to_string())
    }

    #[test]
    fn test_tagged_response() {
        assert_eq!(
            tokens(b"A001 OK LOGIN completed\r\n"),
            vec![
                Token::Tag("A001".to_string()),
                atom("OK"),
                atom("LOGIN"),
                atom("completed"),
                Token::EndOfLine,
            ]
        );
    }

    #[test]
    fn test_untagged_and_continuation_markers() {
        assert_eq!(
            tokens(b"* 3 EXISTS\r\n"),
            vec![Token::Untagged, Token::Number(3), atom("EXISTS"), Token::EndOfLine]
        );
        assert_eq!(
            tokens(b"+ Ready\r\n"),
            vec![Token::Continuation, atom("Ready"), Token::EndOfLine]
        );
        assert_eq!(tokens(b"+\r\n"), vec![Token::Continuation, Token::EndOfLine]);
    }

    #[test]
    fn test_star_requires_space() {
        let mut tokenizer = Tokenizer::from_bytes(b"*OK\r\n").unwrap();
        assert!(matches!(tokenizer.next(), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_flags_and_permanent_marker() {
        assert_eq!(
            tokens(b"* FLAGS (\\Seen \\* $Junk)\r\n"),
            vec![
                Token::Untagged,
                atom("FLAGS"),
                Token::LParen,
                atom("\\Seen"),
                atom("\\*"),
                atom("$Junk"),
                Token::RParen,
                Token::EndOfLine,
            ]
        );
    }

    #[test]
    fn test_nil_and_number_promotion() {
        assert_eq!(
            tokens(b"* X NIL nil 42 42abc 1:4\r\n"),
            vec![
                Token::Untagged,
                atom("X"),
                Token::Nil,
                Token::Nil,
                Token::Number(42),
                atom("42abc"),
                atom("1:4"),
                Token::EndOfLine,
            ]
        );
    }

    #[test]
    fn test_number_overflow_becomes_atom() {
        assert_eq!(
            tokens(b"* 99999999999999999999999\r\n")[1],
            atom("99999999999999999999999")
        );
    }

    #[test]
    fn test_quoted_string_escapes() {
        assert_eq!(
            tokens(b"* X \"say \\\"hi\\\" \\\\ ok\"\r\n")[2],
            Token::QuotedString("say \"hi\" \\ ok".to_string())
        );
    }

    #[test]
    fn test_quoted_string_with_lf_fails() {
        let mut tokenizer = Tokenizer::from_bytes(b"* X \"bad\nvalue\"\r\n").unwrap();
        tokenizer.next().unwrap();
        tokenizer.next().unwrap();
        assert!(matches!(tokenizer.next(), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_brackets_and_section() {
        assert_eq!(
            tokens(b"* 1 FETCH (BODY[HEADER.FIELDS (FROM)]<0> NIL)\r\n"),
            vec![
                Token::Untagged,
                Token::Number(1),
                atom("FETCH"),
                Token::LParen,
                atom("BODY"),
                Token::LBracket,
                atom("HEADER.FIELDS"),
                Token::LParen,
                atom("FROM"),
                Token::RParen,
                Token::RBracket,
                atom("<0>"),
                Token::Nil,
                Token::RParen,
                Token::EndOfLine,
            ]
        );
    }

    #[test]
    fn test_literal_spans_lines() {
        let toks = tokens(b"* 1 FETCH (BODY[] {11}\r\nhello\r\nworld)\r\n");
        assert_eq!(
            toks[7],
            Token::Literal(Literal::Memory(Bytes::from_static(b"hello\r\nworld")))
        );
        assert_eq!(toks[8], Token::RParen);
        assert_eq!(toks[9], Token::EndOfLine);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut tokenizer = Tokenizer::from_bytes(b"* OK [ALERT] text\r\n").unwrap();
        assert_eq!(tokenizer.peek().unwrap(), Token::Untagged);
        assert_eq!(tokenizer.next().unwrap(), Token::Untagged);
        assert_eq!(tokenizer.peek().unwrap(), atom("OK"));
        assert_eq!(tokenizer.next().unwrap(), atom("OK"));
        assert_eq!(tokenizer.next().unwrap(), Token::LBracket);
    }

    #[test]
    fn test_collect_to_end_of_line() {
        let mut tokenizer = Tokenizer::from_bytes(b"A1 OK done (really) 100%\r\n").unwrap();
        tokenizer.next().unwrap();
        tokenizer.next().unwrap();
        assert_eq!(tokenizer.collect_to_end_of_line(), " done (really) 100%");
        assert!(tokenizer.at_end_of_line());
        assert_eq!(tokenizer.next().unwrap(), Token::EndOfLine);
        assert_eq!(tokenizer.next().unwrap(), Token::EndOfLine);
        tokenizer.reset();
        assert!(!tokenizer.at_end_of_line());
    }

    #[test]
    fn test_unexpected_byte() {
        let mut tokenizer = Tokenizer::from_bytes(b"* X %\r\n").unwrap();
        tokenizer.next().unwrap();
        tokenizer.next().unwrap();
        let err = tokenizer.next().unwrap_err();
        assert!(err.to_string().contains("0x25"));
    }

    #[test]
    fn test_literal_inside_word_is_parse_error() {
        let mut tokenizer = Tokenizer::from_bytes(b"* X ab{5}\r\n").unwrap();
        tokenizer.next().unwrap();
        tokenizer.next().unwrap();
        assert_eq!(tokenizer.next().unwrap(), atom("ab"));
        let err = tokenizer.next().unwrap_err();
        assert!(matches!(err, Error::Parse { .. }), "{err}");
    }

    #[test]
    fn test_skip_list_remainder() {
        let mut tokenizer = Tokenizer::from_bytes(b"* X (a (b c) d) e\r\n").unwrap();
        tokenizer.next().unwrap();
        tokenizer.next().unwrap();
        tokenizer.expect(&Token::LParen).unwrap();
        tokenizer.skip_list_remainder().unwrap();
        assert_eq!(tokenizer.next().unwrap(), atom("e"));
    }

    #[test]
    fn test_collect_to_close_bracket() {
        let mut tokenizer =
            Tokenizer::from_bytes(b"* OK [REFERRAL imap://host/%2A] see there\r\n").unwrap();
        tokenizer.next().unwrap();
        tokenizer.next().unwrap();
        assert_eq!(tokenizer.peek_byte(), Some(b'['));
        assert_eq!(tokenizer.next().unwrap(), Token::LBracket);
        assert_eq!(tokenizer.next().unwrap(), atom("REFERRAL"));
        assert_eq!(
            tokenizer.collect_to_close_bracket().unwrap(),
            "imap://host/%2A"
        );
        assert_eq!(tokenizer.collect_to_end_of_line(), " see there");
    }

    #[test]
    fn test_is_atom_char() {
        assert!(is_atom_char(b'A'));
        assert!(is_atom_char(b':'));
        assert!(is_atom_char(b'<'));
        assert!(is_atom_char(0xc3));
        assert!(!is_atom_char(b' '));
        assert!(!is_atom_char(b'('));
        assert!(!is_atom_char(b'['));
        assert!(!is_atom_char(b'{'));
        assert!(!is_atom_char(b'\\'));
    }
}
