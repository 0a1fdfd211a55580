//! Response frames: a response line with its literal payloads split out.

use bytes::Bytes;

use crate::literal::Literal;
use crate::{Error, Result};

/// One piece of a response frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePart {
    /// Text ending in CRLF; a `{n}` header before the CRLF announces a literal.
    Line(Bytes),
    /// Literal payload announced by the preceding line.
    Literal(Literal),
}

/// A complete server response as read from the wire.
///
/// Parts alternate between lines and literals, always starting and ending
/// with a line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    parts: Vec<FramePart>,
}

impl Frame {
    /// Creates a frame from its parts.
    #[must_use]
    pub const fn from_parts(parts: Vec<FramePart>) -> Self {
        Self { parts }
    }

    /// Splits an in-memory response into lines and literals.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Truncated`] if a literal runs past the input.
    pub fn from_bytes(input: &[u8]) -> Result<Self> {
        let mut parts = Vec::new();
        let mut rest = input;

        while !rest.is_empty() {
            let line_len = rest
                .windows(2)
                .position(|w| w == b"\r\n")
                .map_or(rest.len(), |p| p + 2);
            let (line, tail) = rest.split_at(line_len);
            parts.push(FramePart::Line(Bytes::copy_from_slice(line)));
            rest = tail;

            if let Some(size) = trailing_literal(line) {
                if rest.len() < size {
                    return Err(Error::Truncated {
                        expected: size,
                        received: rest.len(),
                    });
                }
                let (payload, tail) = rest.split_at(size);
                parts.push(FramePart::Literal(Literal::Memory(Bytes::copy_from_slice(
                    payload,
                ))));
                rest = tail;
            } else {
                break;
            }
        }

        Ok(Self { parts })
    }

    /// The frame parts in wire order.
    #[must_use]
    pub fn parts(&self) -> &[FramePart] {
        &self.parts
    }

    /// Returns true if the frame holds no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Renders the frame for diagnostics, eliding literal payloads.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                FramePart::Line(line) => {
                    let text = String::from_utf8_lossy(line);
                    out.push_str(text.trim_end_matches(['\r', '\n']));
                }
                FramePart::Literal(literal) => {
                    out.push_str(&format!("<{} bytes>", literal.len()));
                }
            }
        }
        out
    }
}

/// Parses a `{n}` literal announcement from the end of a CRLF-terminated line.
///
/// Matches `{123}\r\n` and the non-synchronizing `{123+}\r\n` form. The
/// `{` must start a token: it opens the input or follows a space or `(`.
#[must_use]
pub fn literal_announcement(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n")?;
    let body = line.strip_suffix(b"}")?;
    let body = body.strip_suffix(b"+").unwrap_or(body);
    let open = body.iter().rposition(|&b| b == b'{')?;
    if open > 0 && !matches!(body[open - 1], b' ' | b'(') {
        return None;
    }
    let digits = &body[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Size of the literal that follows `line` on the wire, if any.
///
/// Status responses and continuations end in free text, where a trailing
/// `{n}` is not an announcement.
#[must_use]
pub fn trailing_literal(line: &[u8]) -> Option<usize> {
    let mut words = line.split(|&b| b == b' ');
    if words.next()? == b"+" {
        return None;
    }
    if let Some(word) = words.next() {
        let word = word.strip_suffix(b"\r\n").unwrap_or(word);
        if STATUS_WORDS.iter().any(|status| word.eq_ignore_ascii_case(status)) {
            return None;
        }
    }
    literal_announcement(line)
}

const STATUS_WORDS: [&[u8]; 5] = [b"OK", b"NO", b"BAD", b"BYE", b"PREAUTH"];

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

    #[test]
    fn test_literal_announcement() {
        assert_eq!(literal_announcement(b"BODY {123}\r\n"), Some(123));
        assert_eq!(literal_announcement(b"BODY {123+}\r\n"), Some(123));
        assert_eq!(literal_announcement(b"{0}\r\n"), Some(0));
        assert_eq!(literal_announcement(b"no literal\r\n"), None);
        assert_eq!(literal_announcement(b"incomplete {123"), None);
        assert_eq!(literal_announcement(b"wrong {abc}\r\n"), None);
        assert_eq!(literal_announcement(b"empty {}\r\n"), None);
        assert_eq!(literal_announcement(b"(BODY[] {7}\r\n"), Some(7));
        assert_eq!(literal_announcement(b"({3}\r\n"), Some(3));
        assert_eq!(literal_announcement(b"word{5}\r\n"), None);
        assert_eq!(literal_announcement(b"\"x\"{5}\r\n"), None);
    }

    #[test]
    fn test_status_text_never_announces_literal() {
        assert_eq!(trailing_literal(b"* OK note {5}\r\n"), None);
        assert_eq!(trailing_literal(b"A0001 NO see {12}\r\n"), None);
        assert_eq!(trailing_literal(b"* bye going {3}\r\n"), None);
        assert_eq!(trailing_literal(b"+ send {5}\r\n"), None);
        assert_eq!(trailing_literal(b"* 1 FETCH (BODY[] {5}\r\n"), Some(5));
        assert_eq!(trailing_literal(b"* LIST () \"/\" {4}\r\n"), Some(4));
    }

    #[test]
    fn test_from_bytes_status_text_with_braces() {
        let frame = Frame::from_bytes(b"* OK note {5}\r\n").unwrap();
        assert_eq!(frame.parts().len(), 1);
    }

    #[test]
    fn test_from_bytes_with_literal() {
        let frame = Frame::from_bytes(b"* 1 FETCH (BODY[] {5}\r\nhello)\r\n").unwrap();
        assert_eq!(frame.parts().len(), 3);
        assert_eq!(
            frame.parts()[1],
            FramePart::Literal(Literal::Memory(Bytes::from_static(b"hello")))
        );
        assert_eq!(frame.summary(), "* 1 FETCH (BODY[] {5}<5 bytes>)");
    }

    #[test]
    fn test_from_bytes_truncated() {
        let err = Frame::from_bytes(b"* 1 FETCH (BODY[] {10}\r\nshort").unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated {
                expected: 10,
                received: 5
            }
        ));
    }
}
