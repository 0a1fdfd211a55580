//! Command serialization helpers.
//!
//! Arguments are written into an [`Encoder`], which splits the command
//! wherever a synchronizing literal is needed: the client sends one
//! segment, waits for a continuation, then sends the next.

use chrono::NaiveDate;

use crate::parser::tokenizer::is_atom_char;
use crate::types::{Flag, utf7};
use crate::{Error, Result};

use super::types::{FetchAttribute, FetchItems, SearchCriteria, StoreAction};

/// Accumulates command bytes, splitting at literals.
#[derive(Debug, Default)]
pub struct Encoder {
    segments: Vec<Vec<u8>>,
    current: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&mut self, bytes: &[u8]) {
        self.current.extend_from_slice(bytes);
    }

    pub fn text(&mut self, s: &str) {
        self.raw(s.as_bytes());
    }

    pub fn space(&mut self) {
        self.current.push(b' ');
    }

    /// Writes `{n}` CRLF, ends the segment and starts the next with the payload.
    pub fn literal(&mut self, data: &[u8]) {
        self.current
            .extend_from_slice(format!("{{{}}}\r\n", data.len()).as_bytes());
        self.segments.push(std::mem::take(&mut self.current));
        self.current.extend_from_slice(data);
    }

    /// Appends the final CRLF and returns the segments.
    pub fn finish(mut self) -> Vec<Vec<u8>> {
        self.current.extend_from_slice(b"\r\n");
        self.segments.push(self.current);
        self.segments
    }
}

/// Writes an astring: atom when safe, quoted string otherwise, literal for
/// CR, LF, NUL and 8-bit data.
pub fn write_astring(enc: &mut Encoder, s: &str) {
    if s.bytes().any(needs_literal) {
        enc.literal(s.as_bytes());
    } else if s.is_empty() || !s.bytes().all(is_atom_char) {
        write_quoted(enc, s);
    } else {
        enc.text(s);
    }
}

fn write_quoted(enc: &mut Encoder, s: &str) {
    let mut quoted = Vec::with_capacity(s.len() + 2);
    quoted.push(b'"');
    for b in s.bytes() {
        if b == b'"' || b == b'\\' {
            quoted.push(b'\\');
        }
        quoted.push(b);
    }
    quoted.push(b'"');
    enc.raw(&quoted);
}

const fn needs_literal(b: u8) -> bool {
    matches!(b, b'\r' | b'\n' | 0) || b >= 0x80
}

/// Writes caller-supplied text that must be a plain atom.
pub fn write_atom(enc: &mut Encoder, what: &str, s: &str) -> Result<()> {
    if !is_atom(s) {
        return Err(Error::InvalidCommand(format!("{what} {s:?} is not an atom")));
    }
    enc.text(s);
    Ok(())
}

fn is_atom(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii() && is_atom_char(b))
}

/// Writes a mailbox name in modified UTF-7.
pub fn write_mailbox(enc: &mut Encoder, mailbox: &str) {
    write_astring(enc, &utf7::encode(mailbox));
}

/// Writes a parenthesised flag list.
pub fn write_flags(enc: &mut Encoder, flags: &[Flag]) -> Result<()> {
    enc.raw(b"(");
    for (i, flag) in flags.iter().enumerate() {
        if i > 0 {
            enc.space();
        }
        write_flag(enc, flag)?;
    }
    enc.raw(b")");
    Ok(())
}

// A keyword may also be an unrecognised system flag, kept with its backslash.
fn write_flag(enc: &mut Encoder, flag: &Flag) -> Result<()> {
    if let Flag::Keyword(keyword) = flag {
        let atom = keyword.strip_prefix('\\').unwrap_or(keyword);
        if !is_atom(atom) {
            return Err(Error::InvalidCommand(format!(
                "flag {keyword:?} is not an atom"
            )));
        }
    }
    enc.text(flag.as_str());
    Ok(())
}

/// Writes FETCH items.
pub fn write_fetch_items(enc: &mut Encoder, items: &FetchItems) -> Result<()> {
    match items {
        FetchItems::All => enc.text("ALL"),
        FetchItems::Full => enc.text("FULL"),
        FetchItems::Fast => enc.text("FAST"),
        FetchItems::Items(attrs) => {
            if let [attr] = attrs.as_slice() {
                write_fetch_attribute(enc, attr)?;
            } else {
                enc.raw(b"(");
                for (i, attr) in attrs.iter().enumerate() {
                    if i > 0 {
                        enc.space();
                    }
                    write_fetch_attribute(enc, attr)?;
                }
                enc.raw(b")");
            }
        }
    }
    Ok(())
}

/// Writes a single FETCH attribute.
pub fn write_fetch_attribute(enc: &mut Encoder, attr: &FetchAttribute) -> Result<()> {
    match attr {
        FetchAttribute::Flags => enc.text("FLAGS"),
        FetchAttribute::InternalDate => enc.text("INTERNALDATE"),
        FetchAttribute::Rfc822Size => enc.text("RFC822.SIZE"),
        FetchAttribute::Envelope => enc.text("ENVELOPE"),
        FetchAttribute::BodyStructure => enc.text("BODYSTRUCTURE"),
        FetchAttribute::Body => enc.text("BODY"),
        FetchAttribute::Uid => enc.text("UID"),
        FetchAttribute::Rfc822 => enc.text("RFC822"),
        FetchAttribute::Rfc822Header => enc.text("RFC822.HEADER"),
        FetchAttribute::Rfc822Text => enc.text("RFC822.TEXT"),
        FetchAttribute::BodySection {
            section,
            peek,
            partial,
        } => {
            enc.text(if *peek { "BODY.PEEK[" } else { "BODY[" });
            if let Some(s) = section {
                check_section(s)?;
                enc.text(s);
            }
            enc.raw(b"]");
            if let Some((start, len)) = partial {
                enc.text(&format!("<{start}.{len}>"));
            }
        }
    }
    Ok(())
}

/// Accepts section specifiers such as `1.2.MIME` or `HEADER.FIELDS (From To)`.
fn check_section(section: &str) -> Result<()> {
    let invalid = || Error::InvalidCommand(format!("invalid section specifier {section:?}"));
    let mut depth = 0usize;
    for b in section.bytes() {
        match b {
            b'(' => depth += 1,
            b')' => depth = depth.checked_sub(1).ok_or_else(invalid)?,
            b'.' | b'-' | b'_' | b' ' => {}
            _ if b.is_ascii_alphanumeric() => {}
            _ => return Err(invalid()),
        }
    }
    if depth == 0 { Ok(()) } else { Err(invalid()) }
}

/// Writes a STORE data item and its flags.
pub fn write_store_action(enc: &mut Encoder, action: &StoreAction, silent: bool) -> Result<()> {
    enc.text(action.item());
    if silent {
        enc.text(".SILENT");
    }
    enc.space();
    write_flags(enc, action.flags())
}

fn write_date(enc: &mut Encoder, date: NaiveDate) {
    enc.text(&date.format("%-d-%b-%Y").to_string());
}

/// Writes SEARCH criteria.
pub fn write_search_criteria(enc: &mut Encoder, criteria: &SearchCriteria) -> Result<()> {
    match criteria {
        SearchCriteria::All => enc.text("ALL"),
        SearchCriteria::Answered => enc.text("ANSWERED"),
        SearchCriteria::Deleted => enc.text("DELETED"),
        SearchCriteria::Draft => enc.text("DRAFT"),
        SearchCriteria::Flagged => enc.text("FLAGGED"),
        SearchCriteria::New => enc.text("NEW"),
        SearchCriteria::Undeleted => enc.text("UNDELETED"),
        SearchCriteria::Unseen => enc.text("UNSEEN"),
        SearchCriteria::Seen => enc.text("SEEN"),
        SearchCriteria::Keyword(k) => {
            enc.text("KEYWORD ");
            write_astring(enc, k);
        }
        SearchCriteria::SequenceSet(set) => enc.text(&set.to_string()),
        SearchCriteria::UidSet(set) => enc.text(&format!("UID {set}")),
        SearchCriteria::Subject(s) => {
            enc.text("SUBJECT ");
            write_astring(enc, s);
        }
        SearchCriteria::From(s) => {
            enc.text("FROM ");
            write_astring(enc, s);
        }
        SearchCriteria::To(s) => {
            enc.text("TO ");
            write_astring(enc, s);
        }
        SearchCriteria::Body(s) => {
            enc.text("BODY ");
            write_astring(enc, s);
        }
        SearchCriteria::Text(s) => {
            enc.text("TEXT ");
            write_astring(enc, s);
        }
        SearchCriteria::Since(date) => {
            enc.text("SINCE ");
            write_date(enc, *date);
        }
        SearchCriteria::Before(date) => {
            enc.text("BEFORE ");
            write_date(enc, *date);
        }
        SearchCriteria::On(date) => {
            enc.text("ON ");
            write_date(enc, *date);
        }
        SearchCriteria::Larger(size) => enc.text(&format!("LARGER {size}")),
        SearchCriteria::Smaller(size) => enc.text(&format!("SMALLER {size}")),
        SearchCriteria::Header(name, value) => {
            enc.text("HEADER ");
            write_astring(enc, name);
            enc.space();
            write_astring(enc, value);
        }
        SearchCriteria::Raw(raw) => {
            if raw.bytes().any(needs_literal) {
                return Err(Error::InvalidCommand(format!(
                    "raw search criteria {raw:?} contain CR, LF, NUL or 8-bit data"
                )));
            }
            enc.text(raw);
        }
        SearchCriteria::And(criteria) => {
            for (i, c) in criteria.iter().enumerate() {
                if i > 0 {
                    enc.space();
                }
                write_search_criteria(enc, c)?;
            }
        }
        SearchCriteria::Or(a, b) => {
            enc.text("OR ");
            write_search_criteria(enc, a)?;
            enc.space();
            write_search_criteria(enc, b)?;
        }
        SearchCriteria::Not(c) => {
            enc.text("NOT ");
            write_search_criteria(enc, c)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn astring(s: &str) -> Vec<Vec<u8>> {
        let mut enc = Encoder::new();
        write_astring(&mut enc, s);
        enc.finish()
    }

    #[test]
    fn test_astring_forms() {
        assert_eq!(astring("INBOX"), vec![b"INBOX\r\n".to_vec()]);
        assert_eq!(astring(""), vec![b"\"\"\r\n".to_vec()]);
        assert_eq!(astring("a b"), vec![b"\"a b\"\r\n".to_vec()]);
        assert_eq!(astring("say \"x\""), vec![b"\"say \\\"x\\\"\"\r\n".to_vec()]);
        assert_eq!(astring("50%"), vec![b"\"50%\"\r\n".to_vec()]);
    }

    #[test]
    fn test_astring_promotes_to_literal() {
        assert_eq!(
            astring("line\r\nbreak"),
            vec![b"{11}\r\n".to_vec(), b"line\r\nbreak\r\n".to_vec()]
        );
        assert_eq!(
            astring("caf\u{e9}"),
            vec![b"{5}\r\n".to_vec(), "caf\u{e9}\r\n".as_bytes().to_vec()]
        );
    }

    #[test]
    fn test_mailbox_is_utf7_encoded() {
        let mut enc = Encoder::new();
        write_mailbox(&mut enc, "Entwürfe");
        assert_eq!(enc.finish(), vec![b"Entw&APw-rfe\r\n".to_vec()]);
    }

    #[test]
    fn test_search_dates_and_nesting() {
        let mut enc = Encoder::new();
        write_search_criteria(
            &mut enc,
            &SearchCriteria::And(vec![
                SearchCriteria::Since(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()),
                SearchCriteria::Or(
                    Box::new(SearchCriteria::From("alice".to_string())),
                    Box::new(SearchCriteria::Not(Box::new(SearchCriteria::Seen))),
                ),
            ]),
        )
        .unwrap();
        assert_eq!(
            enc.finish(),
            vec![b"SINCE 1-Feb-2024 OR FROM alice NOT SEEN\r\n".to_vec()]
        );
    }

    #[test]
    fn test_store_action() {
        let mut enc = Encoder::new();
        write_store_action(
            &mut enc,
            &StoreAction::RemoveFlags(vec![Flag::Deleted, Flag::Keyword("$Work".to_string())]),
            true,
        )
        .unwrap();
        assert_eq!(
            enc.finish(),
            vec![b"-FLAGS.SILENT (\\Deleted $Work)\r\n".to_vec()]
        );
    }

    #[test]
    fn test_keyword_must_be_atom() {
        let mut enc = Encoder::new();
        write_flags(&mut enc, &[Flag::Keyword("\\Custom".to_string())]).unwrap();
        assert_eq!(enc.finish(), vec![b"(\\Custom)\r\n".to_vec()]);

        for keyword in ["x\r\nA9 DELETE INBOX", "two words", "a)", "", "\\", "caf\u{e9}"] {
            let mut enc = Encoder::new();
            let err = write_flags(&mut enc, &[Flag::Keyword(keyword.to_string())]).unwrap_err();
            assert!(matches!(err, Error::InvalidCommand(_)), "{keyword:?}");
        }
    }

    #[test]
    fn test_section_specifier_checked() {
        let section = |s: &str| FetchAttribute::BodySection {
            section: Some(s.to_string()),
            peek: true,
            partial: None,
        };

        let mut enc = Encoder::new();
        write_fetch_attribute(&mut enc, &section("HEADER.FIELDS (From Subject)")).unwrap();
        assert_eq!(
            enc.finish(),
            vec![b"BODY.PEEK[HEADER.FIELDS (From Subject)]\r\n".to_vec()]
        );

        for bad in ["TEXT]\r\nA9 LOGOUT", "1.2)", "(HEADER", "TEXT{5}"] {
            let mut enc = Encoder::new();
            assert!(matches!(
                write_fetch_attribute(&mut enc, &section(bad)),
                Err(Error::InvalidCommand(_))
            ));
        }
    }

    #[test]
    fn test_raw_criteria_reject_line_breaks() {
        let mut enc = Encoder::new();
        let raw = SearchCriteria::Raw("UNSEEN\r\nA9 EXPUNGE".to_string());
        assert!(matches!(
            write_search_criteria(&mut enc, &raw),
            Err(Error::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_atom_arguments() {
        let mut enc = Encoder::new();
        write_atom(&mut enc, "resource", "STORAGE").unwrap();
        assert_eq!(enc.finish(), vec![b"STORAGE\r\n".to_vec()]);

        let mut enc = Encoder::new();
        assert!(write_atom(&mut enc, "resource", "STORAGE 1) (X").is_err());
    }
}
