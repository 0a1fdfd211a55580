//! FETCH response parsing: message data items, envelopes and body structures.

use std::collections::BTreeMap;

use chrono::DateTime;

use crate::parser::tokenizer::{Token, Tokenizer};
use crate::{Error, Result};

use super::helpers::parse_flag_list;
use super::types::{
    Address, BodyPart, BodyStructure, Disposition, Envelope, FetchItem, Multipart, PartKind,
};

/// INTERNALDATE format, e.g. `17-Jul-1996 02:44:25 -0700`.
pub const INTERNAL_DATE_FORMAT: &str = "%d-%b-%Y %H:%M:%S %z";

/// Parses the parenthesised item list of a FETCH response.
pub fn parse_fetch(tokenizer: &mut Tokenizer) -> Result<Vec<FetchItem>> {
    tokenizer.expect(&Token::LParen)?;
    let mut items = Vec::new();

    loop {
        let name = match tokenizer.next()? {
            Token::RParen => break,
            Token::Atom(name) => name,
            token => {
                return Err(Error::parse(
                    tokenizer.position(),
                    format!("Expected FETCH item name, got {token:?}"),
                ));
            }
        };

        match name.to_ascii_uppercase().as_str() {
            "FLAGS" => items.push(FetchItem::Flags(parse_flag_list(tokenizer)?)),
            "UID" => items.push(FetchItem::Uid(tokenizer.read_u64()?)),
            "RFC822.SIZE" => items.push(FetchItem::Rfc822Size(tokenizer.read_u32()?)),
            "INTERNALDATE" => {
                let raw = tokenizer.read_astring()?;
                let date = DateTime::parse_from_str(raw.trim(), INTERNAL_DATE_FORMAT)
                    .map_err(|e| {
                        Error::parse(
                            tokenizer.position(),
                            format!("Malformed INTERNALDATE {raw:?}: {e}"),
                        )
                    })?;
                items.push(FetchItem::InternalDate(date));
            }
            "ENVELOPE" => items.push(FetchItem::Envelope(Box::new(parse_envelope(tokenizer)?))),
            "BODYSTRUCTURE" => items.push(FetchItem::BodyStructure(parse_body(tokenizer)?)),
            "BODY" | "BINARY" => {
                if tokenizer.peek()? == Token::LBracket {
                    tokenizer.next()?;
                    let section = parse_section(tokenizer)?;
                    let origin = parse_origin(tokenizer)?;
                    let data = tokenizer.read_nliteral()?;
                    items.push(FetchItem::Body {
                        section,
                        origin,
                        data,
                    });
                } else {
                    items.push(FetchItem::BodyStructure(parse_body(tokenizer)?));
                }
            }
            "RFC822" | "RFC822.HEADER" | "RFC822.TEXT" => {
                let section = name
                    .get("RFC822.".len()..)
                    .unwrap_or_default()
                    .to_ascii_uppercase();
                let data = tokenizer.read_nliteral()?;
                items.push(FetchItem::Body {
                    section,
                    origin: None,
                    data,
                });
            }
            _ => {
                tracing::debug!(item = %name, "Skipping unknown FETCH item");
                tokenizer.skip_value()?;
            }
        }
    }

    Ok(items)
}

/// Rebuilds a section specifier from its tokens; the `[` has been consumed.
fn parse_section(tokenizer: &mut Tokenizer) -> Result<String> {
    let mut section = String::new();
    loop {
        let piece = match tokenizer.next()? {
            Token::RBracket => break,
            Token::Atom(s) => s,
            Token::Number(n) => n.to_string(),
            Token::QuotedString(s) => format!("\"{s}\""),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            token => {
                return Err(Error::parse(
                    tokenizer.position(),
                    format!("Unexpected token in section: {token:?}"),
                ));
            }
        };
        if !section.is_empty() && !section.ends_with('(') && piece != ")" {
            section.push(' ');
        }
        section.push_str(&piece);
    }
    Ok(section)
}

/// Parses an optional `<origin>` after a section.
fn parse_origin(tokenizer: &mut Tokenizer) -> Result<Option<u32>> {
    let Token::Atom(atom) = tokenizer.peek()? else {
        return Ok(None);
    };
    let Some(digits) = atom.strip_prefix('<').and_then(|a| a.strip_suffix('>')) else {
        return Ok(None);
    };
    tokenizer.next()?;
    digits
        .parse()
        .map(Some)
        .map_err(|_| Error::parse(tokenizer.position(), format!("Invalid origin {atom}")))
}

/// Parses an envelope.
pub fn parse_envelope(tokenizer: &mut Tokenizer) -> Result<Envelope> {
    tokenizer.expect(&Token::LParen)?;

    let envelope = Envelope {
        date: tokenizer.read_nstring()?,
        subject: tokenizer.read_nstring()?,
        from: parse_address_list(tokenizer)?,
        sender: parse_address_list(tokenizer)?,
        reply_to: parse_address_list(tokenizer)?,
        to: parse_address_list(tokenizer)?,
        cc: parse_address_list(tokenizer)?,
        bcc: parse_address_list(tokenizer)?,
        in_reply_to: tokenizer.read_nstring()?,
        message_id: tokenizer.read_nstring()?,
    };

    tokenizer.skip_list_remainder()?;
    Ok(envelope)
}

fn parse_address_list(tokenizer: &mut Tokenizer) -> Result<Vec<Address>> {
    match tokenizer.next()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut addresses = Vec::new();
            loop {
                match tokenizer.next()? {
                    Token::RParen => break,
                    Token::LParen => addresses.push(parse_address(tokenizer)?),
                    token => {
                        return Err(Error::parse(
                            tokenizer.position(),
                            format!("Unexpected token in address list: {token:?}"),
                        ));
                    }
                }
            }
            Ok(addresses)
        }
        token => Err(Error::parse(
            tokenizer.position(),
            format!("Expected address list, got {token:?}"),
        )),
    }
}

/// Parses one address; the `(` has been consumed.
fn parse_address(tokenizer: &mut Tokenizer) -> Result<Address> {
    let address = Address {
        personal: tokenizer.read_nstring()?,
        route: tokenizer.read_nstring()?,
        mailbox: tokenizer.read_nstring()?,
        host: tokenizer.read_nstring()?,
    };
    tokenizer.skip_list_remainder()?;
    Ok(address)
}

/// Parses a BODY or BODYSTRUCTURE value.
pub fn parse_body(tokenizer: &mut Tokenizer) -> Result<BodyStructure> {
    tokenizer.expect(&Token::LParen)?;
    if tokenizer.peek()? == Token::LParen {
        parse_multipart(tokenizer).map(BodyStructure::Multipart)
    } else {
        parse_part(tokenizer).map(BodyStructure::Part)
    }
}

/// Consumes `)` and returns true if the current list has ended.
fn list_ended(tokenizer: &mut Tokenizer) -> Result<bool> {
    if tokenizer.next_is_rparen()? {
        tokenizer.next()?;
        Ok(true)
    } else {
        Ok(false)
    }
}

fn parse_multipart(tokenizer: &mut Tokenizer) -> Result<Multipart> {
    let mut parts = Vec::new();
    while tokenizer.peek()? == Token::LParen {
        parts.push(parse_body(tokenizer)?);
    }

    let mut multipart = Multipart {
        parts,
        subtype: tokenizer.read_astring()?.to_ascii_lowercase(),
        params: BTreeMap::new(),
        disposition: None,
        language: Vec::new(),
        location: None,
    };

    if list_ended(tokenizer)? {
        return Ok(multipart);
    }
    multipart.params = parse_params(tokenizer)?;
    if list_ended(tokenizer)? {
        return Ok(multipart);
    }
    multipart.disposition = parse_disposition(tokenizer)?;
    if list_ended(tokenizer)? {
        return Ok(multipart);
    }
    multipart.language = parse_language(tokenizer)?;
    if list_ended(tokenizer)? {
        return Ok(multipart);
    }
    multipart.location = tokenizer.read_nstring()?;
    tokenizer.skip_list_remainder()?;
    Ok(multipart)
}

fn parse_part(tokenizer: &mut Tokenizer) -> Result<BodyPart> {
    let media_type = tokenizer.read_astring()?.to_ascii_lowercase();
    let subtype = tokenizer.read_astring()?.to_ascii_lowercase();
    let params = parse_params(tokenizer)?;
    let id = tokenizer.read_nstring()?;
    let description = tokenizer.read_nstring()?;
    let encoding = tokenizer
        .read_nstring()?
        .unwrap_or_default()
        .to_ascii_lowercase();
    let size = tokenizer.read_u32()?;

    let kind = match (media_type.as_str(), subtype.as_str()) {
        ("text", _) => PartKind::Text {
            lines: tokenizer.read_u32()?,
        },
        ("message", "rfc822" | "global") => PartKind::Message {
            envelope: Box::new(parse_envelope(tokenizer)?),
            body: Box::new(parse_body(tokenizer)?),
            lines: tokenizer.read_u32()?,
        },
        _ => PartKind::Basic,
    };

    let mut part = BodyPart {
        media_type,
        subtype,
        params,
        id,
        description,
        encoding,
        size,
        kind,
        md5: None,
        disposition: None,
        language: Vec::new(),
        location: None,
    };

    if list_ended(tokenizer)? {
        return Ok(part);
    }
    part.md5 = tokenizer.read_nstring()?;
    if list_ended(tokenizer)? {
        return Ok(part);
    }
    part.disposition = parse_disposition(tokenizer)?;
    if list_ended(tokenizer)? {
        return Ok(part);
    }
    part.language = parse_language(tokenizer)?;
    if list_ended(tokenizer)? {
        return Ok(part);
    }
    part.location = tokenizer.read_nstring()?;
    tokenizer.skip_list_remainder()?;
    Ok(part)
}

/// Parses a MIME parameter list; keys are lower-cased.
fn parse_params(tokenizer: &mut Tokenizer) -> Result<BTreeMap<String, String>> {
    let mut params = BTreeMap::new();
    match tokenizer.next()? {
        Token::Nil => {}
        Token::LParen => {
            while !tokenizer.next_is_rparen()? {
                let key = tokenizer.read_astring()?.to_ascii_lowercase();
                let value = tokenizer.read_nstring()?.unwrap_or_default();
                params.insert(key, value);
            }
            tokenizer.next()?;
        }
        token => {
            return Err(Error::parse(
                tokenizer.position(),
                format!("Expected parameter list, got {token:?}"),
            ));
        }
    }
    Ok(params)
}

fn parse_disposition(tokenizer: &mut Tokenizer) -> Result<Option<Disposition>> {
    match tokenizer.next()? {
        Token::LParen => {
            let kind = tokenizer.read_astring()?.to_ascii_lowercase();
            let params = parse_params(tokenizer)?;
            tokenizer.skip_list_remainder()?;
            Ok(Some(Disposition { kind, params }))
        }
        // Some servers send a bare string here
        Token::Nil | Token::QuotedString(_) | Token::Atom(_) => Ok(None),
        token => Err(Error::parse(
            tokenizer.position(),
            format!("Expected disposition, got {token:?}"),
        )),
    }
}

fn parse_language(tokenizer: &mut Tokenizer) -> Result<Vec<String>> {
    if tokenizer.peek()? == Token::LParen {
        tokenizer.next()?;
        let mut languages = Vec::new();
        while !tokenizer.next_is_rparen()? {
            languages.push(tokenizer.read_astring()?);
        }
        tokenizer.next()?;
        Ok(languages)
    } else {
        Ok(tokenizer.read_nstring()?.into_iter().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn tokenizer(input: &str) -> Tokenizer {
        let mut tokenizer = Tokenizer::from_bytes(format!("* {input}\r\n").as_bytes()).unwrap();
        tokenizer.next().unwrap();
        tokenizer
    }

    fn leaf(structure: &BodyStructure) -> &BodyPart {
        match structure {
            BodyStructure::Part(part) => part,
            BodyStructure::Multipart(_) => panic!("expected leaf part"),
        }
    }

    #[test]
    fn test_envelope_with_named_sender() {
        let mut t = tokenizer(
            r#"("Mon, 7 Feb 1994 21:52:25 -0800" "Hello" (("Alice" NIL "alice" "example.com")) NIL NIL (("Bob" NIL "bob" "example.org")(NIL NIL "carol" "example.net")) NIL NIL NIL "<1@example.com>")"#,
        );
        let envelope = parse_envelope(&mut t).unwrap();
        assert_eq!(envelope.subject.as_deref(), Some("Hello"));
        assert_eq!(envelope.from[0].personal.as_deref(), Some("Alice"));
        assert_eq!(
            envelope.from[0].address().as_deref(),
            Some("alice@example.com")
        );
        assert!(envelope.sender.is_empty());
        assert_eq!(envelope.to.len(), 2);
        assert_eq!(envelope.to[1].personal, None);
        assert_eq!(envelope.message_id.as_deref(), Some("<1@example.com>"));
        assert!(t.next_is_end_of_line().unwrap());
    }

    #[test]
    fn test_address_with_null_host_has_no_address() {
        let mut t = tokenizer(r#"(NIL NIL (("undisclosed" NIL "recipients" NIL)) NIL NIL NIL NIL NIL NIL NIL)"#);
        let envelope = parse_envelope(&mut t).unwrap();
        assert_eq!(envelope.from[0].mailbox.as_deref(), Some("recipients"));
        assert_eq!(envelope.from[0].host, None);
        assert_eq!(envelope.from[0].address(), None);
    }

    #[test]
    fn test_text_plain_leaf() {
        let mut t = tokenizer(r#"("TEXT" "PLAIN" ("CHARSET" "UTF-8") NIL NIL "7BIT" 42 3)"#);
        let body = parse_body(&mut t).unwrap();
        let part = leaf(&body);
        assert_eq!(part.media_type, "text");
        assert_eq!(part.subtype, "plain");
        assert_eq!(part.params.get("charset").map(String::as_str), Some("UTF-8"));
        assert_eq!(part.encoding, "7bit");
        assert_eq!(part.size, 42);
        assert_eq!(part.lines(), Some(3));
    }

    #[test]
    fn test_multipart_with_extension_data() {
        let mut t = tokenizer(
            r#"(("TEXT" "PLAIN" ("CHARSET" "US-ASCII") NIL NIL "7BIT" 1152 23 NIL NIL NIL NIL)("IMAGE" "PNG" ("NAME" "a.png") "<id>" NIL "BASE64" 4554 NIL ("ATTACHMENT" ("FILENAME" "a.png")) NIL NIL (1 2 (3))) "MIXED" ("BOUNDARY" "xyz") NIL "en" "loc" (future ext))"#,
        );
        let body = parse_body(&mut t).unwrap();
        let BodyStructure::Multipart(multi) = &body else {
            panic!("expected multipart");
        };
        assert_eq!(multi.media_type(), "multipart");
        assert_eq!(body.subtype(), "mixed");
        assert_eq!(multi.parts.len(), 2);
        assert_eq!(multi.params.get("boundary").map(String::as_str), Some("xyz"));
        assert_eq!(multi.language, vec!["en".to_string()]);
        assert_eq!(multi.location.as_deref(), Some("loc"));

        let image = leaf(&multi.parts[1]);
        assert_eq!(image.kind, PartKind::Basic);
        assert_eq!(image.id.as_deref(), Some("<id>"));
        let disposition = image.disposition.as_ref().unwrap();
        assert_eq!(disposition.kind, "attachment");
        assert_eq!(
            disposition.params.get("filename").map(String::as_str),
            Some("a.png")
        );
        assert!(t.next_is_end_of_line().unwrap());
    }

    #[test]
    fn test_message_rfc822_recurses() {
        let mut t = tokenizer(
            r#"("MESSAGE" "RFC822" NIL NIL NIL "7BIT" 342 (NIL "Inner" NIL NIL NIL NIL NIL NIL NIL NIL) ("TEXT" "PLAIN" NIL NIL NIL "7BIT" 10 1) 12)"#,
        );
        let body = parse_body(&mut t).unwrap();
        let part = leaf(&body);
        let PartKind::Message {
            envelope,
            body,
            lines,
        } = &part.kind
        else {
            panic!("expected message part");
        };
        assert_eq!(envelope.subject.as_deref(), Some("Inner"));
        assert_eq!(leaf(body).lines(), Some(1));
        assert_eq!(*lines, 12);
    }

    #[test]
    fn test_fetch_items() {
        let mut t = tokenizer(
            r#"12 FETCH (FLAGS (\Seen) UID 4827313 INTERNALDATE "17-Jul-1996 02:44:25 -0700" RFC822.SIZE 44827 X-GM-MSGID 123 BODY[HEADER.FIELDS (FROM TO)]<0> "From: a" RFC822.TEXT NIL)"#,
        );
        assert_eq!(t.read_u32().unwrap(), 12);
        assert_eq!(t.read_atom_string().unwrap(), "FETCH");
        let items = parse_fetch(&mut t).unwrap();
        assert_eq!(items.len(), 6);
        assert!(matches!(&items[0], FetchItem::Flags(f) if f.is_seen()));
        assert_eq!(items[1], FetchItem::Uid(4_827_313));
        let FetchItem::InternalDate(date) = &items[2] else {
            panic!("expected date");
        };
        assert_eq!(date.to_rfc3339(), "1996-07-17T02:44:25-07:00");
        assert_eq!(items[3], FetchItem::Rfc822Size(44827));
        let FetchItem::Body {
            section,
            origin,
            data,
        } = &items[4]
        else {
            panic!("expected body");
        };
        assert_eq!(section, "HEADER.FIELDS (FROM TO)");
        assert_eq!(*origin, Some(0));
        assert_eq!(data.as_ref().unwrap().as_bytes(), Some(&b"From: a"[..]));
        assert!(matches!(&items[5], FetchItem::Body { section, data: None, .. } if section == "TEXT"));
    }

    #[test]
    fn test_malformed_internal_date_is_parse_error() {
        let mut t = tokenizer(r#"3 FETCH (UID 9 INTERNALDATE "yesterday")"#);
        t.read_u32().unwrap();
        t.read_atom_string().unwrap();
        let err = parse_fetch(&mut t).unwrap_err();
        assert!(
            matches!(&err, Error::Parse { message, .. } if message.contains("yesterday")),
            "{err}"
        );
    }

    #[test]
    fn test_fetch_body_literal() {
        let mut t = Tokenizer::from_bytes(b"* 1 FETCH (BODY[] {5}\r\nhello UID 7)\r\n").unwrap();
        t.next().unwrap();
        t.read_u32().unwrap();
        t.read_atom_string().unwrap();
        let items = parse_fetch(&mut t).unwrap();
        let FetchItem::Body { section, data, .. } = &items[0] else {
            panic!("expected body");
        };
        assert!(section.is_empty());
        assert_eq!(data.as_ref().unwrap().len(), 5);
        assert_eq!(items[1], FetchItem::Uid(7));
    }
}
