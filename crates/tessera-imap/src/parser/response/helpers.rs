//! Parser helper functions for non-FETCH response data.

use crate::parser::tokenizer::{Token, Tokenizer};
use crate::types::{
    AclEntry, Flag, Flags, ListEntry, ListRights, MailboxStatus, NamespaceEntry, Namespaces, Quota,
    QuotaResource, ResponseCode, UidSet, utf7,
};
use crate::{Error, Result};

fn unexpected(tokenizer: &Tokenizer, what: &str, token: &Token) -> Error {
    Error::parse(
        tokenizer.position(),
        format!("Unexpected token in {what}: {token:?}"),
    )
}

/// Decodes a modified UTF-7 mailbox name, keeping the raw name if it is not valid.
pub fn decode_mailbox(raw: String) -> String {
    utf7::decode(&raw).unwrap_or(raw)
}

/// Parses the optional `[code]` and the text of a resp-text.
pub fn parse_resp_text(tokenizer: &mut Tokenizer) -> Result<(Option<ResponseCode>, String)> {
    let code = if tokenizer.peek_byte() == Some(b'[') {
        tokenizer.expect(&Token::LBracket)?;
        Some(parse_response_code(tokenizer)?)
    } else {
        None
    };
    let text = tokenizer.collect_to_end_of_line();
    Ok((code, text.trim_start().to_string()))
}

/// Parses a response code; the `[` has been consumed.
pub fn parse_response_code(tokenizer: &mut Tokenizer) -> Result<ResponseCode> {
    let atom = tokenizer.read_atom_string()?;

    let code = match atom.to_ascii_uppercase().as_str() {
        "ALERT" => ResponseCode::Alert,
        "PARSE" => ResponseCode::Parse,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "TRYCREATE" => ResponseCode::TryCreate,
        "UIDNOTSTICKY" => ResponseCode::UidNotSticky,
        "UIDNEXT" => ResponseCode::UidNext(tokenizer.read_u64()?),
        "UIDVALIDITY" => ResponseCode::UidValidity(tokenizer.read_u64()?),
        "UNSEEN" => ResponseCode::Unseen(tokenizer.read_u32()?),
        "CAPABILITY" => ResponseCode::Capability(parse_capability_data(tokenizer)?),
        "PERMANENTFLAGS" => ResponseCode::PermanentFlags(parse_flag_list(tokenizer)?),
        "BADCHARSET" => {
            let mut charsets = Vec::new();
            if tokenizer.peek()? == Token::LParen {
                tokenizer.next()?;
                while !tokenizer.next_is_rparen()? {
                    charsets.push(tokenizer.read_astring()?);
                }
                tokenizer.next()?;
            }
            ResponseCode::BadCharset(charsets)
        }
        "APPENDUID" => ResponseCode::AppendUid {
            uid_validity: tokenizer.read_u64()?,
            uid: tokenizer.read_u64()?,
        },
        "COPYUID" => ResponseCode::CopyUid {
            uid_validity: tokenizer.read_u64()?,
            source: read_uid_set(tokenizer)?,
            destination: read_uid_set(tokenizer)?,
        },
        _ => {
            let rest = tokenizer.collect_to_close_bracket()?;
            let raw = if rest.is_empty() {
                atom
            } else {
                format!("{atom} {rest}")
            };
            return Ok(ResponseCode::Unknown(raw));
        }
    };

    tokenizer.skip_bracket_remainder()?;
    Ok(code)
}

fn read_uid_set(tokenizer: &mut Tokenizer) -> Result<UidSet> {
    let raw = tokenizer.read_atom_string()?;
    raw.parse()
        .map_err(|e| Error::parse(tokenizer.position(), format!("Invalid UID set {raw:?}: {e}")))
}

/// Parses capability atoms up to the end of the line or a closing `]`.
pub fn parse_capability_data(tokenizer: &mut Tokenizer) -> Result<Vec<String>> {
    let mut caps = Vec::new();
    loop {
        match tokenizer.peek()? {
            Token::Atom(cap) => {
                tokenizer.next()?;
                caps.push(cap);
            }
            Token::RBracket | Token::EndOfLine => break,
            token => return Err(unexpected(tokenizer, "capability list", &token)),
        }
    }
    Ok(caps)
}

/// Parses a parenthesised flag list.
pub fn parse_flag_list(tokenizer: &mut Tokenizer) -> Result<Flags> {
    tokenizer.expect(&Token::LParen)?;
    let mut flags = Flags::new();
    loop {
        match tokenizer.next()? {
            Token::RParen => break,
            Token::Atom(s) => flags.insert(Flag::parse(&s)),
            token => return Err(unexpected(tokenizer, "flag list", &token)),
        }
    }
    Ok(flags)
}

/// Parses LIST or LSUB data.
pub fn parse_list_entry(tokenizer: &mut Tokenizer) -> Result<ListEntry> {
    tokenizer.expect(&Token::LParen)?;
    let mut attributes = Vec::new();
    loop {
        match tokenizer.next()? {
            Token::RParen => break,
            Token::Atom(attr) => attributes.push(attr),
            token => return Err(unexpected(tokenizer, "mailbox attributes", &token)),
        }
    }

    let delimiter = match tokenizer.next()? {
        Token::Nil => None,
        Token::QuotedString(s) => s.chars().next(),
        token => return Err(unexpected(tokenizer, "hierarchy delimiter", &token)),
    };

    let name = decode_mailbox(tokenizer.read_astring()?);
    Ok(ListEntry {
        attributes,
        delimiter,
        name,
    })
}

/// Parses SEARCH data: numbers up to the end of the line.
pub fn parse_search(tokenizer: &mut Tokenizer) -> Result<Vec<u64>> {
    let mut ids = Vec::new();
    loop {
        match tokenizer.next()? {
            Token::Number(n) => ids.push(n),
            Token::EndOfLine => break,
            // Trailing extension data such as (MODSEQ n)
            Token::LParen => tokenizer.skip_list_remainder()?,
            token => return Err(unexpected(tokenizer, "search results", &token)),
        }
    }
    Ok(ids)
}

/// Parses STATUS data.
pub fn parse_status(tokenizer: &mut Tokenizer) -> Result<MailboxStatus> {
    let mailbox = decode_mailbox(tokenizer.read_astring()?);
    tokenizer.expect(&Token::LParen)?;
    let mut items = Vec::new();
    while !tokenizer.next_is_rparen()? {
        let name = tokenizer.read_atom_string()?.to_ascii_uppercase();
        let value = tokenizer.read_u64()?;
        items.push((name, value));
    }
    tokenizer.next()?;
    Ok(MailboxStatus { mailbox, items })
}

/// Parses NAMESPACE data: personal, other users' and shared namespaces.
pub fn parse_namespace(tokenizer: &mut Tokenizer) -> Result<Namespaces> {
    Ok(Namespaces {
        personal: parse_namespace_list(tokenizer)?,
        other: parse_namespace_list(tokenizer)?,
        shared: parse_namespace_list(tokenizer)?,
    })
}

fn parse_namespace_list(tokenizer: &mut Tokenizer) -> Result<Vec<NamespaceEntry>> {
    match tokenizer.next()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut entries = Vec::new();
            loop {
                match tokenizer.next()? {
                    Token::RParen => break,
                    Token::LParen => {
                        let prefix = decode_mailbox(tokenizer.read_astring()?);
                        let delimiter = tokenizer
                            .read_nstring()?
                            .and_then(|d| d.chars().next());
                        // Namespace response extensions
                        tokenizer.skip_list_remainder()?;
                        entries.push(NamespaceEntry { prefix, delimiter });
                    }
                    token => return Err(unexpected(tokenizer, "namespace", &token)),
                }
            }
            Ok(entries)
        }
        token => Err(unexpected(tokenizer, "namespace", &token)),
    }
}

/// Parses ACL data: mailbox followed by identifier/rights pairs.
pub fn parse_acl(tokenizer: &mut Tokenizer) -> Result<(String, Vec<AclEntry>)> {
    let mailbox = decode_mailbox(tokenizer.read_astring()?);
    let mut entries = Vec::new();
    while !tokenizer.next_is_end_of_line()? {
        let identifier = tokenizer.read_astring()?;
        let rights = tokenizer.read_astring()?;
        entries.push(AclEntry { identifier, rights });
    }
    Ok((mailbox, entries))
}

/// Parses LISTRIGHTS data.
pub fn parse_list_rights(tokenizer: &mut Tokenizer) -> Result<ListRights> {
    let mailbox = decode_mailbox(tokenizer.read_astring()?);
    let identifier = tokenizer.read_astring()?;
    let required = tokenizer.read_astring()?;
    let mut optional = Vec::new();
    while !tokenizer.next_is_end_of_line()? {
        optional.push(tokenizer.read_astring()?);
    }
    Ok(ListRights {
        mailbox,
        identifier,
        required,
        optional,
    })
}

/// Parses MYRIGHTS data.
pub fn parse_my_rights(tokenizer: &mut Tokenizer) -> Result<(String, String)> {
    let mailbox = decode_mailbox(tokenizer.read_astring()?);
    let rights = tokenizer.read_astring()?;
    Ok((mailbox, rights))
}

/// Parses QUOTA data: root followed by (name usage limit) triples.
pub fn parse_quota(tokenizer: &mut Tokenizer) -> Result<Quota> {
    let root = tokenizer.read_astring()?;
    tokenizer.expect(&Token::LParen)?;
    let mut resources = Vec::new();
    while !tokenizer.next_is_rparen()? {
        let name = tokenizer.read_atom_string()?.to_ascii_uppercase();
        let usage = tokenizer.read_u64()?;
        let limit = tokenizer.read_u64()?;
        resources.push(QuotaResource { name, usage, limit });
    }
    tokenizer.next()?;
    Ok(Quota { root, resources })
}

/// Parses QUOTAROOT data: mailbox followed by zero or more roots.
pub fn parse_quota_root(tokenizer: &mut Tokenizer) -> Result<(String, Vec<String>)> {
    let mailbox = decode_mailbox(tokenizer.read_astring()?);
    let mut roots = Vec::new();
    while !tokenizer.next_is_end_of_line()? {
        roots.push(tokenizer.read_astring()?);
    }
    Ok((mailbox, roots))
}
