//! IMAP response parser.
//!
//! Builds structured responses from [`Tokenizer`] output. Parsing never
//! touches the network: the connection layer hands over one complete
//! [`Frame`] at a time.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::match_same_arms)]

mod fetch;
mod helpers;
mod types;

pub use fetch::INTERNAL_DATE_FORMAT;
pub use types::{
    Address, BodyPart, BodyStructure, Disposition, Envelope, FetchItem, Multipart, PartKind,
    UntaggedResponse,
};

use crate::parser::tokenizer::{Frame, Token, Tokenizer};
use crate::types::{ResponseCode, Status};
use crate::{Error, Result};

use helpers::{
    parse_acl, parse_capability_data, parse_flag_list, parse_list_entry, parse_list_rights,
    parse_my_rights, parse_namespace, parse_quota, parse_quota_root, parse_resp_text,
    parse_search, parse_status,
};

/// A parsed IMAP response.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Tagged response (command completion).
    Tagged {
        /// The command tag.
        tag: String,
        /// Response status: OK, NO or BAD.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Untagged response (server data).
    Untagged(UntaggedResponse),
    /// Continuation request.
    Continuation {
        /// Text after `+`; base64 challenge data during AUTHENTICATE.
        text: String,
    },
}

/// Response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses a complete response held in memory.
    pub fn parse(input: &[u8]) -> Result<Response> {
        Self::parse_frame(Frame::from_bytes(input)?)
    }

    /// Parses a response frame read from the wire.
    pub fn parse_frame(frame: Frame) -> Result<Response> {
        let mut tokenizer = Tokenizer::new(frame);
        let response = Self::parse_tokens(&mut tokenizer);
        tokenizer.reset();
        response
    }

    /// Parses one response from a tokenizer positioned at the start of a line.
    pub fn parse_tokens(tokenizer: &mut Tokenizer) -> Result<Response> {
        match tokenizer.next()? {
            Token::Untagged => Self::parse_untagged(tokenizer).map(Response::Untagged),
            Token::Continuation => Ok(Response::Continuation {
                text: tokenizer.collect_to_end_of_line(),
            }),
            Token::Tag(tag) => Self::parse_tagged(tokenizer, tag),
            token => Err(Error::parse(
                0,
                format!("Expected *, + or tag, got {token:?}"),
            )),
        }
    }

    fn parse_tagged(tokenizer: &mut Tokenizer, tag: String) -> Result<Response> {
        let atom = tokenizer.read_atom_string()?;
        let status = match Status::parse(&atom) {
            Some(status @ (Status::Ok | Status::No | Status::Bad)) => status,
            _ => {
                return Err(Error::parse(
                    tokenizer.position(),
                    format!("Invalid tagged status: {atom}"),
                ));
            }
        };
        let (code, text) = parse_resp_text(tokenizer)?;
        Ok(Response::Tagged {
            tag,
            status,
            code,
            text,
        })
    }

    fn parse_untagged(tokenizer: &mut Tokenizer) -> Result<UntaggedResponse> {
        match tokenizer.next()? {
            Token::Atom(keyword) => Self::parse_untagged_keyword(tokenizer, keyword),
            Token::Number(n) => Self::parse_message_data(tokenizer, n),
            token => Err(Error::parse(
                tokenizer.position(),
                format!("Unexpected token in untagged response: {token:?}"),
            )),
        }
    }

    fn parse_untagged_keyword(
        tokenizer: &mut Tokenizer,
        keyword: String,
    ) -> Result<UntaggedResponse> {
        let upper = keyword.to_ascii_uppercase();
        if let Some(status) = Status::parse(&upper) {
            let (code, text) = parse_resp_text(tokenizer)?;
            return Ok(UntaggedResponse::Condition { status, code, text });
        }

        let response = match upper.as_str() {
            "CAPABILITY" => UntaggedResponse::Capability(parse_capability_data(tokenizer)?),
            "FLAGS" => UntaggedResponse::Flags(parse_flag_list(tokenizer)?),
            "LIST" => UntaggedResponse::List(parse_list_entry(tokenizer)?),
            "LSUB" => UntaggedResponse::Lsub(parse_list_entry(tokenizer)?),
            "SEARCH" => UntaggedResponse::Search(parse_search(tokenizer)?),
            "STATUS" => UntaggedResponse::Status(parse_status(tokenizer)?),
            "NAMESPACE" => UntaggedResponse::Namespace(parse_namespace(tokenizer)?),
            "ACL" => {
                let (mailbox, entries) = parse_acl(tokenizer)?;
                UntaggedResponse::Acl { mailbox, entries }
            }
            "LISTRIGHTS" => UntaggedResponse::ListRights(parse_list_rights(tokenizer)?),
            "MYRIGHTS" => {
                let (mailbox, rights) = parse_my_rights(tokenizer)?;
                UntaggedResponse::MyRights { mailbox, rights }
            }
            "QUOTA" => UntaggedResponse::Quota(parse_quota(tokenizer)?),
            "QUOTAROOT" => {
                let (mailbox, roots) = parse_quota_root(tokenizer)?;
                UntaggedResponse::QuotaRoot { mailbox, roots }
            }
            _ => UntaggedResponse::Unknown {
                keyword,
                text: tokenizer.collect_to_end_of_line().trim_start().to_string(),
            },
        };
        Ok(response)
    }

    fn parse_message_data(tokenizer: &mut Tokenizer, n: u64) -> Result<UntaggedResponse> {
        let keyword = tokenizer.read_atom_string()?;
        let upper = keyword.to_ascii_uppercase();
        if !matches!(upper.as_str(), "EXISTS" | "RECENT" | "EXPUNGE" | "FETCH") {
            return Ok(UntaggedResponse::Unknown {
                keyword: format!("{n} {keyword}"),
                text: tokenizer.collect_to_end_of_line().trim_start().to_string(),
            });
        }

        let n = u32::try_from(n).map_err(|_| {
            Error::parse(
                tokenizer.position(),
                format!("Message number {n} out of range"),
            )
        })?;
        Ok(match upper.as_str() {
            "EXISTS" => UntaggedResponse::Exists(n),
            "RECENT" => UntaggedResponse::Recent(n),
            "EXPUNGE" => UntaggedResponse::Expunge(n),
            _ => UntaggedResponse::Fetch {
                seq: n,
                items: fetch::parse_fetch(tokenizer)?,
            },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use crate::types::{Flag, UidSet};

    use super::*;

    fn untagged(input: &[u8]) -> UntaggedResponse {
        match ResponseParser::parse(input).unwrap() {
            Response::Untagged(response) => response,
            other => panic!("Expected untagged response, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_greeting() {
        match untagged(b"* OK [CAPABILITY IMAP4rev1 STARTTLS AUTH=PLAIN] ready\r\n") {
            UntaggedResponse::Condition { status, code, text } => {
                assert_eq!(status, Status::Ok);
                assert_eq!(
                    code,
                    Some(ResponseCode::Capability(vec![
                        "IMAP4rev1".to_string(),
                        "STARTTLS".to_string(),
                        "AUTH=PLAIN".to_string(),
                    ]))
                );
                assert_eq!(text, "ready");
            }
            other => panic!("Expected condition, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_tagged_ok() {
        let response = ResponseParser::parse(b"A001 OK LOGIN completed\r\n").unwrap();
        assert_eq!(
            response,
            Response::Tagged {
                tag: "A001".to_string(),
                status: Status::Ok,
                code: None,
                text: "LOGIN completed".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_tagged_without_text() {
        let response = ResponseParser::parse(b"A2 NO\r\n").unwrap();
        assert!(matches!(response, Response::Tagged { status: Status::No, ref text, .. } if text.is_empty()));
    }

    #[test]
    fn test_tagged_preauth_is_invalid() {
        assert!(ResponseParser::parse(b"A1 PREAUTH hi\r\n").is_err());
    }

    #[test]
    fn test_parse_uidplus_codes() {
        let response =
            ResponseParser::parse(b"A3 OK [COPYUID 38505 304,319:320 3956:3958] Done\r\n").unwrap();
        let Response::Tagged {
            code: Some(ResponseCode::CopyUid {
                uid_validity,
                source,
                destination,
            }),
            ..
        } = response
        else {
            panic!("Expected COPYUID");
        };
        assert_eq!(uid_validity, 38505);
        assert_eq!(source, "304,319:320".parse::<UidSet>().unwrap());
        assert_eq!(destination.size(), 3);

        let response = ResponseParser::parse(b"A4 OK [APPENDUID 38505 3955] APPEND completed\r\n")
            .unwrap();
        assert!(matches!(
            response,
            Response::Tagged {
                code: Some(ResponseCode::AppendUid {
                    uid_validity: 38505,
                    uid: 3955
                }),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_permanent_flags_and_unknown_code() {
        match untagged(b"* OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)] Limited\r\n") {
            UntaggedResponse::Condition {
                code: Some(ResponseCode::PermanentFlags(flags)),
                ..
            } => {
                assert!(flags.contains(&Flag::Deleted));
                assert!(flags.contains(&Flag::MayCreate));
            }
            other => panic!("Expected PERMANENTFLAGS, got {other:?}"),
        }
        match untagged(b"* NO [REFERRAL imap://x/%2A] moved\r\n") {
            UntaggedResponse::Condition {
                status: Status::No,
                code: Some(ResponseCode::Unknown(raw)),
                text,
            } => {
                assert_eq!(raw, "REFERRAL imap://x/%2A");
                assert_eq!(text, "moved");
            }
            other => panic!("Expected unknown code, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_badcharset() {
        let response = ResponseParser::parse(b"A5 NO [BADCHARSET (UTF-8 \"ISO-8859-1\")] no\r\n")
            .unwrap();
        assert!(matches!(
            response,
            Response::Tagged { code: Some(ResponseCode::BadCharset(ref c)), .. }
                if c == &["UTF-8".to_string(), "ISO-8859-1".to_string()]
        ));
    }

    #[test]
    fn test_parse_message_data() {
        assert_eq!(untagged(b"* 23 EXISTS\r\n"), UntaggedResponse::Exists(23));
        assert_eq!(untagged(b"* 5 RECENT\r\n"), UntaggedResponse::Recent(5));
        assert_eq!(untagged(b"* 3 EXPUNGE\r\n"), UntaggedResponse::Expunge(3));
    }

    #[test]
    fn test_parse_list_decodes_mailbox_name() {
        match untagged(b"* LIST (\\HasNoChildren) \"/\" \"Entw&APw-rfe\"\r\n") {
            UntaggedResponse::List(entry) => {
                assert_eq!(entry.name, "Entwürfe");
                assert_eq!(entry.delimiter, Some('/'));
                assert!(entry.has_attribute("\\hasnochildren"));
            }
            other => panic!("Expected LIST, got {other:?}"),
        }
        match untagged(b"* LSUB () NIL INBOX\r\n") {
            UntaggedResponse::Lsub(entry) => {
                assert_eq!(entry.name, "INBOX");
                assert_eq!(entry.delimiter, None);
            }
            other => panic!("Expected LSUB, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_search_and_status() {
        assert_eq!(
            untagged(b"* SEARCH 2 84 882\r\n"),
            UntaggedResponse::Search(vec![2, 84, 882])
        );
        assert_eq!(untagged(b"* SEARCH\r\n"), UntaggedResponse::Search(vec![]));

        match untagged(b"* STATUS blurdybloop (MESSAGES 231 UIDNEXT 44292)\r\n") {
            UntaggedResponse::Status(status) => {
                assert_eq!(status.mailbox, "blurdybloop");
                assert_eq!(status.messages(), Some(231));
                assert_eq!(status.uid_next(), Some(44292));
                assert_eq!(status.unseen(), None);
            }
            other => panic!("Expected STATUS, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_namespace() {
        match untagged(b"* NAMESPACE ((\"\" \"/\")) ((\"~\" \"/\")) NIL\r\n") {
            UntaggedResponse::Namespace(ns) => {
                assert_eq!(ns.personal.len(), 1);
                assert_eq!(ns.personal[0].prefix, "");
                assert_eq!(ns.other[0].prefix, "~");
                assert_eq!(ns.other[0].delimiter, Some('/'));
                assert!(ns.shared.is_empty());
            }
            other => panic!("Expected NAMESPACE, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_acl_family() {
        match untagged(b"* ACL INBOX Fred rwipsldexta admins lrswi\r\n") {
            UntaggedResponse::Acl { mailbox, entries } => {
                assert_eq!(mailbox, "INBOX");
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[1].identifier, "admins");
                assert_eq!(entries[1].rights, "lrswi");
            }
            other => panic!("Expected ACL, got {other:?}"),
        }
        match untagged(b"* LISTRIGHTS ~/Mail/saved smith la r swicdkxte\r\n") {
            UntaggedResponse::ListRights(rights) => {
                assert_eq!(rights.identifier, "smith");
                assert_eq!(rights.required, "la");
                assert_eq!(rights.optional, vec!["r", "swicdkxte"]);
            }
            other => panic!("Expected LISTRIGHTS, got {other:?}"),
        }
        assert_eq!(
            untagged(b"* MYRIGHTS INBOX rwiptsldaex\r\n"),
            UntaggedResponse::MyRights {
                mailbox: "INBOX".to_string(),
                rights: "rwiptsldaex".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_quota_family() {
        match untagged(b"* QUOTA \"\" (STORAGE 10 512 MESSAGE 3 100)\r\n") {
            UntaggedResponse::Quota(quota) => {
                assert_eq!(quota.root, "");
                let storage = quota.resource("storage").unwrap();
                assert_eq!((storage.usage, storage.limit), (10, 512));
                assert_eq!(quota.resources.len(), 2);
            }
            other => panic!("Expected QUOTA, got {other:?}"),
        }
        assert_eq!(
            untagged(b"* QUOTAROOT INBOX \"\"\r\n"),
            UntaggedResponse::QuotaRoot {
                mailbox: "INBOX".to_string(),
                roots: vec![String::new()],
            }
        );
    }

    #[test]
    fn test_parse_continuation() {
        assert_eq!(
            ResponseParser::parse(b"+ Ready for literal\r\n").unwrap(),
            Response::Continuation {
                text: "Ready for literal".to_string()
            }
        );
        assert_eq!(
            ResponseParser::parse(b"+ \r\n").unwrap(),
            Response::Continuation {
                text: String::new()
            }
        );
    }

    #[test]
    fn test_unknown_responses_are_preserved() {
        assert_eq!(
            untagged(b"* ID (\"name\" \"Dovecot\")\r\n"),
            UntaggedResponse::Unknown {
                keyword: "ID".to_string(),
                text: "(\"name\" \"Dovecot\")".to_string(),
            }
        );
        assert!(matches!(
            untagged(b"* 4 VANISHED\r\n"),
            UntaggedResponse::Unknown { ref keyword, .. } if keyword == "4 VANISHED"
        ));
    }

    #[test]
    fn test_malformed_response_is_parse_error() {
        assert!(matches!(
            ResponseParser::parse(b"* 1 FETCH (UID abc)\r\n"),
            Err(Error::Parse { .. })
        ));
        assert!(matches!(
            ResponseParser::parse(b"* 1 FETCH (BODY[] {10}\r\nshort"),
            Err(Error::Truncated {
                expected: 10,
                received: 5
            })
        ));
    }
}
