//! IMAP command builder.
//!
//! Commands are encoded into one or more segments. Every segment but the
//! last ends with a synchronizing literal announcement; the client waits
//! for a `+` continuation before sending the next one.

mod serialize;
mod tag_generator;
mod types;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};

use crate::parser::response::INTERNAL_DATE_FORMAT;
use crate::types::{Flag, UidSet};
use crate::Result;

pub use tag_generator::TagGenerator;
pub use types::{
    FetchAttribute, FetchItems, SearchCriteria, SequenceSet, StatusAttribute, StoreAction,
};

use serialize::{
    Encoder, write_astring, write_atom, write_fetch_items, write_flags, write_mailbox,
    write_search_criteria, write_store_action,
};

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Any state
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,

    // Not authenticated
    /// STARTTLS command.
    StartTls,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE command.
    Authenticate {
        /// SASL mechanism name.
        mechanism: String,
        /// Base64 initial response (SASL-IR); `=` stands for an empty one.
        initial_response: Option<String>,
    },

    // Authenticated
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: String,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to examine.
        mailbox: String,
    },
    /// CREATE command.
    Create {
        /// Mailbox to create.
        mailbox: String,
    },
    /// DELETE command.
    Delete {
        /// Mailbox to delete.
        mailbox: String,
    },
    /// RENAME command.
    Rename {
        /// Current mailbox name.
        from: String,
        /// New mailbox name.
        to: String,
    },
    /// SUBSCRIBE command.
    Subscribe {
        /// Mailbox to subscribe.
        mailbox: String,
    },
    /// UNSUBSCRIBE command.
    Unsubscribe {
        /// Mailbox to unsubscribe.
        mailbox: String,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// LSUB command.
    Lsub {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// STATUS command.
    Status {
        /// Mailbox name.
        mailbox: String,
        /// Status items to request.
        items: Vec<StatusAttribute>,
    },
    /// APPEND command.
    Append {
        /// Target mailbox.
        mailbox: String,
        /// Flags to set.
        flags: Vec<Flag>,
        /// Internal date to set.
        date: Option<DateTime<FixedOffset>>,
        /// Message data.
        message: Bytes,
    },
    /// NAMESPACE command.
    Namespace,
    /// SETACL command.
    SetAcl {
        /// Mailbox name.
        mailbox: String,
        /// User or group identifier.
        identifier: String,
        /// Rights, optionally prefixed with `+` or `-`.
        rights: String,
    },
    /// DELETEACL command.
    DeleteAcl {
        /// Mailbox name.
        mailbox: String,
        /// User or group identifier.
        identifier: String,
    },
    /// GETACL command.
    GetAcl {
        /// Mailbox name.
        mailbox: String,
    },
    /// LISTRIGHTS command.
    ListRights {
        /// Mailbox name.
        mailbox: String,
        /// User or group identifier.
        identifier: String,
    },
    /// MYRIGHTS command.
    MyRights {
        /// Mailbox name.
        mailbox: String,
    },
    /// SETQUOTA command.
    SetQuota {
        /// Quota root.
        root: String,
        /// Resource name and limit pairs, in order.
        limits: Vec<(String, u64)>,
    },
    /// GETQUOTA command.
    GetQuota {
        /// Quota root.
        root: String,
    },
    /// GETQUOTAROOT command.
    GetQuotaRoot {
        /// Mailbox name.
        mailbox: String,
    },

    // Selected
    /// CHECK command.
    Check,
    /// CLOSE command.
    Close,
    /// EXPUNGE command.
    Expunge,
    /// UID EXPUNGE command (RFC 4315).
    UidExpunge {
        /// UIDs to expunge.
        uids: UidSet,
    },
    /// SEARCH or UID SEARCH command.
    Search {
        /// Charset of string criteria.
        charset: Option<String>,
        /// Search criteria.
        criteria: SearchCriteria,
        /// Return UIDs instead of sequence numbers.
        uid: bool,
    },
    /// FETCH or UID FETCH command.
    Fetch {
        /// Messages to fetch.
        set: SequenceSet,
        /// Items to fetch.
        items: FetchItems,
    },
    /// STORE or UID STORE command.
    Store {
        /// Messages to update.
        set: SequenceSet,
        /// Store action.
        action: StoreAction,
        /// Suppress the FETCH responses.
        silent: bool,
    },
    /// COPY or UID COPY command.
    Copy {
        /// Messages to copy.
        set: SequenceSet,
        /// Target mailbox.
        mailbox: String,
    },
}

/// A command ready to be written, split at synchronizing literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCommand {
    /// Command tag.
    pub tag: String,
    /// Command name for logging, e.g. `UID FETCH`.
    pub name: &'static str,
    /// Wire segments; each but the last ends with a literal announcement.
    pub segments: Vec<Vec<u8>>,
    /// Whether the command carries credentials that must not be traced.
    pub sensitive: bool,
}

impl EncodedCommand {
    /// Concatenates all segments.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.segments.concat()
    }
}

impl Command {
    /// Command name as sent on the wire, including any `UID` prefix.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Create { .. } => "CREATE",
            Self::Delete { .. } => "DELETE",
            Self::Rename { .. } => "RENAME",
            Self::Subscribe { .. } => "SUBSCRIBE",
            Self::Unsubscribe { .. } => "UNSUBSCRIBE",
            Self::List { .. } => "LIST",
            Self::Lsub { .. } => "LSUB",
            Self::Status { .. } => "STATUS",
            Self::Append { .. } => "APPEND",
            Self::Namespace => "NAMESPACE",
            Self::SetAcl { .. } => "SETACL",
            Self::DeleteAcl { .. } => "DELETEACL",
            Self::GetAcl { .. } => "GETACL",
            Self::ListRights { .. } => "LISTRIGHTS",
            Self::MyRights { .. } => "MYRIGHTS",
            Self::SetQuota { .. } => "SETQUOTA",
            Self::GetQuota { .. } => "GETQUOTA",
            Self::GetQuotaRoot { .. } => "GETQUOTAROOT",
            Self::Check => "CHECK",
            Self::Close => "CLOSE",
            Self::Expunge => "EXPUNGE",
            Self::UidExpunge { .. } => "UID EXPUNGE",
            Self::Search { uid, .. } => {
                if *uid {
                    "UID SEARCH"
                } else {
                    "SEARCH"
                }
            }
            Self::Fetch { set, .. } => {
                if set.is_uid() {
                    "UID FETCH"
                } else {
                    "FETCH"
                }
            }
            Self::Store { set, .. } => {
                if set.is_uid() {
                    "UID STORE"
                } else {
                    "STORE"
                }
            }
            Self::Copy { set, .. } => {
                if set.is_uid() {
                    "UID COPY"
                } else {
                    "COPY"
                }
            }
        }
    }

    /// Serializes the command with the given tag.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidCommand`] if a flag keyword, section specifier,
    /// mechanism or quota resource could not be sent without escaping its
    /// argument.
    #[allow(clippy::too_many_lines)]
    pub fn encode(&self, tag: &str) -> Result<EncodedCommand> {
        let mut enc = Encoder::new();
        enc.text(tag);
        enc.space();
        enc.text(self.name());

        match self {
            Self::Capability
            | Self::Noop
            | Self::Logout
            | Self::StartTls
            | Self::Namespace
            | Self::Check
            | Self::Close
            | Self::Expunge => {}

            Self::Login { username, password } => {
                enc.space();
                write_astring(&mut enc, username);
                enc.space();
                write_astring(&mut enc, password);
            }

            Self::Authenticate {
                mechanism,
                initial_response,
            } => {
                enc.space();
                write_atom(&mut enc, "mechanism", mechanism)?;
                if let Some(response) = initial_response {
                    enc.space();
                    enc.text(response);
                }
            }

            Self::Select { mailbox }
            | Self::Examine { mailbox }
            | Self::Create { mailbox }
            | Self::Delete { mailbox }
            | Self::Subscribe { mailbox }
            | Self::Unsubscribe { mailbox }
            | Self::GetAcl { mailbox }
            | Self::MyRights { mailbox }
            | Self::GetQuotaRoot { mailbox } => {
                enc.space();
                write_mailbox(&mut enc, mailbox);
            }

            Self::Rename { from, to } => {
                enc.space();
                write_mailbox(&mut enc, from);
                enc.space();
                write_mailbox(&mut enc, to);
            }

            Self::List { reference, pattern } | Self::Lsub { reference, pattern } => {
                enc.space();
                write_mailbox(&mut enc, reference);
                enc.space();
                write_mailbox(&mut enc, pattern);
            }

            Self::Status { mailbox, items } => {
                enc.space();
                write_mailbox(&mut enc, mailbox);
                enc.text(" (");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        enc.space();
                    }
                    enc.text(item.as_str());
                }
                enc.text(")");
            }

            Self::Append {
                mailbox,
                flags,
                date,
                message,
            } => {
                enc.space();
                write_mailbox(&mut enc, mailbox);
                if !flags.is_empty() {
                    enc.space();
                    write_flags(&mut enc, flags)?;
                }
                if let Some(date) = date {
                    enc.text(&format!(" \"{}\"", date.format(INTERNAL_DATE_FORMAT)));
                }
                enc.space();
                enc.literal(message);
            }

            Self::SetAcl {
                mailbox,
                identifier,
                rights,
            } => {
                enc.space();
                write_mailbox(&mut enc, mailbox);
                enc.space();
                write_astring(&mut enc, identifier);
                enc.space();
                write_astring(&mut enc, rights);
            }

            Self::DeleteAcl {
                mailbox,
                identifier,
            }
            | Self::ListRights {
                mailbox,
                identifier,
            } => {
                enc.space();
                write_mailbox(&mut enc, mailbox);
                enc.space();
                write_astring(&mut enc, identifier);
            }

            Self::SetQuota { root, limits } => {
                enc.space();
                write_astring(&mut enc, root);
                enc.text(" (");
                for (i, (resource, limit)) in limits.iter().enumerate() {
                    if i > 0 {
                        enc.space();
                    }
                    write_atom(&mut enc, "quota resource", resource)?;
                    enc.text(&format!(" {limit}"));
                }
                enc.text(")");
            }

            Self::GetQuota { root } => {
                enc.space();
                write_astring(&mut enc, root);
            }

            Self::UidExpunge { uids } => {
                enc.text(&format!(" {uids}"));
            }

            Self::Search {
                charset, criteria, ..
            } => {
                if let Some(charset) = charset {
                    enc.text(" CHARSET ");
                    write_astring(&mut enc, charset);
                }
                enc.space();
                write_search_criteria(&mut enc, criteria)?;
            }

            Self::Fetch { set, items } => {
                enc.text(&format!(" {set} "));
                write_fetch_items(&mut enc, items)?;
            }

            Self::Store {
                set,
                action,
                silent,
            } => {
                enc.text(&format!(" {set} "));
                write_store_action(&mut enc, action, *silent)?;
            }

            Self::Copy { set, mailbox } => {
                enc.text(&format!(" {set} "));
                write_mailbox(&mut enc, mailbox);
            }
        }

        Ok(EncodedCommand {
            tag: tag.to_string(),
            name: self.name(),
            segments: enc.finish(),
            sensitive: matches!(self, Self::Login { .. } | Self::Authenticate { .. }),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::Error;
    use crate::types::MessageSet;

    use super::*;

    fn wire(command: &Command) -> Vec<u8> {
        command.encode("A001").unwrap().to_bytes()
    }

    #[test]
    fn test_capability_command() {
        assert_eq!(wire(&Command::Capability), b"A001 CAPABILITY\r\n");
    }

    #[test]
    fn test_login_command() {
        let cmd = Command::Login {
            username: "user@example.com".to_string(),
            password: "pass word".to_string(),
        };
        let encoded = cmd.encode("A001").unwrap();
        assert!(encoded.sensitive);
        assert_eq!(
            encoded.to_bytes(),
            b"A001 LOGIN user@example.com \"pass word\"\r\n"
        );
    }

    #[test]
    fn test_select_encodes_mailbox() {
        let cmd = Command::Select {
            mailbox: "Entwürfe".to_string(),
        };
        assert_eq!(wire(&cmd), b"A001 SELECT Entw&APw-rfe\r\n");
    }

    #[test]
    fn test_list_command() {
        let cmd = Command::List {
            reference: String::new(),
            pattern: "*".to_string(),
        };
        assert_eq!(wire(&cmd), b"A001 LIST \"\" \"*\"\r\n");
    }

    #[test]
    fn test_status_command() {
        let cmd = Command::Status {
            mailbox: "INBOX".to_string(),
            items: vec![StatusAttribute::Messages, StatusAttribute::UidNext],
        };
        assert_eq!(wire(&cmd), b"A001 STATUS INBOX (MESSAGES UIDNEXT)\r\n");
    }

    #[test]
    fn test_append_splits_at_literal() {
        let date = DateTime::parse_from_rfc3339("2024-02-07T21:52:25-08:00").unwrap();
        let cmd = Command::Append {
            mailbox: "Sent".to_string(),
            flags: vec![Flag::Seen],
            date: Some(date),
            message: Bytes::from_static(b"Subject: hi\r\n\r\nbody"),
        };
        let encoded = cmd.encode("A7").unwrap();
        assert_eq!(encoded.segments.len(), 2);
        assert_eq!(
            encoded.segments[0],
            b"A7 APPEND Sent (\\Seen) \"07-Feb-2024 21:52:25 -0800\" {19}\r\n"
        );
        assert_eq!(encoded.segments[1], b"Subject: hi\r\n\r\nbody\r\n");
    }

    #[test]
    fn test_fetch_command() {
        let cmd = Command::Fetch {
            set: SequenceSet::Messages(MessageSet::range(1, 10).unwrap()),
            items: FetchItems::Items(vec![FetchAttribute::Flags, FetchAttribute::Uid]),
        };
        assert_eq!(wire(&cmd), b"A001 FETCH 1:10 (FLAGS UID)\r\n");
    }

    #[test]
    fn test_uid_fetch_all() {
        let cmd = Command::Fetch {
            set: SequenceSet::Uids(UidSet::all()),
            items: FetchItems::Items(vec![FetchAttribute::BodySection {
                section: Some("HEADER".to_string()),
                peek: true,
                partial: Some((0, 1024)),
            }]),
        };
        assert_eq!(
            wire(&cmd),
            b"A001 UID FETCH 1:* BODY.PEEK[HEADER]<0.1024>\r\n"
        );
    }

    #[test]
    fn test_store_command() {
        let cmd = Command::Store {
            set: SequenceSet::Messages(MessageSet::single(1).unwrap()),
            action: StoreAction::AddFlags(vec![Flag::Seen]),
            silent: true,
        };
        assert_eq!(wire(&cmd), b"A001 STORE 1 +FLAGS.SILENT (\\Seen)\r\n");
    }

    #[test]
    fn test_search_with_charset_uses_literal() {
        let cmd = Command::Search {
            charset: Some("UTF-8".to_string()),
            criteria: SearchCriteria::Subject("Grüße".to_string()),
            uid: true,
        };
        let encoded = cmd.encode("A2").unwrap();
        assert_eq!(encoded.name, "UID SEARCH");
        assert_eq!(
            encoded.segments,
            vec![
                b"A2 UID SEARCH CHARSET UTF-8 SUBJECT {7}\r\n".to_vec(),
                "Grüße\r\n".as_bytes().to_vec(),
            ]
        );
    }

    #[test]
    fn test_acl_and_quota_commands() {
        let cmd = Command::SetAcl {
            mailbox: "INBOX".to_string(),
            identifier: "fred".to_string(),
            rights: "+lrs".to_string(),
        };
        assert_eq!(wire(&cmd), b"A001 SETACL INBOX fred +lrs\r\n");

        let cmd = Command::SetQuota {
            root: String::new(),
            limits: vec![("STORAGE".to_string(), 512), ("MESSAGE".to_string(), 100)],
        };
        assert_eq!(wire(&cmd), b"A001 SETQUOTA \"\" (STORAGE 512 MESSAGE 100)\r\n");
    }

    #[test]
    fn test_uid_expunge_command() {
        let cmd = Command::UidExpunge {
            uids: UidSet::range(100, 200).unwrap(),
        };
        assert_eq!(wire(&cmd), b"A001 UID EXPUNGE 100:200\r\n");
    }

    #[test]
    fn test_injected_keyword_rejected() {
        let cmd = Command::Store {
            set: SequenceSet::Messages(MessageSet::single(1).unwrap()),
            action: StoreAction::AddFlags(vec![Flag::Keyword("x\r\nA9 DELETE INBOX".to_string())]),
            silent: false,
        };
        assert!(matches!(cmd.encode("A001"), Err(Error::InvalidCommand(_))));

        let cmd = Command::SetQuota {
            root: String::new(),
            limits: vec![("STORAGE 1)\r\nA9 LOGOUT".to_string(), 1)],
        };
        assert!(matches!(cmd.encode("A001"), Err(Error::InvalidCommand(_))));
    }
}
