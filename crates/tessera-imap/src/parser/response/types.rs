//! Response data types.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};

use crate::literal::Literal;
use crate::types::{
    AclEntry, Flags, ListEntry, ListRights, MailboxStatus, Namespaces, Quota, ResponseCode, Status,
};

/// Untagged response data.
#[derive(Debug, Clone, PartialEq)]
pub enum UntaggedResponse {
    /// OK, NO, BAD, PREAUTH or BYE condition.
    Condition {
        /// Condition status.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// CAPABILITY data.
    Capability(Vec<String>),
    /// FLAGS data: flags defined in the mailbox.
    Flags(Flags),
    /// LIST entry.
    List(ListEntry),
    /// LSUB entry.
    Lsub(ListEntry),
    /// SEARCH results, as sequence numbers or UIDs.
    Search(Vec<u64>),
    /// STATUS data.
    Status(MailboxStatus),
    /// NAMESPACE data.
    Namespace(Namespaces),
    /// ACL data.
    Acl {
        /// Mailbox name.
        mailbox: String,
        /// Identifier and rights pairs.
        entries: Vec<AclEntry>,
    },
    /// LISTRIGHTS data.
    ListRights(ListRights),
    /// MYRIGHTS data.
    MyRights {
        /// Mailbox name.
        mailbox: String,
        /// Rights of the current user.
        rights: String,
    },
    /// QUOTA data.
    Quota(Quota),
    /// QUOTAROOT data.
    QuotaRoot {
        /// Mailbox name.
        mailbox: String,
        /// Quota roots of the mailbox.
        roots: Vec<String>,
    },
    /// Message count.
    Exists(u32),
    /// Recent count.
    Recent(u32),
    /// Message expunged.
    Expunge(u32),
    /// FETCH data.
    Fetch {
        /// Message sequence number.
        seq: u32,
        /// Data items.
        items: Vec<FetchItem>,
    },
    /// Response the parser does not model.
    Unknown {
        /// Leading keyword.
        keyword: String,
        /// Remaining raw text.
        text: String,
    },
}

/// FETCH response item.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchItem {
    /// Message flags.
    Flags(Flags),
    /// UID.
    Uid(u64),
    /// Internal date.
    InternalDate(DateTime<FixedOffset>),
    /// RFC822.SIZE.
    Rfc822Size(u32),
    /// Envelope.
    Envelope(Box<Envelope>),
    /// BODYSTRUCTURE, or BODY without a section.
    BodyStructure(BodyStructure),
    /// Message data: `BODY[section]<origin>` or one of the RFC822 forms.
    Body {
        /// Section specifier, e.g. `HEADER` or `1.2`; empty for the whole message.
        /// RFC822, RFC822.HEADER and RFC822.TEXT map to empty, `HEADER` and `TEXT`.
        section: String,
        /// Origin octet for a partial fetch.
        origin: Option<u32>,
        /// Payload; `None` for NIL.
        data: Option<Literal>,
    },
}

/// Message envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    /// Date header.
    pub date: Option<String>,
    /// Subject header.
    pub subject: Option<String>,
    /// From addresses.
    pub from: Vec<Address>,
    /// Sender addresses.
    pub sender: Vec<Address>,
    /// Reply-To addresses.
    pub reply_to: Vec<Address>,
    /// To addresses.
    pub to: Vec<Address>,
    /// Cc addresses.
    pub cc: Vec<Address>,
    /// Bcc addresses.
    pub bcc: Vec<Address>,
    /// In-Reply-To header.
    pub in_reply_to: Option<String>,
    /// Message-ID header.
    pub message_id: Option<String>,
}

/// Address from an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Address {
    /// Display name.
    pub personal: Option<String>,
    /// Source route (obsolete).
    pub route: Option<String>,
    /// Mailbox name (local part), or group name in group syntax.
    pub mailbox: Option<String>,
    /// Host name (domain part).
    pub host: Option<String>,
}

impl Address {
    /// Returns `mailbox@host`, or `None` if either part is NIL.
    #[must_use]
    pub fn address(&self) -> Option<String> {
        match (&self.mailbox, &self.host) {
            (Some(m), Some(h)) => Some(format!("{m}@{h}")),
            _ => None,
        }
    }
}

/// A MIME body structure tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStructure {
    /// Leaf part.
    Part(BodyPart),
    /// Multipart node.
    Multipart(Multipart),
}

impl BodyStructure {
    /// Primary media type, lower-cased.
    #[must_use]
    pub fn media_type(&self) -> &str {
        match self {
            Self::Part(part) => &part.media_type,
            Self::Multipart(_) => Multipart::MEDIA_TYPE,
        }
    }

    /// Media subtype, lower-cased.
    #[must_use]
    pub fn subtype(&self) -> &str {
        match self {
            Self::Part(part) => &part.subtype,
            Self::Multipart(multi) => &multi.subtype,
        }
    }
}

/// Leaf body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    /// Primary type, lower-cased.
    pub media_type: String,
    /// Subtype, lower-cased.
    pub subtype: String,
    /// Content-Type parameters; keys lower-cased.
    pub params: BTreeMap<String, String>,
    /// Content-ID.
    pub id: Option<String>,
    /// Content-Description.
    pub description: Option<String>,
    /// Content-Transfer-Encoding, lower-cased.
    pub encoding: String,
    /// Size in octets.
    pub size: u32,
    /// Type-specific fields.
    pub kind: PartKind,
    /// Content-MD5 (extension data).
    pub md5: Option<String>,
    /// Content-Disposition (extension data).
    pub disposition: Option<Disposition>,
    /// Content-Language (extension data).
    pub language: Vec<String>,
    /// Content-Location (extension data).
    pub location: Option<String>,
}

impl BodyPart {
    /// Line count of a text or message/rfc822 part.
    #[must_use]
    pub const fn lines(&self) -> Option<u32> {
        match &self.kind {
            PartKind::Basic => None,
            PartKind::Text { lines } | PartKind::Message { lines, .. } => Some(*lines),
        }
    }
}

/// Fields that depend on a leaf part's media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartKind {
    /// Any type other than text and message/rfc822.
    Basic,
    /// `text/*`.
    Text {
        /// Size in lines.
        lines: u32,
    },
    /// `message/rfc822`.
    Message {
        /// Envelope of the encapsulated message.
        envelope: Box<Envelope>,
        /// Body structure of the encapsulated message.
        body: Box<BodyStructure>,
        /// Size in lines.
        lines: u32,
    },
}

/// Multipart node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multipart {
    /// Child parts, never empty.
    pub parts: Vec<BodyStructure>,
    /// Subtype, lower-cased.
    pub subtype: String,
    /// Content-Type parameters; keys lower-cased.
    pub params: BTreeMap<String, String>,
    /// Content-Disposition.
    pub disposition: Option<Disposition>,
    /// Content-Language.
    pub language: Vec<String>,
    /// Content-Location.
    pub location: Option<String>,
}

impl Multipart {
    /// Primary type of every multipart node.
    pub const MEDIA_TYPE: &'static str = "multipart";

    /// Always `"multipart"`.
    #[must_use]
    pub const fn media_type(&self) -> &'static str {
        Self::MEDIA_TYPE
    }
}

/// Content-Disposition value and parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposition {
    /// Disposition type, lower-cased, e.g. `attachment`.
    pub kind: String,
    /// Parameters; keys lower-cased.
    pub params: BTreeMap<String, String>,
}
