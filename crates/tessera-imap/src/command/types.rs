//! Command-related type definitions.

use std::fmt;

use chrono::NaiveDate;

use crate::types::{Flag, MessageSet, UidSet};

/// A set of messages addressed by sequence number or by UID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceSet {
    /// Message sequence numbers.
    Messages(MessageSet),
    /// UIDs; the command is sent with the `UID` prefix.
    Uids(UidSet),
}

impl SequenceSet {
    /// Returns true if the set holds UIDs.
    #[must_use]
    pub const fn is_uid(&self) -> bool {
        matches!(self, Self::Uids(_))
    }

    /// Returns true if the set addresses no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Messages(set) => set.is_empty(),
            Self::Uids(set) => set.is_empty(),
        }
    }
}

impl fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Messages(set) => fmt::Display::fmt(set, f),
            Self::Uids(set) => fmt::Display::fmt(set, f),
        }
    }
}

impl From<MessageSet> for SequenceSet {
    fn from(set: MessageSet) -> Self {
        Self::Messages(set)
    }
}

impl From<UidSet> for SequenceSet {
    fn from(set: UidSet) -> Self {
        Self::Uids(set)
    }
}

/// STATUS attributes to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAttribute {
    /// Number of messages.
    Messages,
    /// Number of recent messages.
    Recent,
    /// Next UID.
    UidNext,
    /// UIDVALIDITY.
    UidValidity,
    /// Number of unseen messages.
    Unseen,
}

impl StatusAttribute {
    /// Every attribute defined by RFC 3501.
    pub const ALL: [Self; 5] = [
        Self::Messages,
        Self::Recent,
        Self::UidNext,
        Self::UidValidity,
        Self::Unseen,
    ];

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "MESSAGES",
            Self::Recent => "RECENT",
            Self::UidNext => "UIDNEXT",
            Self::UidValidity => "UIDVALIDITY",
            Self::Unseen => "UNSEEN",
        }
    }
}

/// FETCH items to request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItems {
    /// FLAGS INTERNALDATE RFC822.SIZE ENVELOPE.
    All,
    /// FLAGS INTERNALDATE RFC822.SIZE ENVELOPE BODY.
    Full,
    /// FLAGS INTERNALDATE RFC822.SIZE.
    Fast,
    /// Custom list of items.
    Items(Vec<FetchAttribute>),
}

/// Individual FETCH attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// Message flags.
    Flags,
    /// Internal date.
    InternalDate,
    /// RFC822 size.
    Rfc822Size,
    /// Envelope structure.
    Envelope,
    /// Body structure with extension data.
    BodyStructure,
    /// Body structure without extension data.
    Body,
    /// UID.
    Uid,
    /// Body section.
    BodySection {
        /// Section specifier; `None` for the whole message.
        section: Option<String>,
        /// Peek (don't set \Seen).
        peek: bool,
        /// Partial fetch: origin octet and length.
        partial: Option<(u32, u32)>,
    },
    /// RFC822 (full message).
    Rfc822,
    /// RFC822.HEADER.
    Rfc822Header,
    /// RFC822.TEXT.
    Rfc822Text,
}

/// STORE action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// Replace flags.
    SetFlags(Vec<Flag>),
    /// Add flags.
    AddFlags(Vec<Flag>),
    /// Remove flags.
    RemoveFlags(Vec<Flag>),
}

impl StoreAction {
    pub(crate) const fn item(&self) -> &'static str {
        match self {
            Self::SetFlags(_) => "FLAGS",
            Self::AddFlags(_) => "+FLAGS",
            Self::RemoveFlags(_) => "-FLAGS",
        }
    }

    pub(crate) fn flags(&self) -> &[Flag] {
        match self {
            Self::SetFlags(f) | Self::AddFlags(f) | Self::RemoveFlags(f) => f,
        }
    }
}

/// SEARCH criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// All messages.
    All,
    /// Messages with \Answered flag.
    Answered,
    /// Messages with \Deleted flag.
    Deleted,
    /// Messages with \Draft flag.
    Draft,
    /// Messages with \Flagged flag.
    Flagged,
    /// Recent and unseen messages.
    New,
    /// Messages without \Deleted flag.
    Undeleted,
    /// Messages without \Seen flag.
    Unseen,
    /// Messages with \Seen flag.
    Seen,
    /// Messages with a keyword set.
    Keyword(String),
    /// Sequence number set.
    SequenceSet(MessageSet),
    /// UID set.
    UidSet(UidSet),
    /// Subject contains text.
    Subject(String),
    /// From contains text.
    From(String),
    /// To contains text.
    To(String),
    /// Body contains text.
    Body(String),
    /// Text in header or body.
    Text(String),
    /// Internal date on or after the day.
    Since(NaiveDate),
    /// Internal date before the day.
    Before(NaiveDate),
    /// Internal date on the day.
    On(NaiveDate),
    /// Larger than size.
    Larger(u32),
    /// Smaller than size.
    Smaller(u32),
    /// Header field contains value.
    Header(String, String),
    /// Pre-rendered criteria, sent verbatim.
    Raw(String),
    /// AND of criteria.
    And(Vec<Self>),
    /// OR of criteria.
    Or(Box<Self>, Box<Self>),
    /// NOT of criteria.
    Not(Box<Self>),
}
