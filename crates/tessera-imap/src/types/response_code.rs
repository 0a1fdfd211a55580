//! Response codes carried in `[...]` brackets of status responses.

use super::{Flags, UidSet};

/// Response code from a tagged or untagged status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: text that must be shown to the user.
    Alert,
    /// BADCHARSET: the search charset is unsupported; lists acceptable ones.
    BadCharset(Vec<String>),
    /// CAPABILITY: replaces the cached capability list.
    Capability(Vec<String>),
    /// PARSE: the server failed to parse a message.
    Parse,
    /// PERMANENTFLAGS: flags that can be changed permanently.
    PermanentFlags(Flags),
    /// READ-ONLY: mailbox selected read-only.
    ReadOnly,
    /// READ-WRITE: mailbox selected read-write.
    ReadWrite,
    /// TRYCREATE: target mailbox does not exist but can be created.
    TryCreate,
    /// UIDNEXT: next UID to be assigned.
    UidNext(u64),
    /// UIDVALIDITY: unique identifier validity value.
    UidValidity(u64),
    /// UNSEEN: sequence number of the first unseen message.
    Unseen(u32),
    /// APPENDUID (RFC 4315).
    AppendUid {
        /// UIDVALIDITY of the destination mailbox.
        uid_validity: u64,
        /// UID assigned to the appended message.
        uid: u64,
    },
    /// COPYUID (RFC 4315).
    CopyUid {
        /// UIDVALIDITY of the destination mailbox.
        uid_validity: u64,
        /// UIDs of the source messages.
        source: UidSet,
        /// UIDs assigned in the destination mailbox.
        destination: UidSet,
    },
    /// UIDNOTSTICKY (RFC 4315): the mailbox does not keep UIDs across sessions.
    UidNotSticky,
    /// Any other code, with its atom and raw arguments.
    Unknown(String),
}
