//! Core IMAP types.

mod flags;
mod mailbox;
mod response_code;
mod sequence;
mod status;
pub mod utf7;

pub use flags::{Flag, Flags};
pub use mailbox::{
    AclEntry, ListEntry, ListRights, MailboxStatus, NamespaceEntry, Namespaces, Quota,
    QuotaResource,
};
pub use response_code::ResponseCode;
pub use sequence::{Iter, MessageSet, NumberSet, SetError, SetNumber, UidSet};
pub use status::Status;
