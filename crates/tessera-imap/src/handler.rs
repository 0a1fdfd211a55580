//! Event sink for server data.
//!
//! Every untagged response and every response code is delivered to a
//! [`ResponseHandler`] while a command waits for its tagged completion. IMAP
//! servers may send data belonging to any exchange at any time (RFC 2683),
//! so the handler sees EXISTS, EXPUNGE and FETCH updates even when they were
//! not requested.
//!
//! # Example
//!
//! ```
//! use tessera_imap::handler::ResponseHandler;
//!
//! #[derive(Default)]
//! struct Counter {
//!     messages: u32,
//! }
//!
//! impl ResponseHandler for Counter {
//!     fn on_exists(&mut self, count: u32) {
//!         self.messages = count;
//!     }
//! }
//! ```

use crate::parser::{FetchItem, UntaggedResponse};
use crate::types::{
    AclEntry, Flags, ListEntry, ListRights, MailboxStatus, Namespaces, Quota, ResponseCode,
    Status, UidSet,
};

/// Receiver for server-originated data.
///
/// Every method has a no-op default, so implementors override only what
/// they need.
#[allow(unused_variables)]
pub trait ResponseHandler: Send {
    /// ALERT response code: text that must be shown to the user.
    fn on_alert(&mut self, text: &str) {}

    /// Informational OK text.
    fn on_ok(&mut self, text: &str) {}

    /// Untagged NO: a warning.
    fn on_no(&mut self, text: &str) {}

    /// Untagged BAD. The command in flight fails after this returns.
    fn on_bad(&mut self, text: &str) {}

    /// The server is closing the connection.
    fn on_bye(&mut self, text: &str) {}

    /// New capability list, from CAPABILITY data or a response code.
    fn on_capability(&mut self, capabilities: &[String]) {}

    /// Number of messages in the mailbox.
    fn on_exists(&mut self, count: u32) {}

    /// Number of recent messages.
    fn on_recent(&mut self, count: u32) {}

    /// A message was expunged; later sequence numbers shift down by one.
    fn on_expunge(&mut self, seq: u32) {}

    /// FETCH data for a message.
    fn on_fetch(&mut self, seq: u32, items: &[FetchItem]) {}

    /// Flags defined in the selected mailbox.
    fn on_flags(&mut self, flags: &Flags) {}

    /// Flags the client can change permanently.
    fn on_permanent_flags(&mut self, flags: &Flags) {}

    /// Sequence number of the first unseen message.
    fn on_first_unseen(&mut self, seq: u32) {}

    /// Number of unseen messages, from STATUS.
    fn on_unseen(&mut self, count: u32) {}

    /// UIDVALIDITY of a mailbox.
    fn on_uid_validity(&mut self, uid_validity: u64) {}

    /// Next UID to be assigned.
    fn on_uid_next(&mut self, uid_next: u64) {}

    /// The mailbox was selected read-only.
    fn on_read_only(&mut self) {}

    /// The mailbox was selected read-write.
    fn on_read_write(&mut self) {}

    /// The target mailbox does not exist but could be created.
    fn on_try_create(&mut self) {}

    /// LIST entry.
    fn on_list(&mut self, entry: &ListEntry) {}

    /// LSUB entry.
    fn on_lsub(&mut self, entry: &ListEntry) {}

    /// SEARCH results.
    fn on_search(&mut self, ids: &[u64]) {}

    /// Full STATUS data, delivered after the individual items.
    fn on_status(&mut self, status: &MailboxStatus) {}

    /// NAMESPACE data.
    fn on_namespace(&mut self, namespaces: &Namespaces) {}

    /// ACL of a mailbox.
    fn on_acl(&mut self, mailbox: &str, entries: &[AclEntry]) {}

    /// LISTRIGHTS data.
    fn on_list_rights(&mut self, rights: &ListRights) {}

    /// MYRIGHTS data.
    fn on_my_rights(&mut self, mailbox: &str, rights: &str) {}

    /// QUOTA data.
    fn on_quota(&mut self, quota: &Quota) {}

    /// QUOTAROOT data.
    fn on_quota_root(&mut self, mailbox: &str, roots: &[String]) {}

    /// APPENDUID response code.
    fn on_append_uid(&mut self, uid_validity: u64, uid: u64) {}

    /// COPYUID response code.
    fn on_copy_uid(&mut self, uid_validity: u64, source: &UidSet, destination: &UidSet) {}

    /// UIDNOTSTICKY response code.
    fn on_uid_not_sticky(&mut self) {}

    /// BADCHARSET response code with the charsets the server accepts.
    fn on_bad_charset(&mut self, charsets: &[String]) {}
}

impl<H: ResponseHandler + ?Sized> ResponseHandler for &mut H {
    fn on_alert(&mut self, text: &str) {
        (**self).on_alert(text);
    }
    fn on_ok(&mut self, text: &str) {
        (**self).on_ok(text);
    }
    fn on_no(&mut self, text: &str) {
        (**self).on_no(text);
    }
    fn on_bad(&mut self, text: &str) {
        (**self).on_bad(text);
    }
    fn on_bye(&mut self, text: &str) {
        (**self).on_bye(text);
    }
    fn on_capability(&mut self, capabilities: &[String]) {
        (**self).on_capability(capabilities);
    }
    fn on_exists(&mut self, count: u32) {
        (**self).on_exists(count);
    }
    fn on_recent(&mut self, count: u32) {
        (**self).on_recent(count);
    }
    fn on_expunge(&mut self, seq: u32) {
        (**self).on_expunge(seq);
    }
    fn on_fetch(&mut self, seq: u32, items: &[FetchItem]) {
        (**self).on_fetch(seq, items);
    }
    fn on_flags(&mut self, flags: &Flags) {
        (**self).on_flags(flags);
    }
    fn on_permanent_flags(&mut self, flags: &Flags) {
        (**self).on_permanent_flags(flags);
    }
    fn on_first_unseen(&mut self, seq: u32) {
        (**self).on_first_unseen(seq);
    }
    fn on_unseen(&mut self, count: u32) {
        (**self).on_unseen(count);
    }
    fn on_uid_validity(&mut self, uid_validity: u64) {
        (**self).on_uid_validity(uid_validity);
    }
    fn on_uid_next(&mut self, uid_next: u64) {
        (**self).on_uid_next(uid_next);
    }
    fn on_read_only(&mut self) {
        (**self).on_read_only();
    }
    fn on_read_write(&mut self) {
        (**self).on_read_write();
    }
    fn on_try_create(&mut self) {
        (**self).on_try_create();
    }
    fn on_list(&mut self, entry: &ListEntry) {
        (**self).on_list(entry);
    }
    fn on_lsub(&mut self, entry: &ListEntry) {
        (**self).on_lsub(entry);
    }
    fn on_search(&mut self, ids: &[u64]) {
        (**self).on_search(ids);
    }
    fn on_status(&mut self, status: &MailboxStatus) {
        (**self).on_status(status);
    }
    fn on_namespace(&mut self, namespaces: &Namespaces) {
        (**self).on_namespace(namespaces);
    }
    fn on_acl(&mut self, mailbox: &str, entries: &[AclEntry]) {
        (**self).on_acl(mailbox, entries);
    }
    fn on_list_rights(&mut self, rights: &ListRights) {
        (**self).on_list_rights(rights);
    }
    fn on_my_rights(&mut self, mailbox: &str, rights: &str) {
        (**self).on_my_rights(mailbox, rights);
    }
    fn on_quota(&mut self, quota: &Quota) {
        (**self).on_quota(quota);
    }
    fn on_quota_root(&mut self, mailbox: &str, roots: &[String]) {
        (**self).on_quota_root(mailbox, roots);
    }
    fn on_append_uid(&mut self, uid_validity: u64, uid: u64) {
        (**self).on_append_uid(uid_validity, uid);
    }
    fn on_copy_uid(&mut self, uid_validity: u64, source: &UidSet, destination: &UidSet) {
        (**self).on_copy_uid(uid_validity, source, destination);
    }
    fn on_uid_not_sticky(&mut self) {
        (**self).on_uid_not_sticky();
    }
    fn on_bad_charset(&mut self, charsets: &[String]) {
        (**self).on_bad_charset(charsets);
    }
}

/// Delivers a response code to the handler.
///
/// `text` is the response text that came with the code; ALERT passes it on.
pub fn dispatch_code<H: ResponseHandler + ?Sized>(handler: &mut H, code: &ResponseCode, text: &str) {
    match code {
        ResponseCode::Alert => handler.on_alert(text),
        ResponseCode::BadCharset(charsets) => handler.on_bad_charset(charsets),
        ResponseCode::Capability(caps) => handler.on_capability(caps),
        ResponseCode::PermanentFlags(flags) => handler.on_permanent_flags(flags),
        ResponseCode::ReadOnly => handler.on_read_only(),
        ResponseCode::ReadWrite => handler.on_read_write(),
        ResponseCode::TryCreate => handler.on_try_create(),
        ResponseCode::UidNext(n) => handler.on_uid_next(*n),
        ResponseCode::UidValidity(n) => handler.on_uid_validity(*n),
        ResponseCode::Unseen(n) => handler.on_first_unseen(*n),
        ResponseCode::AppendUid { uid_validity, uid } => handler.on_append_uid(*uid_validity, *uid),
        ResponseCode::CopyUid {
            uid_validity,
            source,
            destination,
        } => handler.on_copy_uid(*uid_validity, source, destination),
        ResponseCode::UidNotSticky => handler.on_uid_not_sticky(),
        ResponseCode::Parse => tracing::debug!(text, "Server could not parse a message"),
        ResponseCode::Unknown(raw) => tracing::warn!(code = %raw, "Unrecognized response code"),
    }
}

/// Delivers an untagged response to the handler.
///
/// STATUS items MESSAGES, RECENT, UIDNEXT, UIDVALIDITY and UNSEEN are also
/// forwarded to their individual methods before [`ResponseHandler::on_status`].
pub fn dispatch_untagged<H: ResponseHandler + ?Sized>(handler: &mut H, response: &UntaggedResponse) {
    match response {
        UntaggedResponse::Condition { status, code, text } => {
            if let Some(code) = code {
                dispatch_code(handler, code, text);
            }
            let alert = matches!(code, Some(ResponseCode::Alert));
            match status {
                Status::Ok | Status::PreAuth if !alert => handler.on_ok(text),
                Status::Ok | Status::PreAuth => {}
                Status::No => handler.on_no(text),
                Status::Bad => handler.on_bad(text),
                Status::Bye => handler.on_bye(text),
            }
        }
        UntaggedResponse::Capability(caps) => handler.on_capability(caps),
        UntaggedResponse::Flags(flags) => handler.on_flags(flags),
        UntaggedResponse::List(entry) => handler.on_list(entry),
        UntaggedResponse::Lsub(entry) => handler.on_lsub(entry),
        UntaggedResponse::Search(ids) => handler.on_search(ids),
        UntaggedResponse::Status(status) => {
            if let Some(n) = status.messages() {
                handler.on_exists(n);
            }
            if let Some(n) = status.recent() {
                handler.on_recent(n);
            }
            if let Some(n) = status.uid_next() {
                handler.on_uid_next(n);
            }
            if let Some(n) = status.uid_validity() {
                handler.on_uid_validity(n);
            }
            if let Some(n) = status.unseen() {
                handler.on_unseen(n);
            }
            handler.on_status(status);
        }
        UntaggedResponse::Namespace(namespaces) => handler.on_namespace(namespaces),
        UntaggedResponse::Acl { mailbox, entries } => handler.on_acl(mailbox, entries),
        UntaggedResponse::ListRights(rights) => handler.on_list_rights(rights),
        UntaggedResponse::MyRights { mailbox, rights } => handler.on_my_rights(mailbox, rights),
        UntaggedResponse::Quota(quota) => handler.on_quota(quota),
        UntaggedResponse::QuotaRoot { mailbox, roots } => handler.on_quota_root(mailbox, roots),
        UntaggedResponse::Exists(n) => handler.on_exists(*n),
        UntaggedResponse::Recent(n) => handler.on_recent(*n),
        UntaggedResponse::Expunge(n) => handler.on_expunge(*n),
        UntaggedResponse::Fetch { seq, items } => handler.on_fetch(*seq, items),
        UntaggedResponse::Unknown { keyword, text } => {
            tracing::warn!(%keyword, %text, "Unrecognized untagged response");
        }
    }
}

/// A handler that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl ResponseHandler for NoopHandler {}

/// A handler that logs every event using tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ResponseHandler for LoggingHandler {
    fn on_alert(&mut self, text: &str) {
        tracing::warn!(text, "ALERT");
    }

    fn on_ok(&mut self, text: &str) {
        tracing::trace!(text, "OK");
    }

    fn on_no(&mut self, text: &str) {
        tracing::warn!(text, "NO");
    }

    fn on_bad(&mut self, text: &str) {
        tracing::error!(text, "BAD");
    }

    fn on_bye(&mut self, text: &str) {
        tracing::info!(text, "BYE");
    }

    fn on_capability(&mut self, capabilities: &[String]) {
        tracing::debug!(?capabilities, "CAPABILITY");
    }

    fn on_exists(&mut self, count: u32) {
        tracing::debug!(count, "EXISTS");
    }

    fn on_recent(&mut self, count: u32) {
        tracing::debug!(count, "RECENT");
    }

    fn on_expunge(&mut self, seq: u32) {
        tracing::debug!(seq, "EXPUNGE");
    }

    fn on_fetch(&mut self, seq: u32, items: &[FetchItem]) {
        tracing::debug!(seq, ?items, "FETCH");
    }

    fn on_flags(&mut self, flags: &Flags) {
        tracing::debug!(%flags, "FLAGS");
    }

    fn on_permanent_flags(&mut self, flags: &Flags) {
        tracing::debug!(%flags, "PERMANENTFLAGS");
    }

    fn on_first_unseen(&mut self, seq: u32) {
        tracing::debug!(seq, "first UNSEEN");
    }

    fn on_unseen(&mut self, count: u32) {
        tracing::debug!(count, "UNSEEN");
    }

    fn on_uid_validity(&mut self, uid_validity: u64) {
        tracing::debug!(uid_validity, "UIDVALIDITY");
    }

    fn on_uid_next(&mut self, uid_next: u64) {
        tracing::debug!(uid_next, "UIDNEXT");
    }

    fn on_read_only(&mut self) {
        tracing::debug!("READ-ONLY");
    }

    fn on_read_write(&mut self) {
        tracing::debug!("READ-WRITE");
    }

    fn on_try_create(&mut self) {
        tracing::debug!("TRYCREATE");
    }

    fn on_list(&mut self, entry: &ListEntry) {
        tracing::debug!(name = %entry.name, attributes = ?entry.attributes, "LIST");
    }

    fn on_lsub(&mut self, entry: &ListEntry) {
        tracing::debug!(name = %entry.name, attributes = ?entry.attributes, "LSUB");
    }

    fn on_search(&mut self, ids: &[u64]) {
        tracing::debug!(count = ids.len(), "SEARCH");
    }

    fn on_status(&mut self, status: &MailboxStatus) {
        tracing::debug!(mailbox = %status.mailbox, items = ?status.items, "STATUS");
    }

    fn on_namespace(&mut self, namespaces: &Namespaces) {
        tracing::debug!(?namespaces, "NAMESPACE");
    }

    fn on_acl(&mut self, mailbox: &str, entries: &[AclEntry]) {
        tracing::debug!(mailbox, ?entries, "ACL");
    }

    fn on_list_rights(&mut self, rights: &ListRights) {
        tracing::debug!(?rights, "LISTRIGHTS");
    }

    fn on_my_rights(&mut self, mailbox: &str, rights: &str) {
        tracing::debug!(mailbox, rights, "MYRIGHTS");
    }

    fn on_quota(&mut self, quota: &Quota) {
        tracing::debug!(root = %quota.root, resources = ?quota.resources, "QUOTA");
    }

    fn on_quota_root(&mut self, mailbox: &str, roots: &[String]) {
        tracing::debug!(mailbox, ?roots, "QUOTAROOT");
    }

    fn on_append_uid(&mut self, uid_validity: u64, uid: u64) {
        tracing::debug!(uid_validity, uid, "APPENDUID");
    }

    fn on_copy_uid(&mut self, uid_validity: u64, source: &UidSet, destination: &UidSet) {
        tracing::debug!(uid_validity, %source, %destination, "COPYUID");
    }

    fn on_uid_not_sticky(&mut self) {
        tracing::debug!("UIDNOTSTICKY");
    }

    fn on_bad_charset(&mut self, charsets: &[String]) {
        tracing::debug!(?charsets, "BADCHARSET");
    }
}

/// An event recorded by [`CollectingHandler`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// ALERT text.
    Alert(String),
    /// OK text.
    Ok(String),
    /// Untagged NO text.
    No(String),
    /// Untagged BAD text.
    Bad(String),
    /// BYE text.
    Bye(String),
    /// Capability list.
    Capability(Vec<String>),
    /// EXISTS.
    Exists(u32),
    /// RECENT.
    Recent(u32),
    /// EXPUNGE.
    Expunge(u32),
    /// FETCH.
    Fetch(u32, Vec<FetchItem>),
    /// FLAGS.
    Flags(Flags),
    /// PERMANENTFLAGS.
    PermanentFlags(Flags),
    /// First unseen message.
    FirstUnseen(u32),
    /// STATUS UNSEEN count.
    Unseen(u32),
    /// UIDVALIDITY.
    UidValidity(u64),
    /// UIDNEXT.
    UidNext(u64),
    /// READ-ONLY.
    ReadOnly,
    /// READ-WRITE.
    ReadWrite,
    /// TRYCREATE.
    TryCreate,
    /// LIST entry.
    List(ListEntry),
    /// LSUB entry.
    Lsub(ListEntry),
    /// SEARCH results.
    Search(Vec<u64>),
    /// STATUS data.
    Status(MailboxStatus),
    /// NAMESPACE data.
    Namespace(Namespaces),
    /// ACL data.
    Acl(String, Vec<AclEntry>),
    /// LISTRIGHTS data.
    ListRights(ListRights),
    /// MYRIGHTS data.
    MyRights(String, String),
    /// QUOTA data.
    Quota(Quota),
    /// QUOTAROOT data.
    QuotaRoot(String, Vec<String>),
    /// APPENDUID.
    AppendUid(u64, u64),
    /// COPYUID.
    CopyUid(u64, UidSet, UidSet),
    /// UIDNOTSTICKY.
    UidNotSticky,
    /// BADCHARSET.
    BadCharset(Vec<String>),
}

/// A handler that records events in arrival order.
///
/// Useful for testing or batch processing of events.
#[derive(Debug, Default, Clone)]
pub struct CollectingHandler {
    /// Collected events.
    pub events: Vec<Event>,
}

impl CollectingHandler {
    /// Creates a new collecting handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all collected events.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Takes all collected events, leaving the handler empty.
    pub fn take(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

impl ResponseHandler for CollectingHandler {
    fn on_alert(&mut self, text: &str) {
        self.events.push(Event::Alert(text.to_string()));
    }
    fn on_ok(&mut self, text: &str) {
        self.events.push(Event::Ok(text.to_string()));
    }
    fn on_no(&mut self, text: &str) {
        self.events.push(Event::No(text.to_string()));
    }
    fn on_bad(&mut self, text: &str) {
        self.events.push(Event::Bad(text.to_string()));
    }
    fn on_bye(&mut self, text: &str) {
        self.events.push(Event::Bye(text.to_string()));
    }
    fn on_capability(&mut self, capabilities: &[String]) {
        self.events.push(Event::Capability(capabilities.to_vec()));
    }
    fn on_exists(&mut self, count: u32) {
        self.events.push(Event::Exists(count));
    }
    fn on_recent(&mut self, count: u32) {
        self.events.push(Event::Recent(count));
    }
    fn on_expunge(&mut self, seq: u32) {
        self.events.push(Event::Expunge(seq));
    }
    fn on_fetch(&mut self, seq: u32, items: &[FetchItem]) {
        self.events.push(Event::Fetch(seq, items.to_vec()));
    }
    fn on_flags(&mut self, flags: &Flags) {
        self.events.push(Event::Flags(flags.clone()));
    }
    fn on_permanent_flags(&mut self, flags: &Flags) {
        self.events.push(Event::PermanentFlags(flags.clone()));
    }
    fn on_first_unseen(&mut self, seq: u32) {
        self.events.push(Event::FirstUnseen(seq));
    }
    fn on_unseen(&mut self, count: u32) {
        self.events.push(Event::Unseen(count));
    }
    fn on_uid_validity(&mut self, uid_validity: u64) {
        self.events.push(Event::UidValidity(uid_validity));
    }
    fn on_uid_next(&mut self, uid_next: u64) {
        self.events.push(Event::UidNext(uid_next));
    }
    fn on_read_only(&mut self) {
        self.events.push(Event::ReadOnly);
    }
    fn on_read_write(&mut self) {
        self.events.push(Event::ReadWrite);
    }
    fn on_try_create(&mut self) {
        self.events.push(Event::TryCreate);
    }
    fn on_list(&mut self, entry: &ListEntry) {
        self.events.push(Event::List(entry.clone()));
    }
    fn on_lsub(&mut self, entry: &ListEntry) {
        self.events.push(Event::Lsub(entry.clone()));
    }
    fn on_search(&mut self, ids: &[u64]) {
        self.events.push(Event::Search(ids.to_vec()));
    }
    fn on_status(&mut self, status: &MailboxStatus) {
        self.events.push(Event::Status(status.clone()));
    }
    fn on_namespace(&mut self, namespaces: &Namespaces) {
        self.events.push(Event::Namespace(namespaces.clone()));
    }
    fn on_acl(&mut self, mailbox: &str, entries: &[AclEntry]) {
        self.events
            .push(Event::Acl(mailbox.to_string(), entries.to_vec()));
    }
    fn on_list_rights(&mut self, rights: &ListRights) {
        self.events.push(Event::ListRights(rights.clone()));
    }
    fn on_my_rights(&mut self, mailbox: &str, rights: &str) {
        self.events
            .push(Event::MyRights(mailbox.to_string(), rights.to_string()));
    }
    fn on_quota(&mut self, quota: &Quota) {
        self.events.push(Event::Quota(quota.clone()));
    }
    fn on_quota_root(&mut self, mailbox: &str, roots: &[String]) {
        self.events
            .push(Event::QuotaRoot(mailbox.to_string(), roots.to_vec()));
    }
    fn on_append_uid(&mut self, uid_validity: u64, uid: u64) {
        self.events.push(Event::AppendUid(uid_validity, uid));
    }
    fn on_copy_uid(&mut self, uid_validity: u64, source: &UidSet, destination: &UidSet) {
        self.events.push(Event::CopyUid(
            uid_validity,
            source.clone(),
            destination.clone(),
        ));
    }
    fn on_uid_not_sticky(&mut self) {
        self.events.push(Event::UidNotSticky);
    }
    fn on_bad_charset(&mut self, charsets: &[String]) {
        self.events.push(Event::BadCharset(charsets.to_vec()));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::{Response, ResponseParser};

    fn dispatch(handler: &mut CollectingHandler, line: &[u8]) {
        match ResponseParser::parse(line).unwrap() {
            Response::Untagged(response) => dispatch_untagged(handler, &response),
            Response::Tagged { code, text, .. } => {
                if let Some(code) = code {
                    dispatch_code(handler, &code, &text);
                }
            }
            Response::Continuation { .. } => {}
        }
    }

    #[test]
    fn test_noop_handler() {
        let mut handler = NoopHandler;
        handler.on_exists(100);
        handler.on_expunge(1);
        handler.on_bye("goodbye");
        handler.on_alert("important!");
    }

    #[test]
    fn test_select_responses() {
        let mut handler = CollectingHandler::new();
        dispatch(&mut handler, b"* 172 EXISTS\r\n");
        dispatch(&mut handler, b"* 1 RECENT\r\n");
        dispatch(&mut handler, b"* OK [UNSEEN 12] Message 12 is first unseen\r\n");
        dispatch(&mut handler, b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n");
        dispatch(&mut handler, b"* FLAGS (\\Answered \\Seen)\r\n");
        dispatch(&mut handler, b"A142 OK [READ-WRITE] SELECT completed\r\n");

        let events = handler.take();
        assert_eq!(events[0], Event::Exists(172));
        assert_eq!(events[1], Event::Recent(1));
        assert_eq!(events[2], Event::FirstUnseen(12));
        assert_eq!(events[3], Event::Ok("Message 12 is first unseen".to_string()));
        assert_eq!(events[4], Event::UidValidity(3_857_529_045));
        assert!(matches!(events[6], Event::Flags(ref f) if f.len() == 2));
        assert_eq!(events[7], Event::ReadWrite);
        assert!(handler.events.is_empty());
    }

    #[test]
    fn test_alert_replaces_ok() {
        let mut handler = CollectingHandler::new();
        dispatch(&mut handler, b"* OK [ALERT] System shutdown in 10 minutes\r\n");
        assert_eq!(
            handler.events,
            vec![Event::Alert("System shutdown in 10 minutes".to_string())]
        );
    }

    #[test]
    fn test_status_forwards_items() {
        let mut handler = CollectingHandler::new();
        dispatch(
            &mut handler,
            b"* STATUS INBOX (MESSAGES 3 UIDNEXT 9 UNSEEN 1)\r\n",
        );
        assert_eq!(handler.events[0], Event::Exists(3));
        assert_eq!(handler.events[1], Event::UidNext(9));
        assert_eq!(handler.events[2], Event::Unseen(1));
        assert!(matches!(handler.events[3], Event::Status(ref s) if s.mailbox == "INBOX"));
    }

    #[test]
    fn test_uidplus_codes() {
        let mut handler = CollectingHandler::new();
        dispatch(&mut handler, b"A1 OK [APPENDUID 38505 3955] done\r\n");
        dispatch(&mut handler, b"A2 OK [UIDNOTSTICKY] done\r\n");
        assert_eq!(
            handler.events,
            vec![Event::AppendUid(38505, 3955), Event::UidNotSticky]
        );
    }

    #[test]
    fn test_forwarding_through_mut_reference() {
        fn feed<H: ResponseHandler>(mut handler: H) {
            handler.on_quota_root("INBOX", &[String::new()]);
            handler.on_try_create();
        }

        let mut inner = CollectingHandler::new();
        feed(&mut inner);
        assert_eq!(
            inner.events,
            vec![
                Event::QuotaRoot("INBOX".to_string(), vec![String::new()]),
                Event::TryCreate
            ]
        );
        inner.clear();
        assert!(inner.events.is_empty());
    }
}
