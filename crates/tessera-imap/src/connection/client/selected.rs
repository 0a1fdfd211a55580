//! Commands for the selected state.

use super::{Client, SessionState};
use crate::Result;
use crate::command::{Command, FetchItems, SearchCriteria, SequenceSet, StoreAction};
use crate::handler::ResponseHandler;
use crate::types::{MessageSet, SetError, UidSet};

impl<H: ResponseHandler> Client<H> {
    /// Requests a checkpoint of the selected mailbox.
    pub async fn check(&mut self) -> Result<bool> {
        self.command_ok(&Command::Check).await
    }

    /// Closes the selected mailbox, expunging deleted messages silently.
    pub async fn close(&mut self) -> Result<bool> {
        let ok = self.run(&Command::Close).await?.is_ok();
        if ok {
            self.set_state(SessionState::Authenticated);
        }
        Ok(ok)
    }

    /// Permanently removes messages flagged `\Deleted`.
    pub async fn expunge(&mut self) -> Result<bool> {
        self.command_ok(&Command::Expunge).await
    }

    /// Expunges only the given UIDs (RFC 4315 UIDPLUS).
    pub async fn uid_expunge(&mut self, uids: &UidSet) -> Result<bool> {
        self.command_ok(&Command::UidExpunge { uids: uids.clone() })
            .await
    }

    /// Expunges the UIDs `start:end`.
    ///
    /// Fails with [`crate::Error::InvalidState`] if `start` is zero.
    pub async fn uid_expunge_range(&mut self, start: u64, end: u64) -> Result<bool> {
        let uids = UidSet::range(start, end).map_err(invalid_set)?;
        self.uid_expunge(&uids).await
    }

    /// Searches the selected mailbox; matches arrive as sequence numbers.
    pub async fn search(
        &mut self,
        charset: Option<&str>,
        criteria: &SearchCriteria,
    ) -> Result<bool> {
        self.search_inner(charset, criteria, false).await
    }

    /// Searches the selected mailbox; matches arrive as UIDs.
    pub async fn uid_search(
        &mut self,
        charset: Option<&str>,
        criteria: &SearchCriteria,
    ) -> Result<bool> {
        self.search_inner(charset, criteria, true).await
    }

    async fn search_inner(
        &mut self,
        charset: Option<&str>,
        criteria: &SearchCriteria,
        uid: bool,
    ) -> Result<bool> {
        self.command_ok(&Command::Search {
            charset: charset.map(str::to_string),
            criteria: criteria.clone(),
            uid,
        })
        .await
    }

    /// Fetches message data by sequence number; `None` fetches `1:*`.
    pub async fn fetch(&mut self, set: Option<&MessageSet>, items: &FetchItems) -> Result<bool> {
        let set = set.cloned().unwrap_or_else(MessageSet::all);
        self.fetch_inner(set.into(), items).await
    }

    /// Fetches message data by UID; `None` fetches `1:*`.
    pub async fn uid_fetch(&mut self, set: Option<&UidSet>, items: &FetchItems) -> Result<bool> {
        let set = set.cloned().unwrap_or_else(UidSet::all);
        self.fetch_inner(set.into(), items).await
    }

    async fn fetch_inner(&mut self, set: SequenceSet, items: &FetchItems) -> Result<bool> {
        self.command_ok(&Command::Fetch {
            set,
            items: items.clone(),
        })
        .await
    }

    /// Alters flags by sequence number.
    ///
    /// Unless `silent`, the server answers with FETCH responses carrying the
    /// new flags.
    pub async fn store(
        &mut self,
        set: &MessageSet,
        action: &StoreAction,
        silent: bool,
    ) -> Result<bool> {
        self.store_inner(set.clone().into(), action, silent).await
    }

    /// Alters flags by UID.
    pub async fn uid_store(
        &mut self,
        set: &UidSet,
        action: &StoreAction,
        silent: bool,
    ) -> Result<bool> {
        self.store_inner(set.clone().into(), action, silent).await
    }

    async fn store_inner(
        &mut self,
        set: SequenceSet,
        action: &StoreAction,
        silent: bool,
    ) -> Result<bool> {
        self.command_ok(&Command::Store {
            set,
            action: action.clone(),
            silent,
        })
        .await
    }

    /// Copies messages by sequence number. An empty set succeeds without
    /// contacting the server.
    pub async fn copy(&mut self, set: &MessageSet, mailbox: &str) -> Result<bool> {
        self.copy_inner(set.clone().into(), mailbox).await
    }

    /// Copies messages by UID; COPYUID data arrives through the handler.
    pub async fn uid_copy(&mut self, set: &UidSet, mailbox: &str) -> Result<bool> {
        self.copy_inner(set.clone().into(), mailbox).await
    }

    async fn copy_inner(&mut self, set: SequenceSet, mailbox: &str) -> Result<bool> {
        if set.is_empty() {
            return Ok(true);
        }
        self.command_ok(&Command::Copy {
            set,
            mailbox: mailbox.to_string(),
        })
        .await
    }
}

fn invalid_set(err: SetError) -> crate::Error {
    crate::Error::InvalidState(format!("invalid UID range: {err}"))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::super::tests::{client_over, data_events};
    use super::*;
    use crate::command::FetchAttribute;
    use crate::handler::Event;
    use crate::parser::FetchItem;
    use crate::types::{Flag, Flags};
    use tokio_test::io::Builder;

    const GREETING: &[u8] = b"* PREAUTH ready\r\n";

    #[tokio::test]
    async fn test_fetch_defaults_to_all_messages() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 FETCH 1:* (FLAGS UID)\r\n")
            .read(b"* 1 FETCH (FLAGS (\\Seen) UID 101)\r\n")
            .read(b"* 2 FETCH (FLAGS () UID 102)\r\n")
            .read(b"A0001 OK FETCH completed\r\n")
            .build();
        let mut client = client_over(mock);

        let items = FetchItems::Items(vec![FetchAttribute::Flags, FetchAttribute::Uid]);
        assert!(client.fetch(None, &items).await.unwrap());

        let mut seen = Flags::new();
        seen.insert(Flag::Seen);
        assert_eq!(
            data_events(&mut client),
            vec![
                Event::Fetch(1, vec![FetchItem::Flags(seen), FetchItem::Uid(101)]),
                Event::Fetch(2, vec![FetchItem::Flags(Flags::new()), FetchItem::Uid(102)]),
            ]
        );
    }

    #[tokio::test]
    async fn test_uid_fetch_body_literal() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 UID FETCH 7 BODY.PEEK[]\r\n")
            .read(b"* 3 FETCH (UID 7 BODY[] {11}\r\n")
            .read(b"Hello world)\r\n")
            .read(b"A0001 OK\r\n")
            .build();
        let mut client = client_over(mock);

        let set = UidSet::single(7).unwrap();
        let items = FetchItems::Items(vec![FetchAttribute::BodySection {
            section: None,
            peek: true,
            partial: None,
        }]);
        assert!(client.uid_fetch(Some(&set), &items).await.unwrap());

        match data_events(&mut client).as_slice() {
            [Event::Fetch(3, items)] => match items.as_slice() {
                [
                    FetchItem::Uid(7),
                    FetchItem::Body {
                        section,
                        origin: None,
                        data: Some(data),
                    },
                ] => {
                    assert_eq!(section, "");
                    assert_eq!(data.as_bytes().unwrap(), b"Hello world");
                }
                other => panic!("unexpected items: {other:?}"),
            },
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_store_silent_and_uid_store() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 STORE 1:3 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0001 OK\r\n")
            .write(b"A0002 UID STORE 42 -FLAGS (\\Seen)\r\n")
            .read(b"* 5 FETCH (FLAGS () UID 42)\r\nA0002 OK\r\n")
            .build();
        let mut client = client_over(mock);

        let set = MessageSet::range(1, 3).unwrap();
        assert!(
            client
                .store(&set, &StoreAction::AddFlags(vec![Flag::Deleted]), true)
                .await
                .unwrap()
        );
        let uids = UidSet::single(42).unwrap();
        assert!(
            client
                .uid_store(&uids, &StoreAction::RemoveFlags(vec![Flag::Seen]), false)
                .await
                .unwrap()
        );
        assert_eq!(data_events(&mut client).len(), 1);
    }

    #[tokio::test]
    async fn test_unsafe_keyword_is_not_sent() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0002 NOOP\r\n")
            .read(b"A0002 OK\r\n")
            .build();
        let mut client = client_over(mock);

        let set = MessageSet::single(1).unwrap();
        let action = StoreAction::AddFlags(vec![Flag::Keyword("x\r\nA9 DELETE INBOX".to_string())]);
        let err = client.store(&set, &action, false).await.unwrap_err();
        assert!(matches!(err, crate::Error::InvalidCommand(_)));
        assert!(!client.is_poisoned());
        assert!(client.noop().await.unwrap());
    }

    #[tokio::test]
    async fn test_copy_empty_set_is_noop() {
        let mock = Builder::new().build();
        let mut client = client_over(mock);

        assert!(client.copy(&MessageSet::new(), "Archive").await.unwrap());
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_uid_copy_reports_copyuid() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 UID COPY 1:3 Archive\r\n")
            .read(b"A0001 OK [COPYUID 38505 1:3 101:103] done\r\n")
            .build();
        let mut client = client_over(mock);

        let set = UidSet::range(1, 3).unwrap();
        assert!(client.uid_copy(&set, "Archive").await.unwrap());
        assert_eq!(
            data_events(&mut client),
            vec![Event::CopyUid(
                38505,
                UidSet::range(1, 3).unwrap(),
                UidSet::range(101, 103).unwrap()
            )]
        );
    }

    #[tokio::test]
    async fn test_search_with_charset() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 UID SEARCH CHARSET UTF-8 SUBJECT {8}\r\n")
            .read(b"+ go ahead\r\n")
            .write("réunion\r\n".as_bytes())
            .read(b"* SEARCH 4 9 12\r\nA0001 OK\r\n")
            .build();
        let mut client = client_over(mock);

        let criteria = SearchCriteria::Subject("réunion".to_string());
        assert!(client.uid_search(Some("UTF-8"), &criteria).await.unwrap());
        assert_eq!(data_events(&mut client), vec![Event::Search(vec![4, 9, 12])]);
    }

    #[tokio::test]
    async fn test_search_bad_charset_is_refusal() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 SEARCH CHARSET KOI8-R ALL\r\n")
            .read(b"A0001 NO [BADCHARSET (UTF-8 US-ASCII)] unsupported charset\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(
            !client
                .search(Some("KOI8-R"), &SearchCriteria::All)
                .await
                .unwrap()
        );
        assert_eq!(
            data_events(&mut client),
            vec![Event::BadCharset(vec![
                "UTF-8".to_string(),
                "US-ASCII".to_string()
            ])]
        );
    }

    #[tokio::test]
    async fn test_uid_expunge_range_and_close() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"A0001 OK\r\n")
            .write(b"A0002 UID EXPUNGE 3000:3002\r\n")
            .read(b"* 3 EXPUNGE\r\n* 3 EXPUNGE\r\n* 3 EXPUNGE\r\nA0002 OK\r\n")
            .write(b"A0003 CLOSE\r\n")
            .read(b"A0003 OK\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(client.select("INBOX").await.unwrap());
        assert!(client.uid_expunge_range(3000, 3002).await.unwrap());
        assert!(client.close().await.unwrap());
        assert_eq!(client.state(), SessionState::Authenticated);
        assert_eq!(
            data_events(&mut client),
            vec![Event::Expunge(3), Event::Expunge(3), Event::Expunge(3)]
        );
    }

    #[tokio::test]
    async fn test_uid_expunge_range_rejects_zero() {
        let mock = Builder::new().build();
        let mut client = client_over(mock);
        assert!(client.uid_expunge_range(0, 5).await.is_err());
    }
}
