//! Commands for the authenticated state: mailboxes, ACL and QUOTA.

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};

use super::{Client, SessionState};
use crate::Result;
use crate::command::{Command, StatusAttribute};
use crate::handler::ResponseHandler;
use crate::types::Flag;

impl<H: ResponseHandler> Client<H> {
    /// Selects a mailbox for read-write access.
    ///
    /// Mailbox data (EXISTS, RECENT, FLAGS, UIDVALIDITY, ...) arrives through
    /// the handler.
    pub async fn select(&mut self, mailbox: &str) -> Result<bool> {
        let command = Command::Select {
            mailbox: mailbox.to_string(),
        };
        self.open_mailbox(&command).await
    }

    /// Selects a mailbox read-only.
    pub async fn examine(&mut self, mailbox: &str) -> Result<bool> {
        let command = Command::Examine {
            mailbox: mailbox.to_string(),
        };
        self.open_mailbox(&command).await
    }

    async fn open_mailbox(&mut self, command: &Command) -> Result<bool> {
        let ok = self.run(command).await?.is_ok();
        // A failed SELECT still deselects the previous mailbox.
        self.set_state(if ok {
            SessionState::Selected
        } else {
            SessionState::Authenticated
        });
        Ok(ok)
    }

    /// Creates a mailbox.
    pub async fn create(&mut self, mailbox: &str) -> Result<bool> {
        self.command_ok(&Command::Create {
            mailbox: mailbox.to_string(),
        })
        .await
    }

    /// Deletes a mailbox.
    pub async fn delete(&mut self, mailbox: &str) -> Result<bool> {
        self.command_ok(&Command::Delete {
            mailbox: mailbox.to_string(),
        })
        .await
    }

    /// Renames a mailbox.
    pub async fn rename(&mut self, from: &str, to: &str) -> Result<bool> {
        self.command_ok(&Command::Rename {
            from: from.to_string(),
            to: to.to_string(),
        })
        .await
    }

    /// Adds a mailbox to the subscription list.
    pub async fn subscribe(&mut self, mailbox: &str) -> Result<bool> {
        self.command_ok(&Command::Subscribe {
            mailbox: mailbox.to_string(),
        })
        .await
    }

    /// Removes a mailbox from the subscription list.
    pub async fn unsubscribe(&mut self, mailbox: &str) -> Result<bool> {
        self.command_ok(&Command::Unsubscribe {
            mailbox: mailbox.to_string(),
        })
        .await
    }

    /// Lists mailboxes matching `pattern` under `reference`.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<bool> {
        self.command_ok(&Command::List {
            reference: reference.to_string(),
            pattern: pattern.to_string(),
        })
        .await
    }

    /// Lists subscribed mailboxes.
    pub async fn lsub(&mut self, reference: &str, pattern: &str) -> Result<bool> {
        self.command_ok(&Command::Lsub {
            reference: reference.to_string(),
            pattern: pattern.to_string(),
        })
        .await
    }

    /// Requests status items for a mailbox without selecting it.
    pub async fn status(&mut self, mailbox: &str, items: &[StatusAttribute]) -> Result<bool> {
        self.command_ok(&Command::Status {
            mailbox: mailbox.to_string(),
            items: items.to_vec(),
        })
        .await
    }

    /// Appends a message to a mailbox.
    ///
    /// An empty message is refused with `Ok(false)` without contacting the
    /// server.
    pub async fn append(
        &mut self,
        mailbox: &str,
        flags: &[Flag],
        date: Option<DateTime<FixedOffset>>,
        message: impl Into<Bytes>,
    ) -> Result<bool> {
        let message = message.into();
        if message.is_empty() {
            tracing::debug!(mailbox, "Refusing to append an empty message");
            return Ok(false);
        }
        self.command_ok(&Command::Append {
            mailbox: mailbox.to_string(),
            flags: flags.to_vec(),
            date,
            message,
        })
        .await
    }

    /// Requests the server's namespaces (RFC 2342).
    pub async fn namespace(&mut self) -> Result<bool> {
        self.command_ok(&Command::Namespace).await
    }

    /// Sets access rights for an identifier (RFC 4314).
    pub async fn setacl(&mut self, mailbox: &str, identifier: &str, rights: &str) -> Result<bool> {
        self.command_ok(&Command::SetAcl {
            mailbox: mailbox.to_string(),
            identifier: identifier.to_string(),
            rights: rights.to_string(),
        })
        .await
    }

    /// Removes all rights of an identifier.
    pub async fn deleteacl(&mut self, mailbox: &str, identifier: &str) -> Result<bool> {
        self.command_ok(&Command::DeleteAcl {
            mailbox: mailbox.to_string(),
            identifier: identifier.to_string(),
        })
        .await
    }

    /// Requests the access control list of a mailbox.
    pub async fn getacl(&mut self, mailbox: &str) -> Result<bool> {
        self.command_ok(&Command::GetAcl {
            mailbox: mailbox.to_string(),
        })
        .await
    }

    /// Requests the rights that may be granted to an identifier.
    pub async fn listrights(&mut self, mailbox: &str, identifier: &str) -> Result<bool> {
        self.command_ok(&Command::ListRights {
            mailbox: mailbox.to_string(),
            identifier: identifier.to_string(),
        })
        .await
    }

    /// Requests the current user's rights on a mailbox.
    pub async fn myrights(&mut self, mailbox: &str) -> Result<bool> {
        self.command_ok(&Command::MyRights {
            mailbox: mailbox.to_string(),
        })
        .await
    }

    /// Sets resource limits on a quota root (RFC 2087).
    pub async fn setquota(&mut self, root: &str, limits: &[(&str, u64)]) -> Result<bool> {
        self.command_ok(&Command::SetQuota {
            root: root.to_string(),
            limits: limits
                .iter()
                .map(|(name, limit)| ((*name).to_string(), *limit))
                .collect(),
        })
        .await
    }

    /// Requests usage and limits of a quota root.
    pub async fn getquota(&mut self, root: &str) -> Result<bool> {
        self.command_ok(&Command::GetQuota {
            root: root.to_string(),
        })
        .await
    }

    /// Requests the quota roots of a mailbox and their quotas.
    pub async fn getquotaroot(&mut self, mailbox: &str) -> Result<bool> {
        self.command_ok(&Command::GetQuotaRoot {
            mailbox: mailbox.to_string(),
        })
        .await
    }
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
    use crate::handler::Event;
    use crate::types::{AclEntry, Quota, QuotaResource};
    use tokio_test::io::Builder;

    const GREETING: &[u8] = b"* PREAUTH ready\r\n";

    #[tokio::test]
    async fn test_select_reports_mailbox_data() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 172 EXISTS\r\n* 1 RECENT\r\n")
            .read(b"* OK [UNSEEN 12] first unseen\r\n")
            .read(b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n")
            .read(b"* OK [UIDNEXT 4392] predicted next UID\r\n")
            .read(b"A0001 OK [READ-WRITE] SELECT completed\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(client.select("INBOX").await.unwrap());
        assert_eq!(client.state(), SessionState::Selected);

        let events = client.handler_mut().take();
        assert!(events.contains(&Event::Exists(172)));
        assert!(events.contains(&Event::Recent(1)));
        assert!(events.contains(&Event::FirstUnseen(12)));
        assert!(events.contains(&Event::UidValidity(3857529045)));
        assert!(events.contains(&Event::UidNext(4392)));
        assert_eq!(events.last(), Some(&Event::ReadWrite));
    }

    #[tokio::test]
    async fn test_failed_select_returns_to_authenticated() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 EXAMINE Archive\r\n")
            .read(b"A0001 OK [READ-ONLY] done\r\n")
            .write(b"A0002 SELECT Missing\r\n")
            .read(b"A0002 NO [TRYCREATE] no such mailbox\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(client.examine("Archive").await.unwrap());
        assert_eq!(client.state(), SessionState::Selected);
        assert!(!client.select("Missing").await.unwrap());
        assert_eq!(client.state(), SessionState::Authenticated);
        assert!(client.handler_mut().take().contains(&Event::TryCreate));
    }

    #[tokio::test]
    async fn test_mailbox_names_are_utf7_encoded() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 CREATE Entw&APw-rfe\r\n")
            .read(b"A0001 OK\r\n")
            .write(b"A0002 RENAME \"Old Stuff\" Archive\r\n")
            .read(b"A0002 OK\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(client.create("Entwürfe").await.unwrap());
        assert!(client.rename("Old Stuff", "Archive").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_decodes_names() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 LIST \"\" \"*\"\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" Entw&APw-rfe\r\n")
            .read(b"A0001 OK LIST completed\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(client.list("", "*").await.unwrap());
        match data_events(&mut client).as_slice() {
            [Event::List(entry)] => {
                assert_eq!(entry.name, "Entwürfe");
                assert_eq!(entry.delimiter, Some('/'));
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_status_forwards_items() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 STATUS INBOX (MESSAGES UIDNEXT)\r\n")
            .read(b"* STATUS INBOX (MESSAGES 231 UIDNEXT 44292)\r\n")
            .read(b"A0001 OK STATUS completed\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(
            client
                .status(
                    "INBOX",
                    &[StatusAttribute::Messages, StatusAttribute::UidNext]
                )
                .await
                .unwrap()
        );
        let events = data_events(&mut client);
        assert_eq!(events[0], Event::Exists(231));
        assert_eq!(events[1], Event::UidNext(44292));
        assert!(matches!(events[2], Event::Status(_)));
    }

    #[tokio::test]
    async fn test_append_waits_for_continuation() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 APPEND Drafts (\\Seen) {5}\r\n")
            .read(b"+ Ready for literal data\r\n")
            .write(b"hello\r\n")
            .read(b"A0001 OK [APPENDUID 38505 3955] APPEND completed\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(
            client
                .append("Drafts", &[Flag::Seen], None, &b"hello"[..])
                .await
                .unwrap()
        );
        assert!(
            client
                .handler_mut()
                .take()
                .contains(&Event::AppendUid(38505, 3955))
        );
    }

    #[tokio::test]
    async fn test_append_refused_before_literal() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 APPEND Full {5}\r\n")
            .read(b"A0001 NO [OVERQUOTA] mailbox full\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(!client.append("Full", &[], None, "hello").await.unwrap());
        assert!(!client.is_poisoned());
    }

    #[tokio::test]
    async fn test_append_empty_message_is_refused_locally() {
        let mock = Builder::new().build();
        let mut client = client_over(mock);

        assert!(!client.append("INBOX", &[], None, "").await.unwrap());
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_acl_commands() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 SETACL INBOX bob lrs\r\n")
            .read(b"A0001 OK\r\n")
            .write(b"A0002 GETACL INBOX\r\n")
            .read(b"* ACL INBOX alice lrswipkxtecda bob lrs\r\nA0002 OK\r\n")
            .write(b"A0003 MYRIGHTS INBOX\r\n")
            .read(b"* MYRIGHTS INBOX lrswipkxtecda\r\nA0003 OK\r\n")
            .write(b"A0004 DELETEACL INBOX bob\r\n")
            .read(b"A0004 OK\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(client.setacl("INBOX", "bob", "lrs").await.unwrap());
        assert!(client.getacl("INBOX").await.unwrap());
        assert!(client.myrights("INBOX").await.unwrap());
        assert!(client.deleteacl("INBOX", "bob").await.unwrap());

        let events = data_events(&mut client);
        assert_eq!(
            events[0],
            Event::Acl(
                "INBOX".to_string(),
                vec![
                    AclEntry {
                        identifier: "alice".to_string(),
                        rights: "lrswipkxtecda".to_string(),
                    },
                    AclEntry {
                        identifier: "bob".to_string(),
                        rights: "lrs".to_string(),
                    },
                ]
            )
        );
        assert_eq!(
            events[1],
            Event::MyRights("INBOX".to_string(), "lrswipkxtecda".to_string())
        );
    }

    #[tokio::test]
    async fn test_quota_commands() {
        let mock = Builder::new()
            .read(GREETING)
            .write(b"A0001 SETQUOTA \"\" (STORAGE 512 MESSAGE 1000)\r\n")
            .read(b"A0001 OK\r\n")
            .write(b"A0002 GETQUOTAROOT INBOX\r\n")
            .read(b"* QUOTAROOT INBOX \"\"\r\n* QUOTA \"\" (STORAGE 10 512)\r\nA0002 OK\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(
            client
                .setquota("", &[("STORAGE", 512), ("MESSAGE", 1000)])
                .await
                .unwrap()
        );
        assert!(client.getquotaroot("INBOX").await.unwrap());

        let events = data_events(&mut client);
        assert_eq!(
            events,
            vec![
                Event::QuotaRoot("INBOX".to_string(), vec![String::new()]),
                Event::Quota(Quota {
                    root: String::new(),
                    resources: vec![QuotaResource {
                        name: "STORAGE".to_string(),
                        usage: 10,
                        limit: 512,
                    }],
                }),
            ]
        );
    }
}
