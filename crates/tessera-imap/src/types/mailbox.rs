//! Mailbox-level response data: LIST, STATUS, NAMESPACE, ACL and QUOTA.

/// A LIST or LSUB entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Name attributes such as `\Noselect`, verbatim.
    pub attributes: Vec<String>,
    /// Hierarchy delimiter; `None` for a flat namespace.
    pub delimiter: Option<char>,
    /// Mailbox name, decoded from modified UTF-7.
    pub name: String,
}

impl ListEntry {
    /// Returns true if the entry carries the attribute (case-insensitive).
    #[must_use]
    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes
            .iter()
            .any(|a| a.eq_ignore_ascii_case(attribute))
    }

    /// Returns true if the mailbox cannot be selected.
    #[must_use]
    pub fn is_noselect(&self) -> bool {
        self.has_attribute("\\Noselect")
    }
}

/// STATUS response data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Mailbox name, decoded from modified UTF-7.
    pub mailbox: String,
    /// Item name (upper-cased) and value pairs in server order.
    pub items: Vec<(String, u64)>,
}

impl MailboxStatus {
    /// Looks up an item by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<u64> {
        self.items
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, v)| v)
    }

    /// MESSAGES item.
    #[must_use]
    pub fn messages(&self) -> Option<u32> {
        self.get("MESSAGES").and_then(|v| u32::try_from(v).ok())
    }

    /// RECENT item.
    #[must_use]
    pub fn recent(&self) -> Option<u32> {
        self.get("RECENT").and_then(|v| u32::try_from(v).ok())
    }

    /// UIDNEXT item.
    #[must_use]
    pub fn uid_next(&self) -> Option<u64> {
        self.get("UIDNEXT")
    }

    /// UIDVALIDITY item.
    #[must_use]
    pub fn uid_validity(&self) -> Option<u64> {
        self.get("UIDVALIDITY")
    }

    /// UNSEEN item.
    #[must_use]
    pub fn unseen(&self) -> Option<u32> {
        self.get("UNSEEN").and_then(|v| u32::try_from(v).ok())
    }
}

/// One namespace: a prefix and its hierarchy delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceEntry {
    /// Mailbox name prefix.
    pub prefix: String,
    /// Hierarchy delimiter.
    pub delimiter: Option<char>,
}

/// NAMESPACE response (RFC 2342).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespaces {
    /// Personal namespaces.
    pub personal: Vec<NamespaceEntry>,
    /// Other users' namespaces.
    pub other: Vec<NamespaceEntry>,
    /// Shared namespaces.
    pub shared: Vec<NamespaceEntry>,
}

/// An identifier and its rights string from an ACL response (RFC 4314).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntry {
    /// User or group identifier.
    pub identifier: String,
    /// Rights characters, e.g. `lrswipkxtea`.
    pub rights: String,
}

/// LISTRIGHTS response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRights {
    /// Mailbox name.
    pub mailbox: String,
    /// Identifier the rights apply to.
    pub identifier: String,
    /// Rights always granted.
    pub required: String,
    /// Groups of rights that may be granted.
    pub optional: Vec<String>,
}

/// Usage and limit of one quota resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaResource {
    /// Resource name, e.g. `STORAGE`.
    pub name: String,
    /// Current usage.
    pub usage: u64,
    /// Limit.
    pub limit: u64,
}

/// QUOTA response (RFC 2087).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quota {
    /// Quota root name.
    pub root: String,
    /// Resource usage and limits.
    pub resources: Vec<QuotaResource>,
}

impl Quota {
    /// Looks up a resource by name.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&QuotaResource> {
        self.resources
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
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
    use super::*;

    #[test]
    fn test_status_lookup() {
        let status = MailboxStatus {
            mailbox: "INBOX".to_string(),
            items: vec![
                ("MESSAGES".to_string(), 231),
                ("UIDNEXT".to_string(), 44292),
            ],
        };
        assert_eq!(status.messages(), Some(231));
        assert_eq!(status.uid_next(), Some(44292));
        assert_eq!(status.get("uidnext"), Some(44292));
        assert_eq!(status.unseen(), None);
    }

    #[test]
    fn test_list_attributes() {
        let entry = ListEntry {
            attributes: vec!["\\NoSelect".to_string()],
            delimiter: Some('/'),
            name: "foo".to_string(),
        };
        assert!(entry.is_noselect());
        assert!(!entry.has_attribute("\\Marked"));
    }

    #[test]
    fn test_quota_resource_lookup() {
        let quota = Quota {
            root: "".to_string(),
            resources: vec![QuotaResource {
                name: "STORAGE".to_string(),
                usage: 10,
                limit: 512,
            }],
        };
        assert_eq!(quota.resource("storage").unwrap().limit, 512);
        assert!(quota.resource("MESSAGE").is_none());
    }
}
