//! Message flags.

use std::fmt;

/// A message flag or keyword.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// `\Seen`
    Seen,
    /// `\Answered`
    Answered,
    /// `\Flagged`
    Flagged,
    /// `\Deleted`
    Deleted,
    /// `\Draft`
    Draft,
    /// `\Recent`
    Recent,
    /// `\*` in PERMANENTFLAGS: new keywords may be created.
    MayCreate,
    /// Keyword or unrecognised system flag, kept verbatim.
    Keyword(String),
}

impl Flag {
    /// Parses a flag atom as sent on the wire.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "\\SEEN" => Self::Seen,
            "\\ANSWERED" => Self::Answered,
            "\\FLAGGED" => Self::Flagged,
            "\\DELETED" => Self::Deleted,
            "\\DRAFT" => Self::Draft,
            "\\RECENT" => Self::Recent,
            "\\*" => Self::MayCreate,
            _ => Self::Keyword(s.to_string()),
        }
    }

    /// Returns the wire form of the flag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Seen => "\\Seen",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
            Self::Draft => "\\Draft",
            Self::Recent => "\\Recent",
            Self::MayCreate => "\\*",
            Self::Keyword(s) => s,
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered, duplicate-free flag list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    flags: Vec<Flag>,
}

impl Flags {
    /// Creates an empty flag list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a flag unless already present.
    pub fn insert(&mut self, flag: Flag) {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
    }

    /// Removes a flag.
    pub fn remove(&mut self, flag: &Flag) {
        self.flags.retain(|f| f != flag);
    }

    /// Returns true if the flag is present.
    #[must_use]
    pub fn contains(&self, flag: &Flag) -> bool {
        self.flags.contains(flag)
    }

    /// Returns true if `\Seen` is present.
    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.contains(&Flag::Seen)
    }

    /// Returns true if `\Deleted` is present.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.contains(&Flag::Deleted)
    }

    /// Iterates over the flags in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.flags.iter()
    }

    /// Returns the number of flags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Returns true if there are no flags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        let mut flags = Self::new();
        for flag in iter {
            flags.insert(flag);
        }
        flags
    }
}

impl IntoIterator for Flags {
    type Item = Flag;
    type IntoIter = std::vec::IntoIter<Flag>;

    fn into_iter(self) -> Self::IntoIter {
        self.flags.into_iter()
    }
}

/// Renders the parenthesised list form, e.g. `(\Seen \Flagged)`.
impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, flag) in self.flags.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(flag.as_str())?;
        }
        f.write_str(")")
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
    fn test_parse_system_flags_case_insensitive() {
        assert_eq!(Flag::parse("\\Seen"), Flag::Seen);
        assert_eq!(Flag::parse("\\SEEN"), Flag::Seen);
        assert_eq!(Flag::parse("\\deleted"), Flag::Deleted);
        assert_eq!(Flag::parse("\\*"), Flag::MayCreate);
    }

    #[test]
    fn test_keyword_kept_verbatim() {
        assert_eq!(Flag::parse("$Junk"), Flag::Keyword("$Junk".to_string()));
        assert_eq!(Flag::parse("\\Unknown").as_str(), "\\Unknown");
    }

    #[test]
    fn test_flags_dedupe() {
        let flags: Flags = [Flag::Seen, Flag::Seen, Flag::Flagged].into_iter().collect();
        assert_eq!(flags.len(), 2);
        assert!(flags.is_seen());
        assert!(!flags.is_deleted());
    }

    #[test]
    fn test_flags_display() {
        let flags: Flags = [Flag::Seen, Flag::Keyword("$Work".to_string())]
            .into_iter()
            .collect();
        assert_eq!(flags.to_string(), "(\\Seen $Work)");
        assert_eq!(Flags::new().to_string(), "()");
    }

    #[test]
    fn test_remove() {
        let mut flags: Flags = [Flag::Seen, Flag::Answered].into_iter().collect();
        flags.remove(&Flag::Seen);
        assert!(!flags.contains(&Flag::Seen));
        assert!(flags.contains(&Flag::Answered));
    }
}
