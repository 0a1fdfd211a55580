//! IMAP connection states (RFC 3501 section 3).

use std::fmt;

/// Where a client is in the IMAP session lifecycle.
///
/// The server enforces which commands are valid in which state; the client
/// tracks it for diagnostics and lets the server refuse misplaced commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No transport yet; the next command connects.
    #[default]
    Disconnected,
    /// Greeting received, not yet authenticated.
    NotAuthenticated,
    /// Authenticated (LOGIN, AUTHENTICATE or PREAUTH greeting).
    Authenticated,
    /// A mailbox is selected.
    Selected,
    /// LOGOUT in progress.
    Logout,
}

impl SessionState {
    /// Returns true once the server accepted credentials.
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated | Self::Selected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::NotAuthenticated => "not authenticated",
            Self::Authenticated => "authenticated",
            Self::Selected => "selected",
            Self::Logout => "logout",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(SessionState::default(), SessionState::Disconnected);
    }

    #[test]
    fn test_is_authenticated() {
        assert!(!SessionState::NotAuthenticated.is_authenticated());
        assert!(SessionState::Authenticated.is_authenticated());
        assert!(SessionState::Selected.is_authenticated());
        assert_eq!(SessionState::Selected.to_string(), "selected");
    }
}
