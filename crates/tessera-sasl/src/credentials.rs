//! Credential callbacks used by SASL mechanisms.

use std::fmt;

/// Supplies credentials on demand while a mechanism runs.
///
/// Mechanisms call the provider only when they need a value, so an
/// implementation may prompt the user or consult a keyring lazily.
pub trait CredentialProvider: Send + Sync {
    /// Authentication identity (the login name).
    fn username(&self) -> Option<String>;

    /// Password or shared secret.
    fn password(&self) -> Option<String>;

    /// Authorization identity to act as, if different from the username.
    fn authorization_id(&self) -> Option<String> {
        None
    }

    /// `OAuth2` bearer token for XOAUTH2 and OAUTHBEARER.
    fn bearer_token(&self) -> Option<String> {
        None
    }
}

/// Static credentials held in memory.
#[derive(Clone, Default)]
pub struct Credentials {
    username: Option<String>,
    password: Option<String>,
    authorization_id: Option<String>,
    bearer_token: Option<String>,
}

impl Credentials {
    /// Creates username/password credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    /// Creates `OAuth2` credentials from a user and an access token.
    #[must_use]
    pub fn bearer(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            bearer_token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Sets the authorization identity.
    #[must_use]
    pub fn with_authorization_id(mut self, authzid: impl Into<String>) -> Self {
        self.authorization_id = Some(authzid.into());
        self
    }
}

// Secrets stay out of debug output.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("authorization_id", &self.authorization_id)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl CredentialProvider for Credentials {
    fn username(&self) -> Option<String> {
        self.username.clone()
    }

    fn password(&self) -> Option<String> {
        self.password.clone()
    }

    fn authorization_id(&self) -> Option<String> {
        self.authorization_id.clone()
    }

    fn bearer_token(&self) -> Option<String> {
        self.bearer_token.clone()
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
    fn test_debug_masks_secrets() {
        let creds = Credentials::new("alice", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_bearer_credentials() {
        let creds = Credentials::bearer("alice@example.com", "ya29.token");
        assert_eq!(creds.username().as_deref(), Some("alice@example.com"));
        assert_eq!(creds.bearer_token().as_deref(), Some("ya29.token"));
        assert!(creds.password().is_none());
    }
}
