//! PLAIN (RFC 4616) and LOGIN mechanisms.

use std::sync::Arc;

use crate::credentials::CredentialProvider;
use crate::mechanism::SaslClient;
use crate::{Error, Result};

/// PLAIN: `authzid NUL authcid NUL password` in a single initial response.
pub struct Plain {
    credentials: Arc<dyn CredentialProvider>,
    complete: bool,
}

impl Plain {
    /// Creates a PLAIN client.
    #[must_use]
    pub fn new(credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            credentials,
            complete: false,
        }
    }
}

impl SaslClient for Plain {
    fn mechanism(&self) -> &'static str {
        "PLAIN"
    }

    fn has_initial_response(&self) -> bool {
        true
    }

    fn evaluate_challenge(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        if self.complete || !challenge.is_empty() {
            return Err(Error::InvalidChallenge {
                mechanism: "PLAIN",
                reason: "unexpected server challenge".to_string(),
            });
        }
        let username = self
            .credentials
            .username()
            .ok_or(Error::MissingCredentials("username"))?;
        let password = self
            .credentials
            .password()
            .ok_or(Error::MissingCredentials("password"))?;
        let authzid = self.credentials.authorization_id().unwrap_or_default();

        let mut response = Vec::with_capacity(authzid.len() + username.len() + password.len() + 2);
        response.extend_from_slice(authzid.as_bytes());
        response.push(0);
        response.extend_from_slice(username.as_bytes());
        response.push(0);
        response.extend_from_slice(password.as_bytes());
        self.complete = true;
        Ok(response)
    }

    fn is_complete(&self) -> bool {
        self.complete
    }
}

/// LOGIN: answers the `Username:` and `Password:` prompts in turn.
pub struct Login {
    credentials: Arc<dyn CredentialProvider>,
    step: u8,
}

impl Login {
    /// Creates a LOGIN client.
    #[must_use]
    pub fn new(credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            credentials,
            step: 0,
        }
    }
}

impl SaslClient for Login {
    fn mechanism(&self) -> &'static str {
        "LOGIN"
    }

    fn has_initial_response(&self) -> bool {
        false
    }

    // Prompt text is informational only; servers word it differently.
    fn evaluate_challenge(&mut self, _challenge: &[u8]) -> Result<Vec<u8>> {
        let response = match self.step {
            0 => self
                .credentials
                .username()
                .ok_or(Error::MissingCredentials("username"))?,
            1 => self
                .credentials
                .password()
                .ok_or(Error::MissingCredentials("password"))?,
            _ => {
                return Err(Error::InvalidChallenge {
                    mechanism: "LOGIN",
                    reason: "too many challenges".to_string(),
                });
            }
        };
        self.step += 1;
        Ok(response.into_bytes())
    }

    fn is_complete(&self) -> bool {
        self.step >= 2
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
    use crate::Credentials;

    #[test]
    fn test_plain_response() {
        let mut plain = Plain::new(Arc::new(Credentials::new("user@example.com", "password123")));
        assert!(plain.has_initial_response());
        let response = plain.evaluate_challenge(b"").unwrap();
        assert_eq!(response, b"\0user@example.com\0password123");
        assert!(plain.is_complete());
    }

    #[test]
    fn test_plain_with_authzid() {
        let creds = Credentials::new("admin", "secret").with_authorization_id("alice");
        let mut plain = Plain::new(Arc::new(creds));
        assert_eq!(plain.evaluate_challenge(b"").unwrap(), b"alice\0admin\0secret");
    }

    #[test]
    fn test_plain_rejects_challenge() {
        let mut plain = Plain::new(Arc::new(Credentials::new("u", "p")));
        assert!(plain.evaluate_challenge(b"unexpected").is_err());
    }

    #[test]
    fn test_plain_missing_password() {
        let mut plain = Plain::new(Arc::new(Credentials::bearer("u", "t")));
        assert!(matches!(
            plain.evaluate_challenge(b""),
            Err(Error::MissingCredentials("password"))
        ));
    }

    #[test]
    fn test_login_steps() {
        let mut login = Login::new(Arc::new(Credentials::new("bob", "pw")));
        assert!(!login.has_initial_response());
        assert_eq!(login.evaluate_challenge(b"Username:").unwrap(), b"bob");
        assert!(!login.is_complete());
        assert_eq!(login.evaluate_challenge(b"Password:").unwrap(), b"pw");
        assert!(login.is_complete());
        assert!(login.evaluate_challenge(b"again").is_err());
    }
}
