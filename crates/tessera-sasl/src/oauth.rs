//! Bearer token mechanisms: OAUTHBEARER (RFC 7628) and XOAUTH2.

use std::sync::Arc;

use crate::credentials::CredentialProvider;
use crate::mechanism::SaslClient;
use crate::{Error, Result};

fn bearer_parts(credentials: &dyn CredentialProvider) -> Result<(String, String)> {
    let user = credentials
        .username()
        .ok_or(Error::MissingCredentials("username"))?;
    let token = credentials
        .bearer_token()
        .ok_or(Error::MissingCredentials("bearer token"))?;
    Ok((user, token))
}

/// OAUTHBEARER: `n,a=<user>,^Aauth=Bearer <token>^A^A`.
pub struct OAuthBearer {
    credentials: Arc<dyn CredentialProvider>,
    sent: bool,
    complete: bool,
}

impl OAuthBearer {
    /// Creates an OAUTHBEARER client.
    #[must_use]
    pub fn new(credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            credentials,
            sent: false,
            complete: false,
        }
    }
}

impl SaslClient for OAuthBearer {
    fn mechanism(&self) -> &'static str {
        "OAUTHBEARER"
    }

    fn has_initial_response(&self) -> bool {
        true
    }

    fn evaluate_challenge(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        if self.sent {
            // An error status arrives as a JSON challenge; a lone ^A ends the exchange.
            tracing::debug!(
                status = %String::from_utf8_lossy(challenge),
                "OAUTHBEARER error challenge"
            );
            self.complete = true;
            return Ok(vec![0x01]);
        }
        let (user, token) = bearer_parts(self.credentials.as_ref())?;
        self.sent = true;
        self.complete = true;
        Ok(format!("n,a={user},\x01auth=Bearer {token}\x01\x01").into_bytes())
    }

    fn is_complete(&self) -> bool {
        self.complete
    }
}

/// XOAUTH2: `user=<user>^Aauth=Bearer <token>^A^A`.
pub struct XOAuth2 {
    credentials: Arc<dyn CredentialProvider>,
    sent: bool,
}

impl XOAuth2 {
    /// Creates an XOAUTH2 client.
    #[must_use]
    pub fn new(credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            credentials,
            sent: false,
        }
    }
}

impl SaslClient for XOAuth2 {
    fn mechanism(&self) -> &'static str {
        "XOAUTH2"
    }

    fn has_initial_response(&self) -> bool {
        true
    }

    fn evaluate_challenge(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        if self.sent {
            tracing::debug!(
                status = %String::from_utf8_lossy(challenge),
                "XOAUTH2 error challenge"
            );
            return Ok(Vec::new());
        }
        let (user, token) = bearer_parts(self.credentials.as_ref())?;
        self.sent = true;
        Ok(format!("user={user}\x01auth=Bearer {token}\x01\x01").into_bytes())
    }

    fn is_complete(&self) -> bool {
        self.sent
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
    fn test_oauthbearer_initial_response() {
        let mut client = OAuthBearer::new(Arc::new(Credentials::bearer("user@example.com", "tok")));
        let response = client.evaluate_challenge(b"").unwrap();
        assert_eq!(
            response,
            b"n,a=user@example.com,\x01auth=Bearer tok\x01\x01".to_vec()
        );
    }

    #[test]
    fn test_oauthbearer_error_challenge() {
        let mut client = OAuthBearer::new(Arc::new(Credentials::bearer("u", "t")));
        let _ = client.evaluate_challenge(b"").unwrap();
        let reply = client
            .evaluate_challenge(br#"{"status":"invalid_token"}"#)
            .unwrap();
        assert_eq!(reply, vec![0x01]);
    }

    #[test]
    fn test_xoauth2_initial_response() {
        let mut client = XOAuth2::new(Arc::new(Credentials::bearer("user@example.com", "ya29")));
        assert!(!client.is_complete());
        let response = client.evaluate_challenge(b"").unwrap();
        assert_eq!(
            response,
            b"user=user@example.com\x01auth=Bearer ya29\x01\x01".to_vec()
        );
        assert!(client.is_complete());
        assert!(client.evaluate_challenge(b"{}").unwrap().is_empty());
    }

    #[test]
    fn test_missing_token() {
        let mut client = XOAuth2::new(Arc::new(Credentials::new("u", "password")));
        assert!(matches!(
            client.evaluate_challenge(b""),
            Err(Error::MissingCredentials("bearer token"))
        ));
    }
}
