//! The client-side SASL mechanism contract (RFC 4422).

use std::sync::Arc;

use crate::credentials::CredentialProvider;
use crate::cram_md5::CramMd5;
use crate::oauth::{OAuthBearer, XOAuth2};
use crate::plain::{Login, Plain};
use crate::{Error, Result};

/// Quality of protection negotiated by a mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Qop {
    /// Authentication only; traffic is not wrapped.
    #[default]
    Auth,
    /// Authentication with integrity protection.
    AuthInt,
    /// Authentication with integrity and confidentiality protection.
    AuthConf,
}

impl Qop {
    /// Returns true if traffic must pass through `wrap`/`unwrap` after authentication.
    #[must_use]
    pub const fn has_security_layer(self) -> bool {
        matches!(self, Self::AuthInt | Self::AuthConf)
    }

    /// Parses the `auth`, `auth-int` and `auth-conf` tokens.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auth" => Some(Self::Auth),
            "auth-int" => Some(Self::AuthInt),
            "auth-conf" => Some(Self::AuthConf),
            _ => None,
        }
    }
}

/// A client-side SASL mechanism instance for one authentication exchange.
///
/// Challenges and responses are raw bytes; base64 transfer encoding is the
/// protocol layer's job. Returning an error from [`evaluate_challenge`]
/// tells the protocol layer to cancel the exchange.
///
/// [`evaluate_challenge`]: SaslClient::evaluate_challenge
pub trait SaslClient: Send {
    /// The registered mechanism name, e.g. `PLAIN`.
    fn mechanism(&self) -> &'static str;

    /// Returns true if the client speaks first (RFC 4959 SASL-IR).
    fn has_initial_response(&self) -> bool;

    /// Computes the response to a server challenge.
    ///
    /// When [`has_initial_response`](SaslClient::has_initial_response) is
    /// true the first call receives an empty challenge.
    fn evaluate_challenge(&mut self, challenge: &[u8]) -> Result<Vec<u8>>;

    /// Returns true once the client has sent its final response.
    fn is_complete(&self) -> bool;

    /// The negotiated quality of protection.
    fn qop(&self) -> Qop {
        Qop::Auth
    }

    /// Protects outgoing data with the negotiated security layer.
    fn wrap(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let _ = data;
        Err(Error::NoSecurityLayer(self.mechanism()))
    }

    /// Verifies and decodes incoming data with the negotiated security layer.
    fn unwrap(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let _ = data;
        Err(Error::NoSecurityLayer(self.mechanism()))
    }
}

/// Mechanism names this crate implements, strongest first.
pub const SUPPORTED_MECHANISMS: &[&str] = &["OAUTHBEARER", "XOAUTH2", "CRAM-MD5", "PLAIN", "LOGIN"];

/// Creates a client for the named mechanism.
///
/// # Errors
///
/// Returns [`Error::UnsupportedMechanism`] if the name is not one of
/// [`SUPPORTED_MECHANISMS`].
pub fn client_for(
    mechanism: &str,
    credentials: Arc<dyn CredentialProvider>,
) -> Result<Box<dyn SaslClient>> {
    let client: Box<dyn SaslClient> = match mechanism.to_ascii_uppercase().as_str() {
        "PLAIN" => Box::new(Plain::new(credentials)),
        "LOGIN" => Box::new(Login::new(credentials)),
        "CRAM-MD5" => Box::new(CramMd5::new(credentials)),
        "XOAUTH2" => Box::new(XOAuth2::new(credentials)),
        "OAUTHBEARER" => Box::new(OAuthBearer::new(credentials)),
        _ => return Err(Error::UnsupportedMechanism(mechanism.to_string())),
    };
    tracing::debug!(mechanism = client.mechanism(), "created SASL client");
    Ok(client)
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
    fn test_qop_parse() {
        assert_eq!(Qop::parse("auth"), Some(Qop::Auth));
        assert_eq!(Qop::parse("AUTH-INT"), Some(Qop::AuthInt));
        assert_eq!(Qop::parse("auth-conf"), Some(Qop::AuthConf));
        assert_eq!(Qop::parse("bogus"), None);
        assert!(!Qop::Auth.has_security_layer());
        assert!(Qop::AuthConf.has_security_layer());
    }

    #[test]
    fn test_client_for_known_mechanisms() {
        let creds: Arc<dyn CredentialProvider> = Arc::new(Credentials::new("u", "p"));
        for name in SUPPORTED_MECHANISMS {
            let client = client_for(name, Arc::clone(&creds)).unwrap();
            assert_eq!(client.mechanism(), *name);
        }
        assert_eq!(client_for("plain", creds).unwrap().mechanism(), "PLAIN");
    }

    #[test]
    fn test_client_for_unknown_mechanism() {
        let creds: Arc<dyn CredentialProvider> = Arc::new(Credentials::new("u", "p"));
        let err = client_for("GSSAPI", creds).err().unwrap();
        assert!(matches!(err, Error::UnsupportedMechanism(ref m) if m == "GSSAPI"));
    }

    #[test]
    fn test_default_security_layer_refuses() {
        let creds: Arc<dyn CredentialProvider> = Arc::new(Credentials::new("u", "p"));
        let mut client = client_for("PLAIN", creds).unwrap();
        assert!(matches!(client.wrap(b"x"), Err(Error::NoSecurityLayer("PLAIN"))));
        assert!(matches!(client.unwrap(b"x"), Err(Error::NoSecurityLayer("PLAIN"))));
    }
}
