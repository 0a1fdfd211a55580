//! CRAM-MD5 (RFC 2195).

use std::sync::Arc;

use hmac::{Hmac, Mac};
use md5::Md5;

use crate::credentials::CredentialProvider;
use crate::mechanism::SaslClient;
use crate::{Error, Result};

type HmacMd5 = Hmac<Md5>;

/// CRAM-MD5: replies `username SP hex(HMAC-MD5(password, challenge))`.
pub struct CramMd5 {
    credentials: Arc<dyn CredentialProvider>,
    complete: bool,
}

impl CramMd5 {
    /// Creates a CRAM-MD5 client.
    #[must_use]
    pub fn new(credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            credentials,
            complete: false,
        }
    }
}

impl SaslClient for CramMd5 {
    fn mechanism(&self) -> &'static str {
        "CRAM-MD5"
    }

    fn has_initial_response(&self) -> bool {
        false
    }

    fn evaluate_challenge(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        if self.complete || challenge.is_empty() {
            return Err(Error::InvalidChallenge {
                mechanism: "CRAM-MD5",
                reason: "expected a single non-empty challenge".to_string(),
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

        let mut mac = HmacMd5::new_from_slice(password.as_bytes())
            .map_err(|e| Error::Encoding(e.to_string()))?;
        mac.update(challenge);
        let digest = mac.finalize().into_bytes();

        let mut response = username.into_bytes();
        response.push(b' ');
        response.extend_from_slice(to_hex(&digest).as_bytes());
        self.complete = true;
        Ok(response)
    }

    fn is_complete(&self) -> bool {
        self.complete
    }
}

fn to_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        s.push(char::from(HEX[usize::from(b >> 4)]));
        s.push(char::from(HEX[usize::from(b & 0x0f)]));
    }
    s
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
    fn test_rfc2195_example() {
        let mut cram = CramMd5::new(Arc::new(Credentials::new("tim", "tanstaaftanstaaf")));
        let response = cram
            .evaluate_challenge(b"<1896.697170952@postoffice.reston.mci.net>")
            .unwrap();
        assert_eq!(
            String::from_utf8(response).unwrap(),
            "tim b913a602c7eda7a495b4e6e7334d3890"
        );
        assert!(cram.is_complete());
    }

    #[test]
    fn test_empty_challenge_rejected() {
        let mut cram = CramMd5::new(Arc::new(Credentials::new("tim", "pw")));
        assert!(cram.evaluate_challenge(b"").is_err());
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[0x00, 0xab, 0xff]), "00abff");
    }
}
