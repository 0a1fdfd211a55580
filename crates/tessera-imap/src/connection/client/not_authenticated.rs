//! Connection setup and commands for the not-authenticated state.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tessera_sasl::{CredentialProvider, SaslClient};

use super::{Client, SessionState, Step, WIRE, not_connected, trace_sent};
use crate::command::Command;
use crate::connection::config::Security;
use crate::connection::sasl_stream::SaslStream;
use crate::handler::{ResponseHandler, dispatch_untagged};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{ResponseCode, Status};
use crate::{Error, Result};

impl<H: ResponseHandler> Client<H> {
    /// Opens the transport, reads the greeting and runs automatic STARTTLS.
    pub(super) async fn open(&mut self) -> Result<()> {
        let limit = self.config.connect_timeout;
        let io = tokio::time::timeout(limit, self.connector.connect(&self.config))
            .await
            .map_err(|_| Error::Timeout(limit))??;
        self.install(io);
        tracing::debug!(host = %self.config.host, port = self.config.port, "Connected");

        self.read_greeting().await?;

        if self.config.security == Security::StartTls && !self.starttls_exchange().await? {
            return Err(Error::Protocol("server refused STARTTLS".to_string()));
        }
        Ok(())
    }

    async fn read_greeting(&mut self) -> Result<()> {
        let frame = self.transport_mut()?.read_frame().await?;
        let Response::Untagged(greeting) = ResponseParser::parse_frame(frame)? else {
            return Err(Error::Protocol("expected untagged greeting".to_string()));
        };
        let UntaggedResponse::Condition { status, code, text } = &greeting else {
            return Err(Error::Protocol(format!("unexpected greeting: {greeting:?}")));
        };

        if let Some(ResponseCode::Capability(caps)) = code {
            self.capabilities.clone_from(caps);
        }
        dispatch_untagged(&mut self.handler, &greeting);

        match status {
            Status::Ok => self.set_state(SessionState::NotAuthenticated),
            Status::PreAuth => self.set_state(SessionState::Authenticated),
            Status::Bye => return Err(Error::Bye(text.clone())),
            Status::No | Status::Bad => {
                return Err(Error::Protocol(format!("greeting status {status:?}: {text}")));
            }
        }
        Ok(())
    }

    /// Upgrades the connection to TLS with STARTTLS.
    ///
    /// Returns `Ok(false)` if the server refused. On success the cached
    /// capabilities are discarded; the server may advertise different ones
    /// over TLS.
    pub async fn starttls(&mut self) -> Result<bool> {
        self.ensure_connected().await?;
        let result = self.starttls_exchange().await;
        self.settle(result)
    }

    async fn starttls_exchange(&mut self) -> Result<bool> {
        if !self.exchange(&Command::StartTls).await?.is_ok() {
            return Ok(false);
        }

        let io = self.transport.take().ok_or_else(not_connected)?.into_inner()?;
        let io = self.upgrader.upgrade(io, &self.config.host).await?;
        self.install(io);
        self.capabilities.clear();
        tracing::debug!(host = %self.config.host, "TLS upgraded");
        Ok(true)
    }

    /// Authenticates with LOGIN.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<bool> {
        self.ensure_connected().await?;
        self.capabilities.clear();
        let ok = self
            .run(&Command::Login {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?
            .is_ok();
        if ok {
            self.set_state(SessionState::Authenticated);
        }
        Ok(ok)
    }

    /// Authenticates with the named SASL mechanism.
    ///
    /// An unsupported mechanism or a failed exchange returns `Ok(false)`; the
    /// connection stays usable for another attempt.
    pub async fn authenticate(
        &mut self,
        mechanism: &str,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<bool> {
        match tessera_sasl::client_for(mechanism, credentials) {
            Ok(client) => self.authenticate_with(client).await,
            Err(err) => {
                tracing::warn!(%err, mechanism, "Cannot authenticate");
                Ok(false)
            }
        }
    }

    /// Authenticates with a caller-supplied SASL mechanism.
    ///
    /// If the mechanism negotiated integrity or confidentiality protection,
    /// all later traffic goes through its security layer.
    pub async fn authenticate_with(&mut self, mechanism: Box<dyn SaslClient>) -> Result<bool> {
        let sasl_ir = self.has_capability("SASL-IR").await?;
        let result = self.sasl_exchange(mechanism, sasl_ir).await;
        self.settle(result)
    }

    async fn sasl_exchange(
        &mut self,
        mut mechanism: Box<dyn SaslClient>,
        sasl_ir: bool,
    ) -> Result<bool> {
        let name = mechanism.mechanism();
        let initial_response = if sasl_ir && mechanism.has_initial_response() {
            match mechanism.evaluate_challenge(&[]) {
                Ok(response) if response.is_empty() => Some("=".to_string()),
                Ok(response) => Some(BASE64.encode(response)),
                Err(err) => {
                    tracing::warn!(%err, mechanism = name, "Initial response failed");
                    return Ok(false);
                }
            }
        } else {
            None
        };

        let tag = self.tags.next_tag();
        let encoded = Command::Authenticate {
            mechanism: name.to_string(),
            initial_response,
        }
        .encode(&tag)?;
        tracing::debug!(tag = %tag, mechanism = name, "Sending command");
        self.capabilities.clear();
        let line = encoded.to_bytes();
        trace_sent(&encoded, 0, &line);
        self.transport_mut()?.write_all(&line).await?;

        let mut cancelled = false;
        loop {
            match self.read_step(&tag, encoded.name).await? {
                Step::Continue(text) => {
                    if cancelled {
                        return Err(Error::Protocol(
                            "continuation after cancelled authentication".to_string(),
                        ));
                    }
                    let response = BASE64
                        .decode(text.trim())
                        .map_err(tessera_sasl::Error::from)
                        .and_then(|challenge| mechanism.evaluate_challenge(&challenge));
                    match response {
                        Ok(response) => {
                            tracing::trace!(target: WIRE, "C: ****");
                            let mut reply = BASE64.encode(response).into_bytes();
                            reply.extend_from_slice(b"\r\n");
                            self.transport_mut()?.write_all(&reply).await?;
                        }
                        Err(err) => {
                            tracing::warn!(%err, mechanism = name, "Cancelling authentication");
                            tracing::trace!(target: WIRE, "C: *");
                            self.transport_mut()?.write_all(b"*\r\n").await?;
                            cancelled = true;
                        }
                    }
                }
                Step::Done(completion) => {
                    return match completion.status {
                        Status::Ok => {
                            self.set_state(SessionState::Authenticated);
                            if mechanism.qop().has_security_layer() {
                                self.install_security_layer(mechanism)?;
                            }
                            Ok(true)
                        }
                        Status::Bad if !cancelled => Err(Error::Bad {
                            command: encoded.name.to_string(),
                            text: completion.text,
                        }),
                        _ => {
                            tracing::debug!(mechanism = name, text = %completion.text, "Authentication failed");
                            Ok(false)
                        }
                    };
                }
            }
        }
    }

    fn install_security_layer(&mut self, mechanism: Box<dyn SaslClient>) -> Result<()> {
        let name = mechanism.mechanism();
        let io = self.transport.take().ok_or_else(not_connected)?.into_inner()?;
        self.install(Box::new(SaslStream::new(io, mechanism)));
        tracing::debug!(mechanism = name, "SASL security layer installed");
        Ok(())
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
    use super::super::tests::client_over;
    use super::*;
    use tessera_sasl::Credentials;
    use tokio_test::io::Builder;

    fn alice() -> Arc<dyn CredentialProvider> {
        Arc::new(Credentials::new("alice", "secret"))
    }

    #[tokio::test]
    async fn test_login_success() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] ready\r\n")
            .write(b"A0001 LOGIN alice \"pass word\"\r\n")
            .read(b"A0001 OK [CAPABILITY IMAP4rev1 QUOTA] logged in\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(client.login("alice", "pass word").await.unwrap());
        assert_eq!(client.state(), SessionState::Authenticated);
        assert_eq!(client.cached_capabilities(), &["IMAP4rev1", "QUOTA"]);
    }

    #[tokio::test]
    async fn test_login_failure_returns_false() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN alice wrong\r\n")
            .read(b"A0001 NO [AUTHENTICATIONFAILED] invalid credentials\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(!client.login("alice", "wrong").await.unwrap());
        assert_eq!(client.state(), SessionState::NotAuthenticated);
        assert!(!client.is_poisoned());
    }

    #[tokio::test]
    async fn test_authenticate_plain_with_sasl_ir() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=PLAIN] ready\r\n")
            .write(b"A0001 AUTHENTICATE PLAIN AGFsaWNlAHNlY3JldA==\r\n")
            .read(b"A0001 OK authenticated\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(client.authenticate("PLAIN", alice()).await.unwrap());
        assert_eq!(client.state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn test_authenticate_plain_without_sasl_ir() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] ready\r\n")
            .write(b"A0001 AUTHENTICATE PLAIN\r\n")
            .read(b"+ \r\n")
            .write(b"AGFsaWNlAHNlY3JldA==\r\n")
            .read(b"A0001 OK authenticated\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(client.authenticate("PLAIN", alice()).await.unwrap());
    }

    #[tokio::test]
    async fn test_authenticate_cram_md5_rejected_challenge_cancels() {
        // "not base64!" cannot be decoded, so the exchange is cancelled.
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 AUTH=CRAM-MD5] ready\r\n")
            .write(b"A0001 AUTHENTICATE CRAM-MD5\r\n")
            .read(b"+ not base64!\r\n")
            .write(b"*\r\n")
            .read(b"A0001 BAD authentication cancelled\r\n")
            .write(b"A0002 NOOP\r\n")
            .read(b"A0002 OK\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(!client.authenticate("CRAM-MD5", alice()).await.unwrap());
        assert!(!client.is_poisoned());
        assert!(client.noop().await.unwrap());
    }

    #[tokio::test]
    async fn test_authenticate_unsupported_mechanism() {
        let mock = Builder::new().build();
        let mut client = client_over(mock);

        assert!(!client.authenticate("GSSAPI", alice()).await.unwrap());
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_starttls_refused() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 STARTTLS\r\n")
            .read(b"A0001 NO TLS unavailable\r\n")
            .build();
        let mut client = client_over(mock);

        assert!(!client.starttls().await.unwrap());
        assert!(client.is_connected());
    }
}
